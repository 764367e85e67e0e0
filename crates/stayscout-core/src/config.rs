use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a pure
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let log_level = or_default("STAYSCOUT_LOG_LEVEL", "info");
    let renderer_url = optional("STAYSCOUT_RENDERER_URL");
    let renderer_token = optional("STAYSCOUT_RENDERER_TOKEN");
    let user_agent = or_default(
        "STAYSCOUT_USER_AGENT",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36",
    );

    let nav_timeout_secs = parse_u64("STAYSCOUT_NAV_TIMEOUT_SECS", "60")?;
    if nav_timeout_secs == 0 {
        return Err(invalid(
            "STAYSCOUT_NAV_TIMEOUT_SECS",
            "must be greater than zero".to_string(),
        ));
    }
    let max_retries = parse_u32("STAYSCOUT_MAX_RETRIES", "3")?;
    let retry_base_delay_ms = parse_u64("STAYSCOUT_RETRY_BASE_DELAY_MS", "1000")?;

    let request_delay_secs = or_default("STAYSCOUT_REQUEST_DELAY_SECS", "2")
        .parse::<f64>()
        .map_err(|e| invalid("STAYSCOUT_REQUEST_DELAY_SECS", e.to_string()))?;
    if !request_delay_secs.is_finite() || request_delay_secs < 0.0 {
        return Err(invalid(
            "STAYSCOUT_REQUEST_DELAY_SECS",
            "must be a non-negative number".to_string(),
        ));
    }

    let page_limit = parse_u32("STAYSCOUT_PAGE_LIMIT", "3")?;
    if page_limit == 0 {
        return Err(invalid(
            "STAYSCOUT_PAGE_LIMIT",
            "must be at least 1".to_string(),
        ));
    }
    let detail_limit = parse_usize("STAYSCOUT_DETAIL_LIMIT", "3")?;
    let photo_limit = parse_usize("STAYSCOUT_PHOTO_LIMIT", "2")?;

    let task_timeout_secs = match optional("STAYSCOUT_TASK_TIMEOUT_SECS") {
        Some(raw) => Some(
            raw.parse::<u64>()
                .map_err(|e| invalid("STAYSCOUT_TASK_TIMEOUT_SECS", e.to_string()))?,
        ),
        None => None,
    };
    let profiles_path = optional("STAYSCOUT_PROFILES_PATH").map(PathBuf::from);

    Ok(AppConfig {
        log_level,
        renderer_url,
        renderer_token,
        user_agent,
        nav_timeout_secs,
        max_retries,
        retry_base_delay_ms,
        request_delay_secs,
        page_limit,
        detail_limit,
        photo_limit,
        task_timeout_secs,
        profiles_path,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
