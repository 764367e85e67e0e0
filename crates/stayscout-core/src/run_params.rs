use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::records::Source;
use crate::ConfigError;

/// Validated parameters for one crawl run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    /// Sources to crawl, deduplicated and in priority order.
    pub target_sources: Vec<Source>,
    pub city_or_region: String,
    pub page_limit: u32,
    pub max_retries: u32,
    pub request_delay_seconds: f64,
}

impl RunParams {
    /// Builds and validates run parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when no source is selected, the
    /// city is blank, `page_limit` is zero, or the request delay is negative
    /// or not finite.
    pub fn new(
        target_sources: &[Source],
        city_or_region: &str,
        page_limit: u32,
        max_retries: u32,
        request_delay_seconds: f64,
    ) -> Result<Self, ConfigError> {
        let mut sources = target_sources.to_vec();
        sources.sort_unstable();
        sources.dedup();
        if sources.is_empty() {
            return Err(ConfigError::Validation(
                "at least one target source is required".to_string(),
            ));
        }

        let city = city_or_region.trim();
        if city.is_empty() {
            return Err(ConfigError::Validation(
                "city_or_region must be non-empty".to_string(),
            ));
        }

        if page_limit == 0 {
            return Err(ConfigError::Validation(
                "page_limit must be at least 1".to_string(),
            ));
        }

        if !request_delay_seconds.is_finite() || request_delay_seconds < 0.0 {
            return Err(ConfigError::Validation(format!(
                "request_delay_seconds must be a non-negative number, got {request_delay_seconds}"
            )));
        }

        Ok(Self {
            target_sources: sources,
            city_or_region: city.to_string(),
            page_limit,
            max_retries,
            request_delay_seconds,
        })
    }

    #[must_use]
    pub fn request_delay(&self) -> Duration {
        Duration::from_secs_f64(self.request_delay_seconds)
    }
}

#[cfg(test)]
#[path = "run_params_test.rs"]
mod tests;
