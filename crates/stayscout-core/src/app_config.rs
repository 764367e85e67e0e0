use std::path::PathBuf;

#[derive(Clone)]
pub struct AppConfig {
    pub log_level: String,
    /// Base URL of a Browserless-compatible rendering service. When unset,
    /// pages are fetched directly.
    pub renderer_url: Option<String>,
    pub renderer_token: Option<String>,
    pub user_agent: String,
    pub nav_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub request_delay_secs: f64,
    pub page_limit: u32,
    pub detail_limit: usize,
    pub photo_limit: usize,
    /// Per-source wall-clock budget; the task is cancelled and returns its
    /// partial results when exceeded.
    pub task_timeout_secs: Option<u64>,
    pub profiles_path: Option<PathBuf>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("log_level", &self.log_level)
            .field("renderer_url", &self.renderer_url)
            .field(
                "renderer_token",
                &self.renderer_token.as_ref().map(|_| "[redacted]"),
            )
            .field("user_agent", &self.user_agent)
            .field("nav_timeout_secs", &self.nav_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("request_delay_secs", &self.request_delay_secs)
            .field("page_limit", &self.page_limit)
            .field("detail_limit", &self.detail_limit)
            .field("photo_limit", &self.photo_limit)
            .field("task_timeout_secs", &self.task_timeout_secs)
            .field("profiles_path", &self.profiles_path)
            .finish()
    }
}
