pub mod app_config;
pub mod config;
pub mod records;
pub mod run_params;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use records::{
    normalize_name, DetailRecord, ListingRecord, PhotoRecord, Source, UnifiedEntity,
    MAX_AMENITIES, MAX_DETAIL_IMAGES, MAX_RATING,
};
pub use run_params::RunParams;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("validation error: {0}")]
    Validation(String),
}
