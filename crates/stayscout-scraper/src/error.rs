use stayscout_core::Source;
use thiserror::Error;

/// Run-level errors. Only session startup is fatal to a source task; every
/// page- and field-level condition is recovered and logged instead.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("failed to open renderer session for {site}: {cause}")]
    SessionStartup {
        site: Source,
        #[source]
        cause: RenderError,
    },

    #[error("failed to read profiles file {path}: {source}")]
    ProfileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse profiles file: {0}")]
    ProfileParse(#[from] serde_yaml::Error),

    #[error("invalid profile for {site}: {reason}")]
    InvalidProfile { site: Source, reason: String },

    #[error("field '{field}' has no candidate selectors")]
    EmptyFieldSpec { field: String },

    #[error("invalid numeric pattern for field '{field}': {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("source task for {site} did not complete: {reason}")]
    TaskAborted { site: Source, reason: String },
}

/// Failures reported by a renderer binding.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("rendering service returned {status}: {message}")]
    Browserless { status: u16, message: String },

    #[error("navigation to {url} did not settle within {after_ms} ms")]
    Timeout { url: String, after_ms: u64 },

    #[error("invalid selector \"{selector}\": {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("no page is loaded in this session")]
    NoPage,

    #[error("element cannot be clicked: {reason}")]
    NotClickable { reason: String },
}

impl RenderError {
    /// Returns `true` for conditions worth another navigation attempt.
    ///
    /// Selector and URL errors are deterministic and are never retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            RenderError::Http(_)
            | RenderError::Status { .. }
            | RenderError::Browserless { .. }
            | RenderError::Timeout { .. }
            | RenderError::NoPage => true,
            RenderError::InvalidSelector { .. }
            | RenderError::InvalidUrl { .. }
            | RenderError::NotClickable { .. } => false,
        }
    }
}

/// Why a single field on a record could not be populated.
///
/// Never fatal: the field degrades to its absent state and the rest of the
/// record is still extracted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MissingField {
    #[error("no candidate selector matched field '{field}'")]
    Unresolved { field: String },

    #[error("field '{field}' has no numeric content in {text:?}")]
    Malformed { field: String, text: String },
}
