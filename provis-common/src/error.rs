use std::sync::Arc;

use thiserror::Error;

/// Errors for things that are not resolution outcomes: misconfiguration,
/// unreadable snapshots, malformed versions. Resolution failures are reported
/// through [`crate::status::Status`] instead.
#[derive(Error, Debug, Clone)]
pub enum ProvisError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Semantic Versioning Error: {0}")]
    SemVer(#[from] Arc<semver::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Version error: {0}")]
    VersionError(String),

    #[error("Invalid version range '{0}': {1}")]
    InvalidRange(String, String),

    #[error("Invalid planner options: {0}")]
    InvalidOptions(String),

    #[error("Parsing Error in {0}: {1}")]
    ParseError(&'static str, String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl From<std::io::Error> for ProvisError {
    fn from(err: std::io::Error) -> Self {
        ProvisError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for ProvisError {
    fn from(err: serde_json::Error) -> Self {
        ProvisError::Json(Arc::new(err))
    }
}

impl From<semver::Error> for ProvisError {
    fn from(err: semver::Error) -> Self {
        ProvisError::SemVer(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ProvisError>;
