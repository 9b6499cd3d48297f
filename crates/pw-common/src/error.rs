//! Error types for Pipewatch.

use thiserror::Error;

/// Result type alias for Pipewatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Pipewatch.
///
/// Only construction-time operations surface these. Per-call paths on the
/// emitter and sampler degrade instead of returning errors.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid category table: {0}")]
    InvalidCategoryTable(String),

    // Capability errors (20-29)
    #[error("capability not available: {0}")]
    CapabilityMissing(String),

    #[error("sample read failed: {0}")]
    SampleFailed(String),

    // History errors (30-39)
    #[error("malformed run summary at {path}: {reason}")]
    MalformedHistory { path: String, reason: String },

    // Run layout errors (50-59)
    #[error("run directory already exists: {0}")]
    RunDirectoryExists(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidCategoryTable(_) => 11,
            Error::CapabilityMissing(_) => 20,
            Error::SampleFailed(_) => 21,
            Error::MalformedHistory { .. } => 30,
            Error::RunDirectoryExists(_) => 50,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }
}
