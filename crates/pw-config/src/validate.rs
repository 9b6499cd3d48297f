//! Configuration validation errors.

use thiserror::Error;

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported config schema version: {0}")]
    SchemaVersion(String),

    #[error("invalid sampler settings: {0}")]
    Sampler(String),

    #[error("invalid estimator settings: {0}")]
    Estimator(String),

    #[error("invalid category table: {0}")]
    Categories(String),
}

impl From<ValidationError> for pw_common::Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Categories(msg) => pw_common::Error::InvalidCategoryTable(msg),
            other => pw_common::Error::Config(other.to_string()),
        }
    }
}
