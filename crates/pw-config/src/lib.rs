//! Pipewatch configuration loading and validation.
//!
//! This crate provides:
//! - The stage → category and category → weight tables
//! - `InstrumentConfig` with sampler and estimator settings
//! - JSON loading with per-field defaults
//! - Semantic validation

pub mod categories;
pub mod instrument;
pub mod validate;

pub use categories::{CategorySpec, CategoryTable};
pub use instrument::{EstimatorSettings, InstrumentConfig, SamplerSettings};
pub use validate::{ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
