//! Pipewatch common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the pw-* crates:
//! - Run identity
//! - Schema versioning and JSON Schema export for dashboards
//! - The two append-only record types and the run summary
//! - Common error types

pub mod error;
pub mod id;
pub mod record;
pub mod schema;

pub use error::{Error, Result};
pub use id::RunId;
pub use record::{ProgressRecord, RunSummary, TelemetryRecord};
pub use schema::SCHEMA_VERSION;
