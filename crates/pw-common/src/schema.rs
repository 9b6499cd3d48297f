//! Schema versioning and compatibility.

use schemars::schema_for;
use serde_json::Value;

use crate::record::{ProgressRecord, RunSummary, TelemetryRecord};

/// Current schema version for every persisted record.
///
/// Follows semver: MAJOR.MINOR.PATCH
/// - MAJOR: Breaking changes (field removals, type changes)
/// - MINOR: Additive changes (new optional fields)
/// - PATCH: Bug fixes, documentation
pub const SCHEMA_VERSION: &str = "1.0.0";

fn major(version: &str) -> Option<u32> {
    version.split('.').next()?.parse().ok()
}

/// Readers accept any record whose major version matches ours.
pub fn is_compatible(version: &str) -> bool {
    match (major(SCHEMA_VERSION), major(version)) {
        (Some(ours), Some(theirs)) => ours == theirs,
        _ => false,
    }
}

/// JSON Schemas for the persisted documents, keyed by file name.
///
/// Dashboards tailing the logs can validate lines against these.
pub fn record_schemas() -> Vec<(&'static str, Value)> {
    let schemas = [
        ("telemetry.log", serde_json::to_value(schema_for!(TelemetryRecord))),
        ("progress.log", serde_json::to_value(schema_for!(ProgressRecord))),
        ("summary.json", serde_json::to_value(schema_for!(RunSummary))),
    ];
    schemas
        .into_iter()
        .map(|(name, value)| (name, value.unwrap_or(Value::Null)))
        .collect()
}
