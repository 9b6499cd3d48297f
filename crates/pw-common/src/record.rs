//! Persisted record types.
//!
//! `TelemetryRecord` and `ProgressRecord` are written one-per-line to
//! `telemetry.log` and `progress.log`. Both are immutable once built; the
//! writers only ever append them. `RunSummary` is the per-run document that
//! later runs read back as duration history.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::id::RunId;
use crate::schema::SCHEMA_VERSION;

/// One resource sample taken by the sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TelemetryRecord {
    pub schema_version: String,
    pub timestamp: DateTime<Utc>,
    /// Cumulative bytes sent across all interfaces.
    pub bytes_sent: u64,
    /// Cumulative bytes received across all interfaces.
    pub bytes_recv: u64,
    pub send_bytes_per_sec: f64,
    pub recv_bytes_per_sec: f64,
    /// Resident set size of the sampled process.
    pub rss_bytes: u64,
    /// Virtual memory size of the sampled process.
    pub vms_bytes: u64,
    /// Process CPU usage, clamped to [0, 100].
    pub cpu_percent: f64,
    /// Out-of-memory risk heuristic in [0, 100].
    pub crash_risk_percent: f64,
}

/// One stage transition reported by the progress emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressRecord {
    pub schema_version: String,
    pub timestamp: DateTime<Utc>,
    pub stage: String,
    pub stage_progress_percent: f64,
    /// Weighted progress across all categories; never decreases within a run.
    pub overall_progress_percent: f64,
    pub items_done: u64,
    pub items_total: u64,
    /// Remaining seconds, `null` while not yet estimable.
    pub eta_seconds: Option<f64>,
    pub eta_confidence_percent: f64,
}

/// Summary written when a run finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunSummary {
    pub schema_version: String,
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub final_overall_progress_percent: f64,
    /// Whether resource sampling was unavailable for this run.
    #[serde(default)]
    pub telemetry_disabled: bool,
}

impl RunSummary {
    pub fn new(
        run_id: RunId,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        final_overall_progress_percent: f64,
        telemetry_disabled: bool,
    ) -> Self {
        let duration_ms = finished_at
            .signed_duration_since(started_at)
            .num_milliseconds()
            .max(0);
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id,
            started_at,
            finished_at,
            duration_seconds: duration_ms as f64 / 1000.0,
            final_overall_progress_percent,
            telemetry_disabled,
        }
    }
}
