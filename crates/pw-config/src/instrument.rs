//! Top-level instrumentation configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::categories::CategoryTable;
use crate::validate::{ValidationError, ValidationResult};
use crate::CONFIG_SCHEMA_VERSION;

/// Default sampler cadence.
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 500;

/// Default bound on how long `stop()` waits for the sampler loop.
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 2_000;

/// Default number of sibling run summaries read into history.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Default directory holding one subdirectory per run.
pub const DEFAULT_RUNS_ROOT: &str = "runs";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSettings {
    /// Interval between resource samples.
    pub interval_ms: u64,
    /// Upper bound on the join performed by `stop()`.
    pub stop_timeout_ms: u64,
}

impl SamplerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorSettings {
    /// Maximum sibling summaries loaded, most recent first.
    pub history_limit: usize,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Complete configuration for one instrumented run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    pub schema_version: String,
    /// Parent directory of all run directories.
    pub runs_root: PathBuf,
    pub sampler: SamplerSettings,
    pub estimator: EstimatorSettings,
    pub categories: CategoryTable,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION.to_string(),
            runs_root: PathBuf::from(DEFAULT_RUNS_ROOT),
            sampler: SamplerSettings::default(),
            estimator: EstimatorSettings::default(),
            categories: CategoryTable::default(),
        }
    }
}

impl InstrumentConfig {
    /// Defaults with a different runs root.
    pub fn with_runs_root(runs_root: impl Into<PathBuf>) -> Self {
        Self {
            runs_root: runs_root.into(),
            ..Self::default()
        }
    }

    /// Load and validate from a JSON file.
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ValidationError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse_json(&content)
    }

    /// Parse and validate from a JSON string.
    pub fn parse_json(json: &str) -> ValidationResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if !pw_common::schema::is_compatible(&self.schema_version) {
            return Err(ValidationError::SchemaVersion(self.schema_version.clone()));
        }
        if self.sampler.interval_ms == 0 {
            return Err(ValidationError::Sampler(
                "interval_ms must be positive".to_string(),
            ));
        }
        if self.sampler.stop_timeout_ms == 0 {
            return Err(ValidationError::Sampler(
                "stop_timeout_ms must be positive".to_string(),
            ));
        }
        if self.estimator.history_limit == 0 {
            return Err(ValidationError::Estimator(
                "history_limit must be at least 1".to_string(),
            ));
        }
        self.categories.validate()
    }
}
