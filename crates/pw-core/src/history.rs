//! Run summaries: writing them at the end of a run and reading sibling
//! runs' durations back as estimator history.

use pw_common::RunSummary;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;

/// File name of the summary document inside a run directory.
pub const SUMMARY_FILE: &str = "summary.json";

/// Field read from sibling summaries.
pub const DURATION_FIELD: &str = "duration_seconds";

/// Why a sibling summary was left out of history.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} has no numeric duration_seconds")]
    MissingDuration { path: PathBuf },

    #[error("{path} has unusable duration_seconds {value}")]
    InvalidDuration { path: PathBuf, value: f64 },
}

impl HistoryError {
    fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. }
            | Self::Json { path, .. }
            | Self::MissingDuration { path }
            | Self::InvalidDuration { path, .. } => path,
        }
    }
}

impl From<HistoryError> for pw_common::Error {
    fn from(err: HistoryError) -> Self {
        pw_common::Error::MalformedHistory {
            path: err.path().display().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Extract a strictly positive, finite duration from one summary document.
pub fn read_summary_duration(path: &Path) -> Result<f64, HistoryError> {
    let content = fs::read_to_string(path).map_err(|e| HistoryError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let doc: Value = serde_json::from_str(&content).map_err(|e| HistoryError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;

    let value = doc
        .get(DURATION_FIELD)
        .and_then(Value::as_f64)
        .ok_or_else(|| HistoryError::MissingDuration {
            path: path.to_path_buf(),
        })?;

    if !value.is_finite() || value <= 0.0 {
        return Err(HistoryError::InvalidDuration {
            path: path.to_path_buf(),
            value,
        });
    }
    Ok(value)
}

/// Summary files of sibling runs, most recent first.
///
/// Recency is the summary's modification time, ties broken by directory
/// name descending. `exclude` names a run directory to leave out.
pub fn sibling_summaries(runs_root: &Path, exclude: Option<&Path>) -> Vec<PathBuf> {
    let entries = match fs::read_dir(runs_root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %runs_root.display(), error = %e, "no run history available");
            return Vec::new();
        }
    };
    let excluded = exclude.and_then(Path::file_name);

    let mut found: Vec<(SystemTime, String, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|entry| Some(entry.file_name().as_os_str()) != excluded)
        .filter_map(|entry| {
            let summary = entry.path().join(SUMMARY_FILE);
            let modified = fs::metadata(&summary).ok()?.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            let name = entry.file_name().to_string_lossy().into_owned();
            Some((modified, name, summary))
        })
        .collect();

    found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    found.into_iter().map(|(_, _, path)| path).collect()
}

/// Durations of up to `limit` most recent sibling runs.
///
/// The limit bounds how many summaries are read; unusable ones are dropped
/// afterwards, so fewer than `limit` values may come back.
pub fn load_durations(runs_root: &Path, exclude: Option<&Path>, limit: usize) -> Vec<f64> {
    sibling_summaries(runs_root, exclude)
        .into_iter()
        .take(limit)
        .filter_map(|path| match read_summary_duration(&path) {
            Ok(duration) => Some(duration),
            Err(e) => {
                debug!(error = %e, "skipping run summary");
                None
            }
        })
        .collect()
}

/// Write `summary` into `run_dir`, replacing any previous summary atomically.
pub fn write_summary(run_dir: &Path, summary: &RunSummary) -> pw_common::Result<PathBuf> {
    let path = run_dir.join(SUMMARY_FILE);
    let tmp = run_dir.join(format!("{SUMMARY_FILE}.tmp"));
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(&tmp, json)?;
    fs::rename(&tmp, &path)?;
    Ok(path)
}
