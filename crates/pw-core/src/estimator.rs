//! Remaining-time estimation.
//!
//! Blends the live pace of the current run with the median duration of
//! recent sibling runs, and scores how far the estimate can be trusted
//! from how much history there is and how dispersed it is.
//!
//! # Model
//!
//! - pace = elapsed × (100 − p) / p
//! - baseline = median(history) × (100 − p) / 100
//! - eta = max(0, 0.7 × pace + 0.3 × baseline)
//! - confidence = 100 × (0.6 × min(1, n/20) + 0.4 × max(0, 1 − min(1, cv))),
//!   clamped to [20, 95]

use pw_math::{clamp_or, clamp_percent, coefficient_of_variation, median, round_to};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::history;

/// Weight of the live pace in the blended estimate.
pub const PACE_WEIGHT: f64 = 0.7;
/// Weight of the historical baseline in the blended estimate.
pub const BASELINE_WEIGHT: f64 = 0.3;

/// Confidence reported for a pace-only estimate.
pub const PACE_ONLY_CONFIDENCE: f64 = 45.0;
/// History-only confidence with no prior runs.
pub const EMPTY_HISTORY_CONFIDENCE: f64 = 35.0;
/// History-only confidence with exactly one prior run.
pub const SINGLE_RUN_CONFIDENCE: f64 = 45.0;

pub const MIN_CONFIDENCE: f64 = 20.0;
pub const MAX_CONFIDENCE: f64 = 95.0;

/// History size at which the size component saturates.
const FULL_HISTORY_RUNS: f64 = 20.0;
const SIZE_SCORE_WEIGHT: f64 = 0.6;
const VARIANCE_SCORE_WEIGHT: f64 = 0.4;

/// Output of one estimation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Remaining seconds; `None` while nothing has progressed.
    pub eta_seconds: Option<f64>,
    /// Confidence in [20, 95], two decimals.
    pub confidence_percent: f64,
}

/// Confidence derived from history alone.
pub fn history_confidence(history: &[f64]) -> f64 {
    let raw = match history.len() {
        0 => EMPTY_HISTORY_CONFIDENCE,
        1 => SINGLE_RUN_CONFIDENCE,
        n => {
            let size_score = (n as f64 / FULL_HISTORY_RUNS).min(1.0);
            let variance_score = coefficient_of_variation(history)
                .map(|cv| (1.0 - cv.min(1.0)).max(0.0))
                .unwrap_or(0.0);
            100.0 * (SIZE_SCORE_WEIGHT * size_score + VARIANCE_SCORE_WEIGHT * variance_score)
        }
    };
    finalize_confidence(raw)
}

fn finalize_confidence(raw: f64) -> f64 {
    round_to(clamp_or(raw, MIN_CONFIDENCE, MAX_CONFIDENCE), 2)
}

/// ETA estimator over an immutable duration history.
#[derive(Debug, Clone)]
pub struct EtaEstimator {
    history: Vec<f64>,
    baseline_total: Option<f64>,
    history_confidence: f64,
}

impl EtaEstimator {
    /// Build from raw durations. Non-finite and non-positive entries are dropped.
    pub fn new(durations: impl IntoIterator<Item = f64>) -> Self {
        let history: Vec<f64> = durations
            .into_iter()
            .filter(|d| d.is_finite() && *d > 0.0)
            .collect();
        let baseline_total = median(&history);
        let history_confidence = history_confidence(&history);
        Self {
            history,
            baseline_total,
            history_confidence,
        }
    }

    /// Load up to `limit` recent sibling run durations from `runs_root`.
    pub fn from_runs(runs_root: &Path, exclude: Option<&Path>, limit: usize) -> Self {
        let estimator = Self::new(history::load_durations(runs_root, exclude, limit));
        debug!(
            runs = estimator.history.len(),
            baseline_secs = ?estimator.baseline_total,
            confidence = estimator.history_confidence,
            "eta history loaded"
        );
        estimator
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Median of past run durations, if any.
    pub fn baseline_total(&self) -> Option<f64> {
        self.baseline_total
    }

    pub fn history_confidence(&self) -> f64 {
        self.history_confidence
    }

    /// Estimate remaining seconds after `elapsed_secs` at `progress_percent`.
    pub fn estimate(&self, elapsed_secs: f64, progress_percent: f64) -> Estimate {
        let elapsed = if elapsed_secs.is_finite() {
            elapsed_secs.max(0.0)
        } else {
            0.0
        };
        let progress = clamp_percent(progress_percent);

        if progress <= 0.0 {
            return Estimate {
                eta_seconds: None,
                confidence_percent: self.history_confidence,
            };
        }

        let remaining_fraction = (100.0 - progress) / 100.0;
        let pace = elapsed * (100.0 - progress) / progress;

        let Some(baseline_total) = self.baseline_total else {
            return Estimate {
                eta_seconds: finite(pace),
                confidence_percent: finalize_confidence(PACE_ONLY_CONFIDENCE),
            };
        };

        let baseline = baseline_total * remaining_fraction;
        let eta = (PACE_WEIGHT * pace + BASELINE_WEIGHT * baseline).max(0.0);
        Estimate {
            eta_seconds: finite(eta),
            confidence_percent: self.history_confidence,
        }
    }
}

/// Overflowing paces (vanishing progress) are not estimable either.
fn finite(eta: f64) -> Option<f64> {
    eta.is_finite().then_some(eta)
}

impl Default for EtaEstimator {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
