//! Stage progress tracking and weighted overall progress.
//!
//! The pipeline driver calls `stage_start` / `stage_update` / `stage_end`
//! as it works. Every call folds the stage's progress into its category,
//! recomputes overall progress, asks the estimator for an ETA, and appends
//! one `ProgressRecord` to `progress.log`.
//!
//! State is mutated through `&mut self`; callers sharing an emitter across
//! threads serialize access themselves.

use chrono::Utc;
use pw_common::schema::SCHEMA_VERSION;
use pw_common::ProgressRecord;
use pw_config::CategoryTable;
use pw_math::{clamp_percent, round_to};
use pw_telemetry::{JsonlWriter, WriteError};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

use crate::estimator::EtaEstimator;

/// Progress added per update when a stage's item total is unknown.
pub const UNKNOWN_TOTAL_STEP: f64 = 5.0;
/// Ceiling for progress of stages with unknown totals until they end.
pub const UNKNOWN_TOTAL_CAP: f64 = 99.0;

const PERCENT_DECIMALS: u32 = 4;
const CONFIDENCE_DECIMALS: u32 = 2;
const ETA_DECIMALS: u32 = 2;

/// Per-stage counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageState {
    pub items_done: u64,
    /// Zero while the total is unknown.
    pub items_total: u64,
    pub progress: f64,
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Tracks stage lifecycles and persists progress records.
pub struct ProgressEmitter {
    writer: JsonlWriter,
    table: CategoryTable,
    estimator: EtaEstimator,
    started: Instant,
    stages: HashMap<String, StageState>,
    category_progress: BTreeMap<String, f64>,
    overall: f64,
    write_failures: u64,
}

impl ProgressEmitter {
    /// Open `log_path` for appending and start the elapsed-time clock.
    pub fn open(
        log_path: impl Into<PathBuf>,
        table: CategoryTable,
        estimator: EtaEstimator,
    ) -> Result<Self, WriteError> {
        let writer = JsonlWriter::open(log_path)?;
        let category_progress = table
            .category_names()
            .map(|name| (name.to_string(), 0.0))
            .collect();
        Ok(Self {
            writer,
            table,
            estimator,
            started: Instant::now(),
            stages: HashMap::new(),
            category_progress,
            overall: 0.0,
            write_failures: 0,
        })
    }

    /// A stage begins: counters reset, progress 0.
    pub fn stage_start(&mut self, stage: &str, items_total: Option<i64>) -> ProgressRecord {
        let state = self.stages.entry(stage.to_string()).or_default();
        *state = StageState {
            items_done: 0,
            items_total: items_total.map(non_negative).unwrap_or(0),
            progress: 0.0,
        };
        self.emit(stage)
    }

    /// A stage reports work done.
    ///
    /// With a known total, progress is the completed fraction. Without one it
    /// creeps up by a fixed step and stalls below 100 until the stage ends.
    pub fn stage_update(
        &mut self,
        stage: &str,
        items_done: i64,
        items_total: Option<i64>,
    ) -> ProgressRecord {
        if !self.stages.contains_key(stage) {
            debug!(stage, "stage updated before start");
        }
        if items_done < 0 {
            debug!(stage, items_done, "negative items_done clamped to 0");
        }

        let state = self.stages.entry(stage.to_string()).or_default();
        state.items_done = non_negative(items_done);
        if let Some(total) = items_total.filter(|t| *t > 0) {
            state.items_total = non_negative(total);
        }
        state.progress = if state.items_total > 0 {
            clamp_percent(100.0 * state.items_done as f64 / state.items_total as f64)
        } else {
            (state.progress + UNKNOWN_TOTAL_STEP).min(UNKNOWN_TOTAL_CAP)
        };
        self.emit(stage)
    }

    /// A stage finishes: done equals total and progress is 100.
    pub fn stage_end(&mut self, stage: &str) -> ProgressRecord {
        if !self.stages.contains_key(stage) {
            debug!(stage, "stage ended before start");
        }

        let state = self.stages.entry(stage.to_string()).or_default();
        if state.items_total == 0 {
            state.items_total = state.items_done.max(1);
        }
        state.items_done = state.items_total;
        state.progress = 100.0;
        self.emit(stage)
    }

    fn emit(&mut self, stage: &str) -> ProgressRecord {
        let state = self.stages.get(stage).cloned().unwrap_or_default();

        let category = self.table.category_for(stage);
        let tracked = self
            .category_progress
            .entry(category.to_string())
            .or_insert(0.0);
        if state.progress > *tracked {
            *tracked = state.progress;
        }
        self.overall = self.weighted_overall();

        let elapsed = self.started.elapsed().as_secs_f64();
        let estimate = self.estimator.estimate(elapsed, self.overall);

        let record = ProgressRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp: Utc::now(),
            stage: stage.to_string(),
            stage_progress_percent: round_to(state.progress, PERCENT_DECIMALS),
            overall_progress_percent: round_to(self.overall, PERCENT_DECIMALS),
            items_done: state.items_done,
            items_total: state.items_total,
            eta_seconds: estimate.eta_seconds.map(|eta| round_to(eta, ETA_DECIMALS)),
            eta_confidence_percent: round_to(estimate.confidence_percent, CONFIDENCE_DECIMALS),
        };

        if let Err(e) = self.writer.append(&record) {
            self.write_failures += 1;
            warn!(stage, error = %e, "failed to append progress record");
        }
        record
    }

    fn weighted_overall(&self) -> f64 {
        let total: f64 = self
            .table
            .categories
            .iter()
            .map(|cat| {
                let progress = self.category_progress.get(&cat.name).copied().unwrap_or(0.0);
                cat.weight / 100.0 * progress
            })
            .sum();
        clamp_percent(total)
    }

    /// Current overall progress, unrounded.
    pub fn overall_progress(&self) -> f64 {
        self.overall
    }

    /// Highest progress seen for a category.
    pub fn category_progress(&self, category: &str) -> Option<f64> {
        self.category_progress.get(category).copied()
    }

    pub fn stage(&self, stage: &str) -> Option<&StageState> {
        self.stages.get(stage)
    }

    /// Last progress reported for `stage`, unrounded.
    pub fn stage_progress(&self, stage: &str) -> Option<f64> {
        self.stages.get(stage).map(|s| s.progress)
    }

    pub fn estimator(&self) -> &EtaEstimator {
        &self.estimator
    }

    pub fn log_path(&self) -> &Path {
        self.writer.path()
    }

    /// Records that could not be appended to the log.
    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }
}

impl std::fmt::Debug for ProgressEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressEmitter")
            .field("log_path", &self.writer.path())
            .field("stages", &self.stages.len())
            .field("overall", &self.overall)
            .field("write_failures", &self.write_failures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pw_config::CategorySpec;
    use tempfile::TempDir;

    fn emitter(tmp: &TempDir) -> ProgressEmitter {
        ProgressEmitter::open(
            tmp.path().join("progress.log"),
            CategoryTable::default(),
            EtaEstimator::default(),
        )
        .unwrap()
    }

    #[test]
    fn start_resets_stage() {
        let tmp = TempDir::new().unwrap();
        let mut em = emitter(&tmp);

        em.stage_update("ocr", 7, Some(10));
        let record = em.stage_start("ocr", Some(20));
        assert_eq!(record.items_done, 0);
        assert_eq!(record.items_total, 20);
        assert_eq!(record.stage_progress_percent, 0.0);
        // category keeps its maximum
        assert_eq!(em.category_progress("processing"), Some(70.0));
    }

    #[test]
    fn known_total_progress_fraction() {
        let tmp = TempDir::new().unwrap();
        let mut em = emitter(&tmp);

        em.stage_start("ocr", Some(3));
        let record = em.stage_update("ocr", 1, None);
        assert_eq!(record.stage_progress_percent, 33.3333);
        // processing weighs 40
        assert_eq!(record.overall_progress_percent, 13.3333);
    }

    #[test]
    fn done_beyond_total_is_clamped() {
        let tmp = TempDir::new().unwrap();
        let mut em = emitter(&tmp);
        let record = em.stage_update("download", 15, Some(10));
        assert_eq!(record.stage_progress_percent, 100.0);
        assert_eq!(record.overall_progress_percent, 20.0);
    }

    #[test]
    fn unknown_total_creeps_and_caps() {
        let tmp = TempDir::new().unwrap();
        let mut em = emitter(&tmp);

        em.stage_start("extract", None);
        let mut last = 0.0;
        for _ in 0..30 {
            last = em.stage_update("extract", 1, None).stage_progress_percent;
        }
        assert_eq!(last, UNKNOWN_TOTAL_CAP);

        let first = {
            let mut em = emitter(&tmp);
            em.stage_start("extract", None);
            em.stage_update("extract", 0, None).stage_progress_percent
        };
        assert_eq!(first, 5.0);
    }

    #[test]
    fn negative_done_and_non_positive_total() {
        let tmp = TempDir::new().unwrap();
        let mut em = emitter(&tmp);

        em.stage_start("ocr", Some(-4));
        assert_eq!(em.stage("ocr").unwrap().items_total, 0);

        em.stage_start("parse", Some(10));
        let record = em.stage_update("parse", -3, Some(0));
        assert_eq!(record.items_done, 0);
        assert_eq!(record.items_total, 10);
        assert_eq!(record.stage_progress_percent, 0.0);
    }

    #[test]
    fn end_without_total_uses_done() {
        let tmp = TempDir::new().unwrap();
        let mut em = emitter(&tmp);

        em.stage_start("search", None);
        em.stage_update("search", 42, None);
        let record = em.stage_end("search");
        assert_eq!(record.items_total, 42);
        assert_eq!(record.items_done, 42);
        assert_eq!(record.stage_progress_percent, 100.0);

        let record = em.stage_end("never-started");
        assert_eq!(record.items_total, 1);
        assert_eq!(record.items_done, 1);
    }

    #[test]
    fn unknown_stage_uses_fallback() {
        let tmp = TempDir::new().unwrap();
        let mut em = emitter(&tmp);
        em.stage_end("mystery-step");
        assert_eq!(em.category_progress("processing"), Some(100.0));
        assert_eq!(em.overall_progress(), 40.0);
    }

    #[test]
    fn eta_absent_until_progress() {
        let tmp = TempDir::new().unwrap();
        let mut em = emitter(&tmp);

        let record = em.stage_start("ocr", Some(10));
        assert_eq!(record.eta_seconds, None);
        assert_eq!(record.eta_confidence_percent, 35.0);

        let record = em.stage_update("ocr", 5, None);
        assert!(record.eta_seconds.unwrap() >= 0.0);
        assert_eq!(record.eta_confidence_percent, 45.0);
    }

    #[test]
    fn records_are_appended_in_order() {
        let tmp = TempDir::new().unwrap();
        let mut em = emitter(&tmp);

        let emitted = vec![
            em.stage_start("download", Some(4)),
            em.stage_update("download", 2, None),
            em.stage_end("download"),
        ];

        let content = std::fs::read_to_string(tmp.path().join("progress.log")).unwrap();
        let logged: Vec<ProgressRecord> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(logged, emitted);
        assert_eq!(em.write_failures(), 0);
    }

    #[test]
    fn zero_weight_category_does_not_move_overall() {
        let tmp = TempDir::new().unwrap();
        let table = CategoryTable::new(
            vec![CategorySpec::new("noise", 0.0), CategorySpec::new("work", 100.0)],
            [("lint", "noise")],
            "work",
        )
        .unwrap();
        let mut em =
            ProgressEmitter::open(tmp.path().join("p.log"), table, EtaEstimator::default())
                .unwrap();

        let record = em.stage_end("lint");
        assert_eq!(record.overall_progress_percent, 0.0);
        assert_eq!(em.category_progress("noise"), Some(100.0));
    }
}
