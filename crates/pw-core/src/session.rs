//! One instrumented pipeline run.
//!
//! A session owns the run directory, the sampler, and the emitter. The
//! driver constructs one per run and passes the emitter around by
//! reference; there is no process-wide instance.

use chrono::{DateTime, Utc};
use pw_common::{Error, Result, RunId, RunSummary};
use pw_config::InstrumentConfig;
use pw_math::round_to;
use pw_telemetry::{Sampler, PROGRESS_LOG, TELEMETRY_LOG};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::emitter::ProgressEmitter;
use crate::estimator::EtaEstimator;
use crate::history::{self, SUMMARY_FILE};

/// Paths of one run's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    run_dir: PathBuf,
}

impl RunLayout {
    pub fn new(runs_root: &Path, run_id: &RunId) -> Self {
        Self {
            run_dir: runs_root.join(run_id.as_str()),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn telemetry_log(&self) -> PathBuf {
        self.run_dir.join(TELEMETRY_LOG)
    }

    pub fn progress_log(&self) -> PathBuf {
        self.run_dir.join(PROGRESS_LOG)
    }

    pub fn summary(&self) -> PathBuf {
        self.run_dir.join(SUMMARY_FILE)
    }
}

/// A running instrumented pipeline run.
#[derive(Debug)]
pub struct RunSession {
    run_id: RunId,
    layout: RunLayout,
    started_at: DateTime<Utc>,
    emitter: ProgressEmitter,
    sampler: Sampler,
}

impl RunSession {
    /// Create the run directory and start sampling with the default source.
    pub fn start(config: &InstrumentConfig) -> Result<Self> {
        Self::start_with(config, |sampler| sampler)
    }

    /// Like `start`, letting the caller adjust the sampler before it runs,
    /// e.g. to install an error probe.
    pub fn start_with(
        config: &InstrumentConfig,
        configure: impl FnOnce(Sampler) -> Sampler,
    ) -> Result<Self> {
        config.validate()?;
        let started_at = Utc::now();

        let run_id = RunId::new();
        let layout = RunLayout::new(&config.runs_root, &run_id);
        if layout.run_dir().exists() {
            return Err(Error::RunDirectoryExists(
                layout.run_dir().display().to_string(),
            ));
        }
        fs::create_dir_all(layout.run_dir())?;

        let estimator = EtaEstimator::from_runs(
            &config.runs_root,
            Some(layout.run_dir()),
            config.estimator.history_limit,
        );
        let emitter =
            ProgressEmitter::open(layout.progress_log(), config.categories.clone(), estimator)?;

        let mut sampler = configure(Sampler::new(layout.telemetry_log(), config.sampler.clone()));
        sampler.start();

        info!(
            run_id = %run_id,
            run_dir = %layout.run_dir().display(),
            history_runs = emitter.estimator().history().len(),
            telemetry = !sampler.is_disabled(),
            "run instrumentation started"
        );

        Ok(Self {
            run_id,
            layout,
            started_at,
            emitter,
            sampler,
        })
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn emitter(&self) -> &ProgressEmitter {
        &self.emitter
    }

    pub fn emitter_mut(&mut self) -> &mut ProgressEmitter {
        &mut self.emitter
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Stop sampling and write the summary later runs learn from.
    pub fn finish(mut self) -> Result<RunSummary> {
        self.sampler.stop();

        let summary = RunSummary::new(
            self.run_id.clone(),
            self.started_at,
            Utc::now(),
            round_to(self.emitter.overall_progress(), 4),
            self.sampler.is_disabled(),
        );
        let path = history::write_summary(self.layout.run_dir(), &summary)?;

        info!(
            run_id = %self.run_id,
            duration_secs = summary.duration_seconds,
            overall = summary.final_overall_progress_percent,
            samples = self.sampler.samples_written(),
            summary = %path.display(),
            "run instrumentation finished"
        );
        Ok(summary)
    }
}
