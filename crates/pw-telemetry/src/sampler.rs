//! Background resource sampler.
//!
//! The sampler owns `telemetry.log`. It runs on its own thread, wakes every
//! interval, and appends one `TelemetryRecord` per successful tick. Nothing
//! it does can fail the caller: an unavailable metrics capability disables
//! it for the rest of the run, and a failed tick is skipped.

use chrono::Utc;
use pw_common::schema::SCHEMA_VERSION;
use pw_common::TelemetryRecord;
use pw_config::SamplerSettings;
use pw_math::clamp_percent;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::risk::crash_risk_percent;
use crate::source::{MetricsSource, ProbeError, RawSample, SysinfoSource};
use crate::writer::JsonlWriter;

/// Lower bound on the elapsed time used as a throughput denominator.
const MIN_ELAPSED_SECS: f64 = 1e-6;

/// Builds the metrics source when sampling starts.
pub type SourceFactory =
    Arc<dyn Fn() -> Result<Box<dyn MetricsSource>, ProbeError> + Send + Sync>;

/// Reports how many errors the host pipeline has seen recently.
pub type ErrorCountProbe = Arc<dyn Fn() -> u64 + Send + Sync>;

fn sysinfo_factory() -> SourceFactory {
    Arc::new(|| SysinfoSource::new().map(|s| Box::new(s) as Box<dyn MetricsSource>))
}

fn no_errors() -> ErrorCountProbe {
    Arc::new(|| 0)
}

#[derive(Debug, Default)]
struct SamplerStats {
    written: AtomicU64,
    skipped: AtomicU64,
}

struct Worker {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: JoinHandle<()>,
}

/// Cadence-driven collector of process and host resource usage.
pub struct Sampler {
    log_path: PathBuf,
    settings: SamplerSettings,
    factory: SourceFactory,
    error_probe: ErrorCountProbe,
    disabled: AtomicBool,
    stats: Arc<SamplerStats>,
    worker: Option<Worker>,
}

impl Sampler {
    /// Create a stopped sampler writing to `log_path`.
    pub fn new(log_path: impl Into<PathBuf>, settings: SamplerSettings) -> Self {
        Self {
            log_path: log_path.into(),
            settings,
            factory: sysinfo_factory(),
            error_probe: no_errors(),
            disabled: AtomicBool::new(false),
            stats: Arc::new(SamplerStats::default()),
            worker: None,
        }
    }

    /// Replace the metrics source factory.
    pub fn with_source_factory(mut self, factory: SourceFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Install a recent-error probe feeding the crash-risk bump.
    pub fn with_error_probe(mut self, probe: ErrorCountProbe) -> Self {
        self.error_probe = probe;
        self
    }

    /// Begin sampling on a background thread.
    ///
    /// Does nothing if already running or permanently disabled. If the
    /// metrics capability is unavailable the sampler becomes disabled.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            debug!("sampler already running");
            return;
        }
        if self.is_disabled() {
            return;
        }

        let source = match (self.factory)() {
            Ok(source) => source,
            Err(e) => {
                self.disable(&e.to_string());
                return;
            }
        };
        let writer = match JsonlWriter::open(&self.log_path) {
            Ok(writer) => writer,
            Err(e) => {
                self.disable(&e.to_string());
                return;
            }
        };

        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let mut sample_loop = SampleLoop {
            source,
            writer,
            error_probe: Arc::clone(&self.error_probe),
            stats: Arc::clone(&self.stats),
            interval: self.settings.interval(),
            last: None,
        };

        let spawned = thread::Builder::new()
            .name("pw-sampler".to_string())
            .spawn(move || {
                sample_loop.run(&stop_rx);
                let _ = done_tx.send(());
            });

        match spawned {
            Ok(handle) => {
                info!(
                    path = %self.log_path.display(),
                    interval_ms = self.settings.interval_ms,
                    "resource sampler started"
                );
                self.worker = Some(Worker {
                    stop_tx,
                    done_rx,
                    handle,
                });
            }
            Err(e) => self.disable(&format!("failed to spawn sampler thread: {e}")),
        }
    }

    /// Signal the loop to finish and wait for it, bounded by the stop timeout.
    ///
    /// Safe to call repeatedly and when the sampler never started.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = worker.stop_tx.send(());

        let timeout = self.settings.stop_timeout();
        match worker.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    warn!("sampler thread panicked");
                }
                debug!(
                    samples = self.samples_written(),
                    skipped = self.ticks_skipped(),
                    "resource sampler stopped"
                );
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "sampler did not stop in time; detaching"
                );
                // The detached loop may still append; never start a second writer.
                self.disable("sampler worker detached after stop timeout");
            }
        }
    }

    fn disable(&self, reason: &str) {
        self.disabled.store(true, Ordering::SeqCst);
        warn!(reason, "resource sampling disabled for this run");
    }

    /// Whether sampling was permanently disabled.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Records appended to the telemetry log so far.
    pub fn samples_written(&self) -> u64 {
        self.stats.written.load(Ordering::Relaxed)
    }

    /// Ticks dropped because a read or append failed.
    pub fn ticks_skipped(&self) -> u64 {
        self.stats.skipped.load(Ordering::Relaxed)
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("log_path", &self.log_path)
            .field("settings", &self.settings)
            .field("disabled", &self.is_disabled())
            .field("running", &self.is_running())
            .field("samples_written", &self.samples_written())
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
struct Counters {
    at: Instant,
    sent: u64,
    recv: u64,
}

/// State owned by the sampler thread.
struct SampleLoop {
    source: Box<dyn MetricsSource>,
    writer: JsonlWriter,
    error_probe: ErrorCountProbe,
    stats: Arc<SamplerStats>,
    interval: Duration,
    last: Option<Counters>,
}

impl SampleLoop {
    fn run(&mut self, stop_rx: &Receiver<()>) {
        match self.source.read() {
            Ok(raw) => self.remember(&raw, Instant::now()),
            Err(e) => debug!(error = %e, "baseline sample failed"),
        }

        loop {
            match stop_rx.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => self.tick(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn tick(&mut self) {
        let raw = match self.source.read() {
            Ok(raw) => raw,
            Err(e) => {
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, "sample skipped");
                return;
            }
        };

        let record = self.derive(&raw, Instant::now());
        match self.writer.append(&record) {
            Ok(()) => {
                self.stats.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, "telemetry append failed");
            }
        }
    }

    fn derive(&mut self, raw: &RawSample, now: Instant) -> TelemetryRecord {
        let (send_bytes_per_sec, recv_bytes_per_sec) = match self.last {
            Some(prev) => {
                let elapsed = now
                    .saturating_duration_since(prev.at)
                    .as_secs_f64()
                    .max(MIN_ELAPSED_SECS);
                (
                    raw.bytes_sent.saturating_sub(prev.sent) as f64 / elapsed,
                    raw.bytes_recv.saturating_sub(prev.recv) as f64 / elapsed,
                )
            }
            None => (0.0, 0.0),
        };
        self.remember(raw, now);

        let recent_errors = (self.error_probe)();
        TelemetryRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp: Utc::now(),
            bytes_sent: raw.bytes_sent,
            bytes_recv: raw.bytes_recv,
            send_bytes_per_sec,
            recv_bytes_per_sec,
            rss_bytes: raw.rss_bytes,
            vms_bytes: raw.vms_bytes,
            cpu_percent: clamp_percent(raw.cpu_percent),
            crash_risk_percent: crash_risk_percent(
                raw.rss_bytes,
                raw.available_memory_bytes,
                recent_errors,
            ),
        }
    }

    fn remember(&mut self, raw: &RawSample, at: Instant) {
        self.last = Some(Counters {
            at,
            sent: raw.bytes_sent,
            recv: raw.bytes_recv,
        });
    }
}
