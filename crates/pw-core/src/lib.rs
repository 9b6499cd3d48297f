//! Pipewatch core: progress emission, ETA estimation, and run sessions.
//!
//! A pipeline driver starts a [`RunSession`], reports stage transitions
//! through its [`ProgressEmitter`], and finishes the session when done.
//! Meanwhile the session's sampler appends resource telemetry on its own
//! thread. Both streams land in the run directory as JSONL.

pub mod emitter;
pub mod estimator;
pub mod history;
pub mod logging;
pub mod session;

pub use emitter::{ProgressEmitter, StageState};
pub use estimator::{Estimate, EtaEstimator};
pub use logging::{init_logging, LogFormat};
pub use session::{RunLayout, RunSession};

pub use pw_common::{ProgressRecord, RunId, RunSummary, TelemetryRecord};
pub use pw_config::{CategorySpec, CategoryTable, InstrumentConfig};
pub use pw_telemetry::{ErrorCountProbe, Sampler, SourceFactory};
