//! Pipewatch telemetry.
//!
//! This crate provides:
//! - An append-only JSONL writer shared by both record streams
//! - The `MetricsSource` seam and its `sysinfo` implementation
//! - The crash-risk heuristic
//! - The background resource `Sampler`

pub mod risk;
pub mod sampler;
pub mod source;
pub mod writer;

pub use risk::crash_risk_percent;
pub use sampler::{ErrorCountProbe, Sampler, SourceFactory};
pub use source::{MetricsSource, ProbeError, RawSample, SysinfoSource};
pub use writer::{JsonlWriter, WriteError};

/// File name of the resource sample stream inside a run directory.
pub const TELEMETRY_LOG: &str = "telemetry.log";

/// File name of the stage progress stream inside a run directory.
pub const PROGRESS_LOG: &str = "progress.log";
