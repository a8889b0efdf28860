//! driftkit library: clock offset estimation against an HTTP time source and
//! batched latency probing of cloud endpoints.

pub mod adapters;
pub mod catalog;
pub mod config;
pub mod domain;
mod error;
pub mod fmt;
pub mod services;
pub mod stats;
#[cfg(feature = "tui")]
pub mod tui;

pub use adapters::probe_client::{HttpProber, Measure, ProbeStrategy};
pub use adapters::time_source::{HttpTimeSource, TimeSource};
pub use domain::clock::{ClockEstimate, ClockSample, OffsetSeverity, SeverityLevel};
pub use domain::latency::{Continent, ProbeResult, ProbeStatus, ProbeTarget, Provider, Selector};
pub use error::DriftError;
pub use services::clock::{ClockTracker, estimate_offset};
pub use services::latency::{ProbeBoard, RunSummary, run_batched, spawn_run};
