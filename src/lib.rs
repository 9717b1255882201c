//! Vicon pose streaming.
//!
//! This crate streams 6-DOF pose data from a Vicon DataStream server to a
//! consumer callback (e.g. a flight controller feedback loop) at the tracker's
//! native frame rate, and measures the end-to-end latency of that delivery.
//!
//! # Architecture
//!
//! One session owns one source, one frame log and one worker thread:
//!
//! 1. **Single tracked entity**: frames with zero entities are occluded, frames with
//!    several are skipped. Neither is ever recorded.
//! 2. **Inline consumer**: the callback runs synchronously on the polling thread.
//! 3. **Guaranteed flush**: every exit path disconnects and then writes the frame
//!    log exactly once, even if the session failed to connect.
//!
//! # Module Structure
//!
//! - `ingest`: Pose sources (Vicon DataStream, log replay, synthetic)
//! - `session`: Acquisition loop and lifecycle (`PoseStream`)
//! - `latency`: Latency accounting and the analyzer's line contract
//! - `storage`: Frame log persistence
//! - `frame`, `velocity`, `config`, `error`: supporting types

pub mod config;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod latency;
pub mod session;
pub mod storage;
pub mod velocity;

pub use config::StreamConfig;
pub use error::StreamError;
pub use frame::{now_ms, FrameRecord, Pose, PositionLog};
pub use ingest::{
    DatastreamClient, DatastreamConfig, DatastreamSession, Extraction, Polled, PoseSource,
    ReplayClient, SyntheticConfig, SyntheticSource, TrackedEntityMode,
};
pub use latency::{parse_latency_lines, summarize, LatencySample, LatencySummary};
pub use session::{
    PoseCallback, PoseStream, SessionExit, SessionReport, SessionSettings, SessionState,
    ShutdownSignal,
};
pub use storage::{FrameLogFile, FrameLogStore, InMemoryFrameLogStore, JsonFileStore};
pub use velocity::VelocityEstimator;
