//! Pose ingestion sources.
//!
//! This module provides the sources an acquisition session can drive:
//! - Vicon DataStream sessions (device-backed, over a `DatastreamClient`)
//! - Recorded frame logs replayed through the DataStream client surface
//! - Synthetic generator (testing, no hardware)
//!
//! All sources implement `PoseSource`, so the acquisition loop never needs to
//! know which one it is driving.
//!
//! A source is responsible for:
//! - Establishing and tearing down its connection
//! - Reporting whether a new frame is ready without blocking
//! - Extracting the pose of the single tracked entity from that frame
//!
//! A source MUST NOT:
//! - Track more than one entity (frames with several entities are reported as ambiguous)
//! - Sleep or otherwise apply backpressure itself

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::frame::Pose;

pub mod datastream;
pub mod replay;
pub mod synthetic;

pub use datastream::{DatastreamClient, DatastreamConfig, DatastreamSession};
pub use replay::ReplayClient;
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// Which data stream identifies the tracked entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackedEntityMode {
    /// Subject with a root segment: marker + segment data, position and orientation.
    Labeled,
    /// A single unlabeled marker: position only.
    #[default]
    Unlabeled,
}

impl fmt::Display for TrackedEntityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackedEntityMode::Labeled => f.write_str("labeled"),
            TrackedEntityMode::Unlabeled => f.write_str("unlabeled"),
        }
    }
}

impl FromStr for TrackedEntityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "labeled" => Ok(TrackedEntityMode::Labeled),
            "unlabeled" => Ok(TrackedEntityMode::Unlabeled),
            other => Err(format!(
                "unknown tracked entity mode '{}'; expected labeled or unlabeled",
                other
            )),
        }
    }
}

/// Result of a non-blocking poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Polled {
    /// Nothing new; the caller backs off.
    NoFrame,
    /// A new frame with the source's frame number.
    Frame(u64),
}

/// Pose extraction for the most recently polled frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Extraction {
    Pose(Pose),
    /// Zero visible entities, or the entity has no translation this frame.
    Occluded,
    /// More than one entity visible. Never disambiguated; the frame is skipped.
    Ambiguous(usize),
}

/// Capability set the acquisition loop drives.
pub trait PoseSource: Send {
    /// Source identifier for logs.
    fn name(&self) -> &str;

    fn connect(&mut self) -> Result<(), StreamError>;

    /// Enable the data stream for `mode`.
    fn configure(&mut self, mode: TrackedEntityMode) -> Result<(), StreamError>;

    /// Non-blocking check for a new frame.
    fn poll_frame(&mut self) -> Result<Polled, StreamError>;

    fn extract_pose(&mut self) -> Result<Extraction, StreamError>;

    /// Source pipeline latency in seconds. Sources without one report zero.
    fn source_latency(&mut self) -> Result<f64, StreamError> {
        Ok(0.0)
    }

    /// Safe to call repeatedly and when never connected.
    fn disconnect(&mut self) -> Result<(), StreamError>;
}

impl<S: PoseSource + ?Sized> PoseSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn connect(&mut self) -> Result<(), StreamError> {
        (**self).connect()
    }

    fn configure(&mut self, mode: TrackedEntityMode) -> Result<(), StreamError> {
        (**self).configure(mode)
    }

    fn poll_frame(&mut self) -> Result<Polled, StreamError> {
        (**self).poll_frame()
    }

    fn extract_pose(&mut self) -> Result<Extraction, StreamError> {
        (**self).extract_pose()
    }

    fn source_latency(&mut self) -> Result<f64, StreamError> {
        (**self).source_latency()
    }

    fn disconnect(&mut self) -> Result<(), StreamError> {
        (**self).disconnect()
    }
}
