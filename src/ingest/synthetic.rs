//! Synthetic pose source.
//!
//! Produces deterministic frames without any I/O so the acquisition loop and
//! persistence can run without a tracking rig. Every frame reports a fixed
//! position with a constant velocity hint; frames are never occluded.

use std::time::{Duration, Instant};

use super::{Extraction, Polled, PoseSource, TrackedEntityMode};
use crate::error::StreamError;
use crate::frame::Pose;

pub const SYNTHETIC_POSITION: [f64; 3] = [0.0, 0.0, 10.0];
pub const SYNTHETIC_VELOCITY: [f64; 3] = [1.0, 1.0, 1.0];

/// Configuration for the synthetic source.
#[derive(Clone, Debug, Default)]
pub struct SyntheticConfig {
    /// Pace frames at this rate. Unpaced sources have a frame ready on every poll.
    pub rate_hz: Option<f64>,
    /// Stop producing frames after this many.
    pub max_frames: Option<u64>,
}

/// Synthetic pose source.
pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    next_due: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            next_due: None,
        }
    }

    pub fn frames_produced(&self) -> u64 {
        self.frame_count
    }

    fn exhausted(&self) -> bool {
        self.config
            .max_frames
            .is_some_and(|max| self.frame_count >= max)
    }

    /// `None` (unpaced) when no rate is set or the rate has no representable period.
    fn period(&self) -> Option<Duration> {
        self.config
            .rate_hz
            .filter(|hz| *hz > 0.0)
            .and_then(|hz| Duration::try_from_secs_f64(1.0 / hz).ok())
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

impl Iterator for SyntheticSource {
    type Item = (u64, Pose);

    /// Lazy, unpaced view of the same frame sequence.
    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted() {
            return None;
        }
        self.frame_count += 1;
        Some((self.frame_count, synthetic_pose()))
    }
}

fn synthetic_pose() -> Pose {
    Pose::at(SYNTHETIC_POSITION).with_velocity(SYNTHETIC_VELOCITY)
}

impl PoseSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn connect(&mut self) -> Result<(), StreamError> {
        log::info!("generating synthetic Vicon data");
        Ok(())
    }

    fn configure(&mut self, mode: TrackedEntityMode) -> Result<(), StreamError> {
        log::debug!("synthetic source ignores tracked entity mode {}", mode);
        Ok(())
    }

    fn poll_frame(&mut self) -> Result<Polled, StreamError> {
        if self.exhausted() {
            return Ok(Polled::NoFrame);
        }
        if let Some(period) = self.period() {
            let now = Instant::now();
            match self.next_due {
                Some(due) if now < due => return Ok(Polled::NoFrame),
                Some(due) => self.next_due = Some(due + period),
                None => self.next_due = Some(now + period),
            }
        }
        match self.next() {
            Some((frame_id, _)) => Ok(Polled::Frame(frame_id)),
            None => Ok(Polled::NoFrame),
        }
    }

    fn extract_pose(&mut self) -> Result<Extraction, StreamError> {
        Ok(Extraction::Pose(synthetic_pose()))
    }

    fn disconnect(&mut self) -> Result<(), StreamError> {
        Ok(())
    }
}
