//! Pose records and the per-session position log.
//!
//! - `Pose`: translation (mm) plus optional orientation / velocity for the single tracked entity.
//! - `FrameRecord`: one captured, non-occluded frame as it appears in the persisted log.
//! - `PositionLog`: append-only, single-writer sequence of records for one session.
//!
//! Records are immutable once appended. Occluded frames never reach the log.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A pose for the tracked entity at one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    /// Global translation in millimeters.
    pub translation: [f64; 3],
    /// Euler XYZ rotation, present only when orientation tracking is enabled (labeled mode).
    pub rotation: Option<[f64; 3]>,
    /// Velocity hint attached by synthetic sources.
    pub velocity: Option<[f64; 3]>,
}

impl Pose {
    pub fn at(translation: [f64; 3]) -> Self {
        Self {
            translation,
            rotation: None,
            velocity: None,
        }
    }

    pub fn with_rotation(mut self, rotation: [f64; 3]) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn with_velocity(mut self, velocity: [f64; 3]) -> Self {
        self.velocity = Some(velocity);
        self
    }
}

/// One entry of the persisted `"frames"` array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_id: u64,
    pub tvec: [f64; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rvec: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vel: Option<[f64; 3]>,
    /// Capture wall-clock time, milliseconds since the Unix epoch.
    pub time: f64,
}

impl FrameRecord {
    pub fn from_pose(frame_id: u64, pose: &Pose, time_ms: f64) -> Self {
        Self {
            frame_id,
            tvec: pose.translation,
            rvec: pose.rotation,
            vel: pose.velocity,
            time: time_ms,
        }
    }
}

/// Append-only frame log owned by exactly one acquisition worker.
#[derive(Debug, Default)]
pub struct PositionLog {
    frames: Vec<FrameRecord>,
}

impl PositionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Returns false (and drops the record) if its `frame_id`
    /// does not advance past the last recorded one.
    pub fn append(&mut self, record: FrameRecord) -> bool {
        if let Some(last) = self.frames.last() {
            if record.frame_id <= last.frame_id {
                return false;
            }
        }
        self.frames.push(record);
        true
    }

    pub fn last_frame_id(&self) -> Option<u64> {
        self.frames.last().map(|f| f.frame_id)
    }

    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}
