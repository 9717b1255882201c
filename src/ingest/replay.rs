//! Replay of a persisted frame log through the DataStream client surface.
//!
//! `ReplayClient` lets a `DatastreamSession` run end to end without a Vicon
//! server: `connect` loads a `vicon_*.json` log, and `get_frame` releases the
//! recorded frames on the schedule implied by their `time` fields. The recorded
//! translation is reported as a single unlabeled marker, or as a single subject
//! with one root segment in labeled mode.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::datastream::{AxisMapping, DatastreamClient, StreamMode};
use crate::frame::FrameRecord;
use crate::storage::read_frame_log;

const REPLAY_SUBJECT: &str = "replay";
const REPLAY_SEGMENT: &str = "root";

pub struct ReplayClient {
    path: PathBuf,
    /// Playback speed multiplier; 1.0 is the recorded rate.
    speed: f64,
    frames: Vec<FrameRecord>,
    cursor: Option<usize>,
    started: Option<Instant>,
    connected: bool,
}

impl ReplayClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            speed: 1.0,
            frames: Vec::new(),
            cursor: None,
            started: None,
            connected: false,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        if speed > 0.0 {
            self.speed = speed;
        }
        self
    }

    fn current(&self) -> Result<&FrameRecord> {
        self.cursor
            .and_then(|i| self.frames.get(i))
            .ok_or_else(|| anyhow!("no frame pulled yet"))
    }

    /// Offset of frame `index` from the first recorded frame, scaled by speed.
    fn due_offset(&self, index: usize) -> Duration {
        let first = self.frames.first().map(|f| f.time).unwrap_or(0.0);
        let elapsed_ms = (self.frames[index].time - first).max(0.0) / self.speed;
        Duration::from_secs_f64(elapsed_ms / 1000.0)
    }
}

impl DatastreamClient for ReplayClient {
    fn connect(&mut self, _address: &str) -> Result<()> {
        let log = read_frame_log(&self.path)?;
        log::info!(
            "replaying {} frames from {}",
            log.frames.len(),
            self.path.display()
        );
        self.frames = log.frames;
        self.cursor = None;
        self.started = None;
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn enable_marker_data(&mut self) -> Result<()> {
        Ok(())
    }

    fn enable_segment_data(&mut self) -> Result<()> {
        Ok(())
    }

    fn enable_unlabeled_marker_data(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_stream_mode(&mut self, mode: StreamMode) -> Result<()> {
        match mode {
            StreamMode::ClientPull => Ok(()),
            other => Err(anyhow!("replay only supports ClientPull, got {:?}", other)),
        }
    }

    fn set_axis_mapping(&mut self, _mapping: AxisMapping) -> Result<()> {
        Ok(())
    }

    fn get_frame(&mut self) -> Result<bool> {
        if !self.connected {
            return Err(anyhow!("replay client not connected"));
        }
        let next = self.cursor.map_or(0, |i| i + 1);
        if next >= self.frames.len() {
            return Ok(false);
        }
        let started = *self.started.get_or_insert_with(Instant::now);
        if started.elapsed() < self.due_offset(next) {
            return Ok(false);
        }
        self.cursor = Some(next);
        Ok(true)
    }

    fn frame_number(&self) -> Result<u64> {
        Ok(self.current()?.frame_id)
    }

    fn subject_count(&self) -> Result<usize> {
        Ok(self.current().map_or(0, |_| 1))
    }

    fn subject_name(&self, index: usize) -> Result<Option<String>> {
        Ok((index == 0 && self.current().is_ok()).then(|| REPLAY_SUBJECT.to_string()))
    }

    fn subject_root_segment_name(&self, subject: &str) -> Result<Option<String>> {
        Ok((subject == REPLAY_SUBJECT).then(|| REPLAY_SEGMENT.to_string()))
    }

    fn segment_global_translation(&self, subject: &str, segment: &str) -> Result<Option<[f64; 3]>> {
        if subject != REPLAY_SUBJECT || segment != REPLAY_SEGMENT {
            return Ok(None);
        }
        Ok(Some(self.current()?.tvec))
    }

    fn segment_global_rotation_euler_xyz(
        &self,
        subject: &str,
        segment: &str,
    ) -> Result<Option<[f64; 3]>> {
        if subject != REPLAY_SUBJECT || segment != REPLAY_SEGMENT {
            return Ok(None);
        }
        Ok(self.current()?.rvec)
    }

    fn unlabeled_marker_count(&self) -> Result<usize> {
        self.subject_count()
    }

    fn unlabeled_marker_global_translation(&self, index: usize) -> Result<Option<[f64; 3]>> {
        if index != 0 {
            return Ok(None);
        }
        Ok(Some(self.current()?.tvec))
    }

    fn latency_total(&self) -> Result<f64> {
        Ok(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Pose;
    use crate::ingest::{
        DatastreamConfig, DatastreamSession, Extraction, Polled, PoseSource, TrackedEntityMode,
    };
    use crate::storage::{FrameLogStore, JsonFileStore};

    #[test]
    fn replays_recorded_frames_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![
            FrameRecord::from_pose(10, &Pose::at([1.0, 0.0, 0.0]), 0.0),
            FrameRecord::from_pose(11, &Pose::at([2.0, 0.0, 0.0]), 0.0),
            FrameRecord::from_pose(13, &Pose::at([3.0, 0.0, 0.0]), 0.0),
        ];
        let path = JsonFileStore::new(dir.path())
            .persist(&frames)
            .unwrap()
            .unwrap();

        let mut session =
            DatastreamSession::new(DatastreamConfig::default(), ReplayClient::new(path));
        session.connect().unwrap();
        session.configure(TrackedEntityMode::Unlabeled).unwrap();

        let mut seen = Vec::new();
        while let Polled::Frame(id) = session.poll_frame().unwrap() {
            let Extraction::Pose(pose) = session.extract_pose().unwrap() else {
                panic!("replayed frames are never occluded");
            };
            seen.push((id, pose.translation[0]));
        }
        assert_eq!(seen, vec![(10, 1.0), (11, 2.0), (13, 3.0)]);
        session.disconnect().unwrap();
    }

    #[test]
    fn missing_log_fails_to_connect() {
        let mut session = DatastreamSession::new(
            DatastreamConfig::default(),
            ReplayClient::new("/nonexistent/vicon_log.json"),
        );
        assert!(session.connect().is_err());
    }
}
