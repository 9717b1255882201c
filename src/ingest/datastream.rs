//! Vicon DataStream pose session.
//!
//! This module provides `DatastreamSession`, the device-backed `PoseSource`.
//! The DataStream SDK itself is consumed through the `DatastreamClient` trait;
//! the session only decides what to enable and how to read the single tracked entity.
//!
//! The session is responsible for:
//! - Connecting to the configured server address
//! - Enabling marker/segment or unlabeled-marker data for the tracked entity mode
//! - Pulling frames in ClientPull mode with a fixed axis mapping
//! - Extracting translation (and rotation, for labeled subjects)
//!
//! The session MUST NOT:
//! - Pick among several visible entities
//! - Block when no frame is ready

use anyhow::Result;

use super::{Extraction, Polled, PoseSource, TrackedEntityMode};
use crate::error::StreamError;
use crate::frame::Pose;

/// Default Vicon server (host:port).
pub const DEFAULT_VICON_ADDRESS: &str = "192.168.1.39:801";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamMode {
    ClientPull,
    ServerPush,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

/// Axis mapping applied to all global coordinates (x, y, z).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisMapping {
    pub x: Direction,
    pub y: Direction,
    pub z: Direction,
}

impl Default for AxisMapping {
    fn default() -> Self {
        Self {
            x: Direction::Forward,
            y: Direction::Left,
            z: Direction::Up,
        }
    }
}

/// Configuration for a DataStream session.
#[derive(Clone, Debug)]
pub struct DatastreamConfig {
    /// Server address, e.g. "192.168.1.39:801".
    pub address: String,
    pub axis_mapping: AxisMapping,
}

impl Default for DatastreamConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_VICON_ADDRESS.to_string(),
            axis_mapping: AxisMapping::default(),
        }
    }
}

/// Client surface of the Vicon DataStream SDK.
///
/// Getters return `None` where the SDK reports an occluded or missing item.
pub trait DatastreamClient: Send {
    fn connect(&mut self, address: &str) -> Result<()>;
    fn is_connected(&self) -> bool;
    fn disconnect(&mut self) -> Result<()>;

    fn enable_marker_data(&mut self) -> Result<()>;
    fn enable_segment_data(&mut self) -> Result<()>;
    fn enable_unlabeled_marker_data(&mut self) -> Result<()>;
    fn set_stream_mode(&mut self, mode: StreamMode) -> Result<()>;
    fn set_axis_mapping(&mut self, mapping: AxisMapping) -> Result<()>;

    /// Pull the next frame. `false` when none is available yet.
    fn get_frame(&mut self) -> Result<bool>;
    fn frame_number(&self) -> Result<u64>;

    fn subject_count(&self) -> Result<usize>;
    fn subject_name(&self, index: usize) -> Result<Option<String>>;
    fn subject_root_segment_name(&self, subject: &str) -> Result<Option<String>>;
    fn segment_global_translation(&self, subject: &str, segment: &str)
        -> Result<Option<[f64; 3]>>;
    fn segment_global_rotation_euler_xyz(
        &self,
        subject: &str,
        segment: &str,
    ) -> Result<Option<[f64; 3]>>;

    fn unlabeled_marker_count(&self) -> Result<usize>;
    fn unlabeled_marker_global_translation(&self, index: usize) -> Result<Option<[f64; 3]>>;

    /// Total server-side latency in seconds.
    fn latency_total(&self) -> Result<f64>;
}

/// Device-backed pose source.
pub struct DatastreamSession<C> {
    config: DatastreamConfig,
    client: C,
    mode: TrackedEntityMode,
}

impl<C: DatastreamClient> DatastreamSession<C> {
    pub fn new(config: DatastreamConfig, client: C) -> Self {
        Self {
            config,
            client,
            mode: TrackedEntityMode::default(),
        }
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn extract_labeled(&self) -> Result<Extraction> {
        let count = self.client.subject_count()?;
        if count != 1 {
            return Ok(by_count(count));
        }
        let Some(subject) = self.client.subject_name(0)? else {
            return Ok(Extraction::Occluded);
        };
        log::debug!("subject: {}", subject);
        let Some(segment) = self.client.subject_root_segment_name(&subject)? else {
            return Ok(Extraction::Occluded);
        };
        let Some(translation) = self.client.segment_global_translation(&subject, &segment)? else {
            return Ok(Extraction::Occluded);
        };
        let mut pose = Pose::at(translation);
        pose.rotation = self
            .client
            .segment_global_rotation_euler_xyz(&subject, &segment)?;
        Ok(Extraction::Pose(pose))
    }

    fn extract_unlabeled(&self) -> Result<Extraction> {
        let count = self.client.unlabeled_marker_count()?;
        log::debug!("unlabeled marker count: {}", count);
        if count != 1 {
            return Ok(by_count(count));
        }
        Ok(match self.client.unlabeled_marker_global_translation(0)? {
            Some(translation) => Extraction::Pose(Pose::at(translation)),
            None => Extraction::Occluded,
        })
    }
}

fn by_count(count: usize) -> Extraction {
    if count == 0 {
        Extraction::Occluded
    } else {
        Extraction::Ambiguous(count)
    }
}

impl<C: DatastreamClient> PoseSource for DatastreamSession<C> {
    fn name(&self) -> &str {
        "vicon-datastream"
    }

    fn connect(&mut self) -> Result<(), StreamError> {
        log::info!(
            "attempting to connect to Vicon server at {}...",
            self.config.address
        );
        self.client
            .connect(&self.config.address)
            .map_err(|e| StreamError::connection(&self.config.address, e))?;
        log::info!("connected to Vicon server at {}", self.config.address);
        Ok(())
    }

    fn configure(&mut self, mode: TrackedEntityMode) -> Result<(), StreamError> {
        let config_err = |e: anyhow::Error| StreamError::Configuration {
            mode: mode.to_string(),
            reason: e.to_string(),
        };
        match mode {
            TrackedEntityMode::Labeled => {
                self.client.enable_marker_data().map_err(config_err)?;
                self.client.enable_segment_data().map_err(config_err)?;
                log::info!("marker and segment data enabled");
                if let Ok(Some(subject)) = self.client.subject_name(0) {
                    log::info!("subject: {}", subject);
                }
            }
            TrackedEntityMode::Unlabeled => {
                self.client
                    .enable_unlabeled_marker_data()
                    .map_err(config_err)?;
                log::info!("unlabeled marker data enabled");
            }
        }
        self.client
            .set_stream_mode(StreamMode::ClientPull)
            .map_err(config_err)?;
        self.client
            .set_axis_mapping(self.config.axis_mapping)
            .map_err(config_err)?;
        log::info!("stream mode set to ClientPull");
        self.mode = mode;
        Ok(())
    }

    fn poll_frame(&mut self) -> Result<Polled, StreamError> {
        if !self.client.get_frame().map_err(StreamError::unexpected)? {
            return Ok(Polled::NoFrame);
        }
        let frame_number = self
            .client
            .frame_number()
            .map_err(StreamError::unexpected)?;
        Ok(Polled::Frame(frame_number))
    }

    fn extract_pose(&mut self) -> Result<Extraction, StreamError> {
        let extraction = match self.mode {
            TrackedEntityMode::Labeled => self.extract_labeled(),
            TrackedEntityMode::Unlabeled => self.extract_unlabeled(),
        };
        extraction.map_err(StreamError::unexpected)
    }

    fn source_latency(&mut self) -> Result<f64, StreamError> {
        self.client.latency_total().map_err(StreamError::unexpected)
    }

    fn disconnect(&mut self) -> Result<(), StreamError> {
        if !self.client.is_connected() {
            return Ok(());
        }
        self.client.disconnect().map_err(StreamError::unexpected)?;
        log::info!("disconnected from Vicon server");
        Ok(())
    }
}
