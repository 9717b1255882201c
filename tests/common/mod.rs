//! Scripted pose source shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use vicon_stream::{Extraction, Polled, Pose, PoseSource, StreamError, TrackedEntityMode};

#[derive(Clone, Debug)]
pub enum Step {
    NoFrame,
    Pose([f64; 3]),
    Occluded,
    Ambiguous(usize),
    Fail(&'static str),
}

#[derive(Debug, Default)]
pub struct Counters {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub latency_queries: AtomicUsize,
    pub drained: AtomicBool,
}

impl Counters {
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn latency_queries(&self) -> usize {
        self.latency_queries.load(Ordering::SeqCst)
    }

    pub fn drained(&self) -> bool {
        self.drained.load(Ordering::SeqCst)
    }
}

/// Plays back a fixed list of poll outcomes. Every step except `NoFrame`
/// consumes one frame number, so occluded frames leave gaps.
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    current: Option<Step>,
    frame_number: u64,
    pub refuse_connect: bool,
    pub connect_delay: Duration,
    pub latency_s: f64,
    pub counters: Arc<Counters>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            current: None,
            frame_number: 0,
            refuse_connect: false,
            connect_delay: Duration::ZERO,
            latency_s: 0.0,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn counters(&self) -> Arc<Counters> {
        self.counters.clone()
    }
}

impl PoseSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn connect(&mut self) -> Result<(), StreamError> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.connect_delay);
        if self.refuse_connect {
            return Err(StreamError::connection("scripted:801", "connection refused"));
        }
        Ok(())
    }

    fn configure(&mut self, _mode: TrackedEntityMode) -> Result<(), StreamError> {
        Ok(())
    }

    fn poll_frame(&mut self) -> Result<Polled, StreamError> {
        let Some(step) = self.steps.pop_front() else {
            self.counters.drained.store(true, Ordering::SeqCst);
            return Ok(Polled::NoFrame);
        };
        match step {
            Step::NoFrame => Ok(Polled::NoFrame),
            Step::Fail(reason) => Err(StreamError::unexpected(reason)),
            other => {
                self.frame_number += 1;
                self.current = Some(other);
                Ok(Polled::Frame(self.frame_number))
            }
        }
    }

    fn extract_pose(&mut self) -> Result<Extraction, StreamError> {
        match self.current.take() {
            Some(Step::Pose(translation)) => Ok(Extraction::Pose(Pose::at(translation))),
            Some(Step::Ambiguous(count)) => Ok(Extraction::Ambiguous(count)),
            _ => Ok(Extraction::Occluded),
        }
    }

    fn source_latency(&mut self) -> Result<f64, StreamError> {
        self.counters.latency_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.latency_s)
    }

    fn disconnect(&mut self) -> Result<(), StreamError> {
        self.counters.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

pub fn fast_settings() -> vicon_stream::SessionSettings {
    vicon_stream::SessionSettings {
        poll_interval: Duration::from_millis(2),
        ..Default::default()
    }
}

pub fn log_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}
