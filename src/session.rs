//! Acquisition loop and session lifecycle.
//!
//! A `PoseStream` owns one `PoseSource`, one `PositionLog` and one dedicated
//! worker thread. The controlling thread and the worker share only the running
//! flag; `stop()` clears it and joins the worker.
//!
//! Worker states: `Idle -> Connecting -> Streaming -> Stopping -> Terminated`,
//! with `Error` reachable from `Connecting` or `Streaming`. Every path out of
//! `Connecting`/`Streaming` goes through `Stopping`, which attempts a disconnect
//! and then persists whatever the log holds.
//!
//! The consumer callback runs inline on the worker thread. Its execution time
//! extends the polling period one for one.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::StreamError;
use crate::frame::{now_ms, FrameRecord, Pose, PositionLog};
use crate::ingest::{Extraction, Polled, PoseSource, TrackedEntityMode};
use crate::latency::LatencySample;
use crate::storage::FrameLogStore;

/// Default backoff when no frame is ready.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Consumer callback: `(pose, capture time in ms since epoch) -> reported latency in ms`.
///
/// A return value `<= 0` means no latency was reported for that frame.
pub type PoseCallback = Box<dyn FnMut(&Pose, f64) -> f64 + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    Error,
    Stopping,
    Terminated,
}

/// Immutable per-session settings.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub tracked_entity_mode: TrackedEntityMode,
    pub poll_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tracked_entity_mode: TrackedEntityMode::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionExit {
    /// Stopped on request (or never started).
    Stopped,
    /// Connect/configure failed or the loop hit an unexpected failure.
    Failed(String),
}

/// What a finished session did.
#[derive(Clone, Debug)]
pub struct SessionReport {
    pub exit: SessionExit,
    pub frames_recorded: usize,
    /// Set when the log was persisted to an addressable location.
    pub log_path: Option<PathBuf>,
    pub persisted: bool,
    /// Worker state transitions, in order.
    pub states: Vec<SessionState>,
}

/// Requests a running session to stop. Safe to trigger from any thread, e.g. a Ctrl-C handler.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    running: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn trigger(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

struct Worker {
    source: Box<dyn PoseSource>,
    store: Box<dyn FrameLogStore>,
    callback: Option<PoseCallback>,
    settings: SessionSettings,
}

/// Controller handle for one acquisition session.
pub struct PoseStream {
    pending: Option<Worker>,
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<SessionReport>>,
}

impl PoseStream {
    pub fn new<S, L>(source: S, settings: SessionSettings, store: L) -> Self
    where
        S: PoseSource + 'static,
        L: FrameLogStore + 'static,
    {
        Self {
            pending: Some(Worker {
                source: Box::new(source),
                store: Box::new(store),
                callback: None,
                settings,
            }),
            running: Arc::new(AtomicBool::new(false)),
            join: None,
        }
    }

    /// Install the consumer callback. Has no effect once the session has started.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&Pose, f64) -> f64 + Send + 'static,
    {
        if let Some(worker) = self.pending.as_mut() {
            worker.callback = Some(Box::new(callback));
        }
        self
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            running: self.running.clone(),
        }
    }

    /// True while the worker thread has been started and not yet joined.
    pub fn is_active(&self) -> bool {
        self.join.is_some()
    }

    /// True once a started worker has exited (e.g. after a failed connect), before `stop()`.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_some_and(|join| join.is_finished())
    }

    /// Spawn the acquisition worker. Returns immediately.
    pub fn start(&mut self) -> Result<(), StreamError> {
        let worker = self
            .pending
            .take()
            .ok_or_else(|| StreamError::unexpected("session already started or stopped"))?;
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let join = std::thread::Builder::new()
            .name("vicon-acquisition".to_string())
            .spawn(move || worker.run(&running))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                StreamError::unexpected(format!("failed to spawn acquisition thread: {}", e))
            })?;
        self.join = Some(join);
        Ok(())
    }

    /// Stop the session and wait until the worker has left `Stopping`.
    ///
    /// Returns the report on the call that finished the session and `None` on
    /// every later call. A session that was never started still persists its
    /// (empty) log.
    pub fn stop(&mut self) -> Option<SessionReport> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            return Some(match join.join() {
                Ok(report) => report,
                Err(_) => {
                    log::error!("acquisition thread panicked outside the session guard");
                    SessionReport {
                        exit: SessionExit::Failed("acquisition thread panicked".to_string()),
                        frames_recorded: 0,
                        log_path: None,
                        persisted: false,
                        states: vec![SessionState::Error, SessionState::Terminated],
                    }
                }
            });
        }
        let worker = self.pending.take()?;
        log::info!("session stopped before start");
        let mut session = ActiveSession::new(worker);
        Some(session.close(SessionExit::Stopped))
    }
}

impl Drop for PoseStream {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.stop();
        }
    }
}

impl Worker {
    fn run(self, running: &AtomicBool) -> SessionReport {
        let mut session = ActiveSession::new(self);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| session.stream(running)));
        let exit = match outcome {
            Ok(Ok(())) => SessionExit::Stopped,
            Ok(Err(err)) => {
                log::error!("{}", err);
                session.enter(SessionState::Error);
                SessionExit::Failed(err.to_string())
            }
            Err(payload) => {
                let err = StreamError::unexpected(panic_message(payload.as_ref()));
                log::error!("{}", err);
                session.enter(SessionState::Error);
                SessionExit::Failed(err.to_string())
            }
        };
        session.close(exit)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panic in acquisition loop: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panic in acquisition loop: {}", msg)
    } else {
        "panic in acquisition loop".to_string()
    }
}

/// Scoped session: once created, teardown runs exactly once, either through
/// `close` or, if the worker unwinds past it, on drop.
struct ActiveSession {
    worker: Worker,
    log: PositionLog,
    states: Vec<SessionState>,
    closed: bool,
}

impl ActiveSession {
    fn new(worker: Worker) -> Self {
        Self {
            worker,
            log: PositionLog::new(),
            states: vec![SessionState::Idle],
            closed: false,
        }
    }

    fn enter(&mut self, state: SessionState) {
        log::debug!("session state: {:?}", state);
        self.states.push(state);
    }

    fn stream(&mut self, running: &AtomicBool) -> Result<(), StreamError> {
        self.enter(SessionState::Connecting);
        self.worker.source.connect()?;
        self.worker
            .source
            .configure(self.worker.settings.tracked_entity_mode)?;
        self.enter(SessionState::Streaming);
        log::info!("streaming from {}", self.worker.source.name());

        while running.load(Ordering::SeqCst) {
            match self.worker.source.poll_frame()? {
                Polled::NoFrame => std::thread::sleep(self.worker.settings.poll_interval),
                Polled::Frame(frame_id) => self.handle_frame(frame_id)?,
            }
        }
        Ok(())
    }

    fn handle_frame(&mut self, frame_id: u64) -> Result<(), StreamError> {
        let pose = match self.worker.source.extract_pose()? {
            Extraction::Pose(pose) => pose,
            Extraction::Occluded => {
                log::warn!("position (mm): occluded or no data (frame {})", frame_id);
                return Ok(());
            }
            Extraction::Ambiguous(count) => {
                log::warn!(
                    "{} tracked entities visible in frame {}; skipping frame",
                    count,
                    frame_id
                );
                return Ok(());
            }
        };

        let now = now_ms();
        if !self.log.append(FrameRecord::from_pose(frame_id, &pose, now)) {
            log::debug!("stale frame {} skipped", frame_id);
            return Ok(());
        }

        let reported_ms = match self.worker.callback.as_mut() {
            Some(callback) => callback(&pose, now),
            None => 0.0,
        };
        if reported_ms > 0.0 {
            let source_latency_s = self.worker.source.source_latency()?;
            if let Some(sample) = LatencySample::account(reported_ms, source_latency_s) {
                log::info!("{}", sample.log_line());
            }
        }

        let [x, y, z] = pose.translation;
        log::debug!("position (mm): X={:.2}, Y={:.2}, Z={:.2}", x, y, z);
        Ok(())
    }

    fn teardown(&mut self) -> (Option<PathBuf>, bool) {
        self.closed = true;
        self.enter(SessionState::Stopping);
        if let Err(err) = self.worker.source.disconnect() {
            log::warn!("disconnect from {} failed: {}", self.worker.source.name(), err);
        }
        let result = match self.worker.store.persist(self.log.frames()) {
            Ok(Some(path)) => {
                log::info!("Vicon log saved in {}", path.display());
                (Some(path), true)
            }
            Ok(None) => {
                log::info!("Vicon log saved ({} frames)", self.log.len());
                (None, true)
            }
            Err(err) => {
                log::error!("{}", err);
                (None, false)
            }
        };
        self.enter(SessionState::Terminated);
        result
    }

    fn close(&mut self, exit: SessionExit) -> SessionReport {
        let (log_path, persisted) = self.teardown();
        SessionReport {
            exit,
            frames_recorded: self.log.len(),
            log_path,
            persisted,
            states: std::mem::take(&mut self.states),
        }
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        if !self.closed {
            log::error!("acquisition worker unwound; running cleanup");
            self.teardown();
        }
    }
}
