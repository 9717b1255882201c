use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::StreamError;
use crate::frame::FrameRecord;

/// Default directory for persisted frame logs.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// On-disk layout of a persisted session: `{"frames": [...]}`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FrameLogFile {
    pub frames: Vec<FrameRecord>,
}

#[derive(Serialize)]
struct FrameLogRef<'a> {
    frames: &'a [FrameRecord],
}

/// Destination for a session's frame log. Written exactly once, at session end.
pub trait FrameLogStore: Send {
    /// Persist the full log. Returns where it was written, if anywhere addressable.
    fn persist(&mut self, frames: &[FrameRecord]) -> Result<Option<PathBuf>, StreamError>;
}

impl<S: FrameLogStore + ?Sized> FrameLogStore for Box<S> {
    fn persist(&mut self, frames: &[FrameRecord]) -> Result<Option<PathBuf>, StreamError> {
        (**self).persist(frames)
    }
}

/// JSON file store: `<dir>/vicon_<HH>_<MM>_<SS>_<MM>_<DD>_<YYYY>.json`.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_DIR)
    }
}

/// File name for a log flushed at local time `at`.
pub fn frame_log_file_name(at: &chrono::DateTime<chrono::Local>) -> String {
    format!("vicon_{}.json", at.format("%H_%M_%S_%m_%d_%Y"))
}

impl FrameLogStore for JsonFileStore {
    fn persist(&mut self, frames: &[FrameRecord]) -> Result<Option<PathBuf>, StreamError> {
        let path = self.dir.join(frame_log_file_name(&chrono::Local::now()));
        let io_err = |source: std::io::Error| StreamError::Persistence {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(io_err)?;
        let file = File::create(&path).map_err(io_err)?;
        write_frame_log(BufWriter::new(file), frames, &path)?;
        Ok(Some(path))
    }
}

/// Encode `{"frames": [...]}` into `writer`. Write failures surface as
/// `Persistence`; only encoding failures are `Serialization`.
fn write_frame_log<W: Write>(
    mut writer: W,
    frames: &[FrameRecord],
    path: &Path,
) -> Result<(), StreamError> {
    let io_err = |source: std::io::Error| StreamError::Persistence {
        path: path.to_path_buf(),
        source,
    };
    serde_json::to_writer(&mut writer, &FrameLogRef { frames }).map_err(|e| {
        if e.is_io() {
            io_err(e.into())
        } else {
            StreamError::Serialization(e)
        }
    })?;
    writer.flush().map_err(io_err)
}

/// In-memory store for tests. Clones share the same write history.
#[derive(Clone, Debug, Default)]
pub struct InMemoryFrameLogStore {
    writes: Arc<Mutex<Vec<Vec<FrameRecord>>>>,
}

impl InMemoryFrameLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every log persisted so far, oldest first.
    pub fn writes(&self) -> Vec<Vec<FrameRecord>> {
        self.writes
            .lock()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }
}

impl FrameLogStore for InMemoryFrameLogStore {
    fn persist(&mut self, frames: &[FrameRecord]) -> Result<Option<PathBuf>, StreamError> {
        let mut writes = self
            .writes
            .lock()
            .map_err(|_| StreamError::unexpected("frame log store lock poisoned"))?;
        writes.push(frames.to_vec());
        Ok(None)
    }
}

/// Read a persisted frame log.
pub fn read_frame_log(path: &Path) -> Result<FrameLogFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read frame log {}: {}", path.display(), e))?;
    let log = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid frame log {}: {}", path.display(), e))?;
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Pose;
    use chrono::TimeZone;

    #[test]
    fn file_name_embeds_time_then_date() {
        let at = chrono::Local
            .with_ymd_and_hms(2025, 7, 15, 16, 57, 16)
            .single()
            .expect("unambiguous local time");
        assert_eq!(frame_log_file_name(&at), "vicon_16_57_16_07_15_2025.json");
    }

    #[test]
    fn json_store_writes_frames_object() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("logs"));
        let frames = vec![
            FrameRecord::from_pose(1, &Pose::at([1.0, 2.0, 3.0]), 10.0),
            FrameRecord::from_pose(2, &Pose::at([4.0, 5.0, 6.0]), 20.0),
        ];
        let path = store.persist(&frames).unwrap().expect("file path");
        assert!(path.starts_with(dir.path().join("logs")));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["frames"].as_array().unwrap().len(), 2);

        let log = read_frame_log(&path).unwrap();
        assert_eq!(log.frames, frames);
    }

    #[test]
    fn json_store_writes_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path());
        let path = store.persist(&[]).unwrap().unwrap();
        let log = read_frame_log(&path).unwrap();
        assert!(log.frames.is_empty());
    }

    #[test]
    fn unwritable_destination_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();
        let mut store = JsonFileStore::new(&blocker);
        let err = store.persist(&[]).unwrap_err();
        assert!(matches!(err, StreamError::Persistence { .. }));
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no space left on device",
            ))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_is_persistence_error() {
        let frames = vec![FrameRecord::from_pose(1, &Pose::at([1.0, 2.0, 3.0]), 10.0)];
        let path = Path::new("logs/vicon_full.json");
        let err = write_frame_log(FullDisk, &frames, path).unwrap_err();
        match err {
            StreamError::Persistence { path: failed, source } => {
                assert_eq!(failed, path);
                assert!(source.to_string().contains("no space left"));
            }
            other => panic!("expected persistence error, got {:?}", other),
        }
    }
}
