use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::datastream::DEFAULT_VICON_ADDRESS;
use crate::ingest::TrackedEntityMode;
use crate::session::{SessionSettings, DEFAULT_POLL_INTERVAL};
use crate::storage::DEFAULT_LOG_DIR;

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    vicon: Option<ViconConfigFile>,
    logging: Option<LoggingConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ViconConfigFile {
    address: Option<String>,
    tracked_entity_mode: Option<TrackedEntityMode>,
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct LoggingConfigFile {
    log_dir: Option<PathBuf>,
    level: Option<String>,
    file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Vicon server address (host:port).
    pub address: String,
    pub tracked_entity_mode: TrackedEntityMode,
    pub poll_interval: Duration,
    /// Directory that receives `vicon_*.json` frame logs.
    pub log_dir: PathBuf,
    /// Default diagnostic log filter (env_logger syntax).
    pub log_level: String,
    /// Redirect diagnostic output to this file instead of stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::from_file(StreamConfigFile::default())
    }
}

impl StreamConfig {
    /// Defaults, then the file named by `VICON_CONFIG`, then `VICON_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("VICON_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            tracked_entity_mode: self.tracked_entity_mode,
            poll_interval: self.poll_interval,
        }
    }

    fn from_file(file: StreamConfigFile) -> Self {
        let vicon = file.vicon.unwrap_or_default();
        let logging = file.logging.unwrap_or_default();
        Self {
            address: vicon
                .address
                .unwrap_or_else(|| DEFAULT_VICON_ADDRESS.to_string()),
            tracked_entity_mode: vicon.tracked_entity_mode.unwrap_or_default(),
            poll_interval: vicon
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            log_dir: logging
                .log_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            log_level: logging
                .level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_file: logging.file,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("VICON_ADDRESS") {
            if !addr.trim().is_empty() {
                self.address = addr;
            }
        }
        if let Ok(mode) = std::env::var("VICON_TRACKED_MODE") {
            if !mode.trim().is_empty() {
                self.tracked_entity_mode = mode
                    .parse()
                    .map_err(|e: String| anyhow!("VICON_TRACKED_MODE: {}", e))?;
            }
        }
        if let Ok(dir) = std::env::var("VICON_LOG_DIR") {
            if !dir.trim().is_empty() {
                self.log_dir = PathBuf::from(dir);
            }
        }
        if let Ok(interval) = std::env::var("VICON_POLL_INTERVAL_MS") {
            let millis: u64 = interval.trim().parse().map_err(|_| {
                anyhow!("VICON_POLL_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.poll_interval = Duration::from_millis(millis);
        }
        if let Ok(level) = std::env::var("VICON_LOG_LEVEL") {
            if !level.trim().is_empty() {
                self.log_level = level;
            }
        }
        if let Ok(path) = std::env::var("VICON_LOG_FILE") {
            if !path.trim().is_empty() {
                self.log_file = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.address = self.address.trim().to_string();
        if self.address.is_empty() {
            return Err(anyhow!("vicon address must not be empty"));
        }
        if self.poll_interval.is_zero() {
            return Err(anyhow!("poll interval must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<StreamConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
