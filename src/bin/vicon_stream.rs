//! vicon_stream - stream Vicon poses to a consumer and account delivery latency
//!
//! This daemon:
//! 1. Loads configuration (VICON_CONFIG file, VICON_* env, then flags)
//! 2. Drives a pose source: synthetic, a replayed frame log, or a DataStream client
//! 3. Hands every pose to the consumer inline and logs latency lines for the analyzer
//! 4. Stops on Ctrl-C or after --seconds, writing logs/vicon_<time>.json on the way out

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use vicon_stream::{
    now_ms, DatastreamConfig, DatastreamSession, JsonFileStore, PoseSource, PoseStream,
    ReplayClient, SessionExit, StreamConfig, SyntheticConfig, SyntheticSource, TrackedEntityMode,
    VelocityEstimator,
};

const WAIT_SLICE: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Stream Vicon poses to a consumer and log end-to-end latency"
)]
struct Args {
    /// Vicon server address (host:port).
    #[arg(long, env = "VICON_ADDRESS")]
    address: Option<String>,

    /// Tracked entity mode: labeled (subject + rotation) or unlabeled (single marker).
    #[arg(long, env = "VICON_TRACKED_MODE", value_name = "MODE")]
    mode: Option<TrackedEntityMode>,

    /// Generate synthetic frames instead of connecting to a server.
    #[arg(long, conflicts_with = "replay")]
    synthetic: bool,

    /// Synthetic frame rate.
    #[arg(long, env = "VICON_SYNTHETIC_RATE_HZ", default_value_t = 100.0)]
    synthetic_rate_hz: f64,

    /// Replay a recorded vicon_*.json log through the DataStream session.
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,

    /// Replay speed multiplier.
    #[arg(long, default_value_t = 1.0)]
    replay_speed: f64,

    /// Stop after this many seconds (default: run until Ctrl-C).
    #[arg(long)]
    seconds: Option<u64>,

    /// Backoff when no frame is ready, in milliseconds.
    #[arg(long, env = "VICON_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Directory for frame logs.
    #[arg(long, env = "VICON_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Diagnostic log level (env_logger filter syntax).
    #[arg(long, env = "VICON_LOG_LEVEL")]
    log_level: Option<String>,

    /// Write diagnostic output to this file (input for latency_analyse).
    #[arg(long, env = "VICON_LOG_FILE")]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut cfg = StreamConfig::load()?;
    apply_args(&mut cfg, &args)?;
    init_logging(&cfg)?;

    let source = build_source(&cfg, &args)?;
    log::info!(
        "vicon_stream {} using {} ({} mode), frame logs in {}",
        env!("CARGO_PKG_VERSION"),
        source.name(),
        cfg.tracked_entity_mode,
        cfg.log_dir.display()
    );

    let mut estimator = VelocityEstimator::default();
    let mut stream = PoseStream::new(
        source,
        cfg.session_settings(),
        JsonFileStore::new(&cfg.log_dir),
    )
    .with_callback(move |pose, captured_ms| {
        let velocity = estimator.update(pose.translation, captured_ms);
        log::debug!(
            "velocity (mm/ms): X={:.4}, Y={:.4}, Z={:.4}",
            velocity[0],
            velocity[1],
            velocity[2]
        );
        now_ms() - captured_ms
    });

    let (tx, rx) = mpsc::channel();
    let signal = stream.shutdown_signal();
    ctrlc::set_handler(move || {
        signal.trigger();
        let _ = tx.send(());
    })
    .context("error setting Ctrl-C handler")?;

    stream.start()?;
    match args.seconds {
        Some(seconds) => log::info!("streaming for {}s (Ctrl-C to stop early)...", seconds),
        None => log::info!("streaming until Ctrl-C..."),
    }
    wait_for_shutdown(&stream, &rx, args.seconds.map(Duration::from_secs));

    log::info!("stopping session...");
    let report = stream
        .stop()
        .ok_or_else(|| anyhow!("session was already stopped"))?;
    log::info!(
        "session finished: {} frames recorded, log {}",
        report.frames_recorded,
        report
            .log_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "not written".to_string())
    );
    match report.exit {
        SessionExit::Stopped => Ok(()),
        SessionExit::Failed(reason) => Err(anyhow!("session failed: {}", reason)),
    }
}

/// Block until Ctrl-C, the optional deadline, or the worker exiting on its own.
fn wait_for_shutdown(stream: &PoseStream, rx: &mpsc::Receiver<()>, limit: Option<Duration>) {
    let started = Instant::now();
    loop {
        if stream.is_finished() {
            log::warn!("acquisition worker exited on its own");
            return;
        }
        let slice = match limit {
            Some(limit) => match limit.checked_sub(started.elapsed()) {
                Some(left) => left.min(WAIT_SLICE),
                None => return,
            },
            None => WAIT_SLICE,
        };
        match rx.recv_timeout(slice) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => return,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
    }
}

fn apply_args(cfg: &mut StreamConfig, args: &Args) -> Result<()> {
    if let Some(address) = &args.address {
        cfg.address = address.clone();
    }
    if let Some(mode) = args.mode {
        cfg.tracked_entity_mode = mode;
    }
    if let Some(millis) = args.poll_interval_ms {
        if millis == 0 {
            return Err(anyhow!("--poll-interval-ms must be >= 1"));
        }
        cfg.poll_interval = Duration::from_millis(millis);
    }
    if let Some(dir) = &args.log_dir {
        cfg.log_dir = dir.clone();
    }
    if let Some(level) = &args.log_level {
        cfg.log_level = level.clone();
    }
    if let Some(path) = &args.log_file {
        cfg.log_file = Some(path.clone());
    }
    Ok(())
}

fn init_logging(cfg: &StreamConfig) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cfg.log_level.as_str()),
    );
    if let Some(path) = &cfg.log_file {
        let file = File::create(path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn build_source(cfg: &StreamConfig, args: &Args) -> Result<Box<dyn PoseSource>> {
    if args.synthetic {
        if !synthetic_rate_is_valid(args.synthetic_rate_hz) {
            return Err(anyhow!(
                "--synthetic-rate-hz must be a positive rate with a representable period"
            ));
        }
        return Ok(Box::new(SyntheticSource::new(SyntheticConfig {
            rate_hz: Some(args.synthetic_rate_hz),
            max_frames: None,
        })));
    }
    if let Some(path) = &args.replay {
        let client = ReplayClient::new(path).with_speed(args.replay_speed);
        let config = DatastreamConfig {
            address: format!("replay:{}", path.display()),
            ..DatastreamConfig::default()
        };
        return Ok(Box::new(DatastreamSession::new(config, client)));
    }
    Err(anyhow!(
        "no Vicon DataStream SDK client is linked into this build (server {}); \
         use --synthetic or --replay",
        cfg.address
    ))
}

fn synthetic_rate_is_valid(hz: f64) -> bool {
    hz > 0.0 && Duration::try_from_secs_f64(1.0 / hz).is_ok()
}
