use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use vicon_stream::config::StreamConfig;
use vicon_stream::TrackedEntityMode;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "VICON_CONFIG",
        "VICON_ADDRESS",
        "VICON_TRACKED_MODE",
        "VICON_LOG_DIR",
        "VICON_POLL_INTERVAL_MS",
        "VICON_LOG_LEVEL",
        "VICON_LOG_FILE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "vicon": {
            "address": "10.0.0.5:801",
            "tracked_entity_mode": "labeled",
            "poll_interval_ms": 10
        },
        "logging": {
            "log_dir": "/var/log/vicon",
            "level": "debug"
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("VICON_CONFIG", file.path());
    std::env::set_var("VICON_POLL_INTERVAL_MS", "5");
    std::env::set_var("VICON_LOG_FILE", "/tmp/vicon_output.txt");

    let cfg = StreamConfig::load().expect("load config");

    assert_eq!(cfg.address, "10.0.0.5:801");
    assert_eq!(cfg.tracked_entity_mode, TrackedEntityMode::Labeled);
    assert_eq!(cfg.poll_interval, Duration::from_millis(5));
    assert_eq!(cfg.log_dir, PathBuf::from("/var/log/vicon"));
    assert_eq!(cfg.log_level, "debug");
    assert_eq!(cfg.log_file, Some(PathBuf::from("/tmp/vicon_output.txt")));

    let settings = cfg.session_settings();
    assert_eq!(settings.tracked_entity_mode, TrackedEntityMode::Labeled);
    assert_eq!(settings.poll_interval, Duration::from_millis(5));

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
[vicon]
address = "192.168.10.2:801"
tracked_entity_mode = "unlabeled"

[logging]
log_dir = "flight_logs"
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("VICON_CONFIG", file.path());
    std::env::set_var("VICON_TRACKED_MODE", "LABELED");

    let cfg = StreamConfig::load().expect("load config");
    assert_eq!(cfg.address, "192.168.10.2:801");
    assert_eq!(cfg.tracked_entity_mode, TrackedEntityMode::Labeled);
    assert_eq!(cfg.log_dir, PathBuf::from("flight_logs"));
    assert_eq!(cfg.poll_interval, Duration::from_millis(20));

    clear_env();
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("VICON_POLL_INTERVAL_MS", "fast");
    assert!(StreamConfig::load().is_err());
    clear_env();

    std::env::set_var("VICON_POLL_INTERVAL_MS", "0");
    assert!(StreamConfig::load().is_err());
    clear_env();

    std::env::set_var("VICON_TRACKED_MODE", "skeleton");
    assert!(StreamConfig::load().is_err());
    clear_env();
}
