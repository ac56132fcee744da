use relaylog::{Config, Level, OverflowPolicy};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn missing_file_yields_defaults() {
    let tmp = TempDir::new().unwrap();
    let config = Config::load_from(&tmp.path().join("absent.toml")).unwrap();

    assert_eq!(
        config.overflow_policy().unwrap(),
        OverflowPolicy::Block {
            timeout: Some(Duration::from_secs(1))
        }
    );
    assert_eq!(config.grace_period(), Duration::from_millis(100));
    assert_eq!(config.poll_interval(), Duration::from_secs(1));
    assert_eq!(config.internal_level(), Level::Warn);
    assert!(!config.listener.raise_on_exc);
    assert!(config.logging_config().unwrap().is_none());
}

#[test]
fn load_from_toml() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("relaylog.toml");
    fs::write(
        &path,
        r#"
[listener]
runtime_dir = "/tmp/relaylog-test"
raise_on_exc = true
grace_period_ms = 250
poll_interval_ms = 50

[queue]
overflow = "block"
block_timeout_ms = 500
max_envelope_bytes = 1024

[internal]
level = "debug"
"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();

    assert_eq!(config.runtime_dir(), PathBuf::from("/tmp/relaylog-test"));
    assert!(config.listener.raise_on_exc);
    assert_eq!(config.grace_period(), Duration::from_millis(250));
    assert_eq!(config.poll_interval(), Duration::from_millis(50));
    assert_eq!(
        config.overflow_policy().unwrap(),
        OverflowPolicy::Block {
            timeout: Some(Duration::from_millis(500))
        }
    );
    assert_eq!(config.queue.max_envelope_bytes, 1024);
    assert_eq!(config.internal_level(), Level::Debug);
}

#[test]
fn partial_sections_keep_defaults() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("relaylog.toml");
    fs::write(&path, "[queue]\noverflow = \"drop\"\n").unwrap();

    let config = Config::load_from(&path).unwrap();

    assert_eq!(config.overflow_policy().unwrap(), OverflowPolicy::Drop);
    assert_eq!(config.grace_period(), Duration::from_millis(100));
}

#[test]
fn invalid_values_are_reported() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("relaylog.toml");

    fs::write(&path, "[queue]\noverflow = \"explode\"\n").unwrap();
    let config = Config::load_from(&path).unwrap();
    assert!(config.overflow_policy().is_err());

    fs::write(&path, "[listener\n").unwrap();
    assert!(Config::load_from(&path).is_err());
}

#[test]
fn unknown_internal_level_falls_back_to_warn() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("relaylog.toml");
    fs::write(&path, "[internal]\nlevel = \"loud\"\n").unwrap();

    assert_eq!(Config::load_from(&path).unwrap().internal_level(), Level::Warn);
}

#[test]
fn logging_config_is_read_from_json_file() {
    let tmp = TempDir::new().unwrap();
    let logging = tmp.path().join("logging.json");
    fs::write(
        &logging,
        r#"{"version": 1, "root": {"level": "INFO", "handlers": []}}"#,
    )
    .unwrap();
    let path = tmp.path().join("relaylog.toml");
    fs::write(
        &path,
        format!("[listener]\nlogging = {:?}\n", logging.to_string_lossy()),
    )
    .unwrap();

    let dict = Config::load_from(&path)
        .unwrap()
        .logging_config()
        .unwrap()
        .unwrap();
    assert_eq!(dict.root.unwrap().level, Some(Level::Info));
}

#[test]
fn zero_block_timeout_waits_indefinitely() {
    let mut config = Config::default();
    config.queue.overflow = "block".to_string();
    config.queue.block_timeout_ms = 0;

    assert_eq!(
        config.overflow_policy().unwrap(),
        OverflowPolicy::Block { timeout: None }
    );
}
