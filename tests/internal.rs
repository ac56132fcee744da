use relaylog::{Config, Level, internal};
use std::fs;
use tempfile::TempDir;

// The diagnostic logger is process-wide, so everything runs in one test.
#[test]
fn diagnostics_follow_internal_config() {
    assert_eq!(internal::level(), Some(Level::Warn));

    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("diag").join("relaylog.log");
    let mut config = Config::default();
    config.internal.level = "info".to_string();
    config.internal.file = Some(file.to_string_lossy().into_owned());

    internal::init_with_config(&config);
    assert_eq!(internal::level(), Some(Level::Info));

    internal::debug("TEST", "below threshold");
    internal::error("TEST", "config rejected");

    let written = fs::read_to_string(&file).unwrap();
    assert!(written.contains("ERROR"));
    assert!(written.contains("TEST"));
    assert!(written.contains("config rejected"));
    assert!(!written.contains("below threshold"));
}
