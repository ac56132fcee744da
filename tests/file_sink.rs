use relaylog::sink::{Rotation, TimedRotatingFileSink};
use relaylog::{Formatter, Level, LogRecord, Sink};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn emit(sink: &TimedRotatingFileSink, msg: &str) {
    sink.emit(
        &LogRecord::new("app", Level::Info, msg),
        &Formatter::new("%(levelname)s|%(message)s"),
    )
    .unwrap();
}

#[test]
fn writes_formatted_lines() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("app.log");
    let sink = TimedRotatingFileSink::new(path.to_str().unwrap()).unwrap();

    emit(&sink, "one");
    emit(&sink, "two");
    sink.close().unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content, "INFO|one\nINFO|two\n");
}

#[test]
fn header_written_once_on_new_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("app.log");

    let sink = TimedRotatingFileSink::new(path.to_str().unwrap())
        .unwrap()
        .header("time|level|msg");
    emit(&sink, "one");
    emit(&sink, "two");
    sink.close().unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content, "time|level|msg\nINFO|one\nINFO|two\n");
}

#[test]
fn header_not_repeated_when_reopening_non_empty_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("app.log");

    for msg in ["first", "second"] {
        let sink = TimedRotatingFileSink::new(path.to_str().unwrap())
            .unwrap()
            .header("HEADER");
        emit(&sink, msg);
        sink.close().unwrap();
    }

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content.matches("HEADER").count(), 1);
    assert!(content.ends_with("INFO|first\nINFO|second\n"));
}

#[test]
fn creates_missing_parent_directories() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested").join("deeper").join("app.log");

    let sink = TimedRotatingFileSink::new(path.to_str().unwrap()).unwrap();
    emit(&sink, "x");

    assert!(path.exists());
}

#[test]
fn rollover_moves_file_and_rewrites_header() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("app.log");

    let sink = TimedRotatingFileSink::new(path.to_str().unwrap())
        .unwrap()
        .header("H")
        .rotation(Rotation::Seconds(1));
    emit(&sink, "before");
    std::thread::sleep(Duration::from_millis(1100));
    emit(&sink, "after");
    sink.close().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "H\nINFO|after\n");

    let rotated: Vec<_> = fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("app.log."))
        .collect();
    assert_eq!(rotated.len(), 1);
    let old = fs::read_to_string(rotated[0].path()).unwrap();
    assert_eq!(old, "H\nINFO|before\n");
}

#[test]
fn rotation_parse_codes() {
    assert_eq!(Rotation::parse("h", 2).unwrap(), Rotation::Hours(2));
    assert_eq!(Rotation::parse("midnight", 1).unwrap(), Rotation::Midnight(1));
    assert_eq!(
        Rotation::parse("W0", 1).unwrap(),
        Rotation::Weekday(chrono::Weekday::Mon)
    );
    assert!(Rotation::parse("W9", 1).is_err());
    assert!(Rotation::parse("X", 1).is_err());
    assert!(Rotation::parse("S", 0).is_err());
}
