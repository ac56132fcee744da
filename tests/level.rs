//! Tests for log level parsing, ordering and wire form.

use relaylog::Level;

#[test]
fn level_ordering() {
    assert!(Level::Trace < Level::Debug);
    assert!(Level::Debug < Level::Info);
    assert!(Level::Info < Level::Warn);
    assert!(Level::Warn < Level::Error);
    assert!(Level::Error < Level::Critical);
}

#[test]
fn level_display_and_name() {
    assert_eq!(Level::Warn.to_string(), "warn");
    assert_eq!(Level::Warn.name(), "WARNING");
    assert_eq!(Level::Critical.name(), "CRITICAL");
}

#[test]
fn level_from_str_aliases() {
    assert_eq!("trace".parse::<Level>().unwrap(), Level::Trace);
    assert_eq!("DEBUG".parse::<Level>().unwrap(), Level::Debug);
    assert_eq!("warning".parse::<Level>().unwrap(), Level::Warn);
    assert_eq!("err".parse::<Level>().unwrap(), Level::Error);
    assert_eq!("fatal".parse::<Level>().unwrap(), Level::Critical);
    assert_eq!("30".parse::<Level>().unwrap(), Level::Warn);
}

#[test]
fn level_from_str_invalid() {
    assert!("invalid".parse::<Level>().is_err());
}

#[test]
fn notset_parses_to_none() {
    assert_eq!(Level::parse_optional("NOTSET").unwrap(), None);
    assert_eq!(Level::parse_optional("0").unwrap(), None);
    assert_eq!(Level::parse_optional("info").unwrap(), Some(Level::Info));
}

#[test]
fn numeric_levels_round_down() {
    assert_eq!(Level::from_number(25), Some(Level::Info));
    assert_eq!(Level::from_number(99), Some(Level::Critical));
    assert_eq!(Level::from_number(0), None);
}

#[test]
fn serializes_as_upper_case_name() {
    assert_eq!(serde_json::to_string(&Level::Warn).unwrap(), "\"WARNING\"");
    let parsed: Level = serde_json::from_str("\"INFO\"").unwrap();
    assert_eq!(parsed, Level::Info);
    let numeric: Level = serde_json::from_str("40").unwrap();
    assert_eq!(numeric, Level::Error);
}

#[test]
fn level_default() {
    assert_eq!(Level::default(), Level::Info);
}
