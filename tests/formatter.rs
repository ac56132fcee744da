//! Tests for `%`- and `{`-style record formatting.

use chrono::{TimeZone, Utc};
use relaylog::fmt::{FormatSegment, FormatStyle, FormatTemplate, Placeholder};
use relaylog::{Formatter, Level, LogRecord};

fn record() -> LogRecord {
    let mut record = LogRecord::new("app.db", Level::Warn, "disk almost full");
    record.created = Utc.with_ymd_and_hms(2024, 5, 17, 8, 30, 0).unwrap();
    record
}

#[test]
fn default_formatter_renders_message_only() {
    assert_eq!(Formatter::default().format(&record()), "disk almost full");
}

#[test]
fn percent_style_fields_and_padding() {
    let formatter = Formatter::new("%(levelname)-8s|%(name)s|%(message)s");
    assert_eq!(
        formatter.format(&record()),
        "WARNING |app.db|disk almost full"
    );
}

#[test]
fn percent_literal_is_unescaped() {
    let formatter = Formatter::new("100%% %(levelno)d");
    assert_eq!(formatter.format(&record()), "100% 30");
}

#[test]
fn brace_style_with_alignment() {
    let formatter = Formatter::with_style("{levelname:>9}:{message}", FormatStyle::Brace);
    assert_eq!(formatter.format(&record()), "  WARNING:disk almost full");
}

#[test]
fn extra_attributes_are_addressable() {
    let record = record().with_extra("host", "db-1").with_extra("port", 5432);
    let formatter = Formatter::new("%(host)s:%(port)s %(missing)s!");
    assert_eq!(formatter.format(&record), "db-1:5432 !");
}

#[test]
fn exc_text_follows_on_its_own_line() {
    let record = record().with_exc_text("Traceback: boom");
    let formatter = Formatter::new("%(message)s");
    assert_eq!(formatter.format(&record), "disk almost full\nTraceback: boom");
}

#[test]
fn asctime_uses_datefmt() {
    let record = record();
    let formatter = Formatter::new("%(asctime)s").datefmt("%Y");
    assert_eq!(formatter.format(&record), "2024");
}

#[test]
fn template_is_parsed_into_segments() {
    let template = FormatTemplate::parse("[%(name)s] %(message)s", FormatStyle::Percent);
    let fields: Vec<_> = template
        .segments()
        .iter()
        .filter_map(|s| match s {
            FormatSegment::Field(p, _) => Some(p.clone()),
            FormatSegment::Literal(_) => None,
        })
        .collect();
    assert_eq!(fields, vec![Placeholder::Name, Placeholder::Message]);
    assert!(!template.uses_asctime());
}

#[test]
fn precision_truncates_strings() {
    let formatter = Formatter::new("%(message).4s");
    assert_eq!(formatter.format(&record()), "disk");
}
