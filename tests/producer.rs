use relaylog::producer::transform;
use relaylog::{ConfigDirective, Envelope, Formatter, Level, LogContext, LogRecord};
use serde_json::{Map, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn next(context: &LogContext) -> Option<Envelope> {
    context
        .queue()
        .get_timeout(Duration::from_millis(500))
        .unwrap()
}

fn next_record(context: &LogContext) -> LogRecord {
    next(context).unwrap().record.unwrap()
}

#[test]
fn record_carries_name_level_and_location() {
    let tmp = TempDir::new().unwrap();
    let context = LogContext::init(tmp.path()).unwrap();
    let producer = context.producer("app.worker");

    producer.error("failed");

    let record = next_record(&context);
    assert_eq!(record.name, "app.worker");
    assert_eq!(record.level, Level::Error);
    assert_eq!(record.msg, "failed");
    assert_eq!(record.process, std::process::id());
    let location = record.location.unwrap();
    assert!(location.pathname.ends_with("producer.rs"));
    assert!(location.lineno > 0);
    assert_eq!(location.module.as_deref(), Some("app.worker"));
}

#[test]
fn local_level_gate_drops_below_threshold() {
    let tmp = TempDir::new().unwrap();
    let context = LogContext::init(tmp.path()).unwrap();
    let producer = context.producer("app").level(Level::Warn);

    producer.info("skipped");
    producer.warn("sent");

    assert_eq!(next_record(&context).msg, "sent");
    assert!(next(&context).is_none());
    assert!(!producer.is_enabled_for(Level::Debug));
    assert!(producer.is_enabled_for(Level::Critical));
}

#[test]
fn transforms_run_in_order() {
    let tmp = TempDir::new().unwrap();
    let context = LogContext::init(tmp.path()).unwrap();
    let producer = context
        .producer("app")
        .transform(transform::with_prefix("[a] "))
        .transform(transform::with_prefix("[b] "))
        .transform(transform::with_extra("msg_type", "audit"))
        .transform(Arc::new(|record: &mut LogRecord| {
            record.msg = record.msg.to_uppercase();
        }));

    producer.info("event");

    let record = next_record(&context);
    assert_eq!(record.msg, "[B] [A] EVENT");
    assert_eq!(record.extra["msg_type"], "audit");
}

#[test]
fn extra_attributes_travel_with_record() {
    let tmp = TempDir::new().unwrap();
    let context = LogContext::init(tmp.path()).unwrap();
    let producer = context.producer("app");

    let mut extra = Map::new();
    extra.insert("email".into(), json!({"toAddrs": ["ops@x.com"]}));
    producer.log_with(Level::Critical, "page", extra);

    let record = next_record(&context);
    assert_eq!(record.extra["email"]["toAddrs"][0], "ops@x.com");
}

#[test]
fn formatter_renders_before_queueing() {
    let tmp = TempDir::new().unwrap();
    let context = LogContext::init(tmp.path()).unwrap();
    let producer = context
        .producer("app")
        .formatter(Formatter::new("%(name)s says %(message)s"));

    producer.info("hi");

    assert_eq!(next_record(&context).msg, "app says hi");
}

#[test]
fn producer_filter_blocks_records() {
    let tmp = TempDir::new().unwrap();
    let context = LogContext::init(tmp.path()).unwrap();
    let producer = context
        .producer("app")
        .filter(|record: &LogRecord| !record.msg.contains("secret"));

    producer.info("secret token");
    producer.info("public");

    assert_eq!(next_record(&context).msg, "public");
    assert!(next(&context).is_none());
}

#[test]
fn queue_errors_are_swallowed() {
    let tmp = TempDir::new().unwrap();
    let context = LogContext::init(tmp.path()).unwrap();
    let remote = LogContext::attach(tmp.path()).unwrap();
    drop(context);

    // consumer gone: put fails, logging must not panic
    remote.producer("app").info("nobody listens");
}

#[test]
fn configure_and_set_remote_level_send_directives() {
    let tmp = TempDir::new().unwrap();
    let context = LogContext::init(tmp.path()).unwrap();
    let producer = context.producer("app");

    producer
        .configure(relaylog::DictConfig::default())
        .unwrap();
    producer.set_remote_level(Some(Level::Debug)).unwrap();

    assert!(matches!(
        next(&context).unwrap().config,
        Some(ConfigDirective::Dict(_))
    ));
    assert_eq!(
        next(&context).unwrap().config,
        Some(ConfigDirective::SetLevel {
            logger: "app".to_string(),
            level: Some(Level::Debug)
        })
    );
}

#[test]
fn configure_rejects_invalid_version() {
    let tmp = TempDir::new().unwrap();
    let context = LogContext::init(tmp.path()).unwrap();
    let config = relaylog::DictConfig {
        version: 9,
        ..relaylog::DictConfig::default()
    };

    assert!(context.producer("app").configure(config).is_err());
    assert!(next(&context).is_none());
}
