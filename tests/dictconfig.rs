mod common;

use common::{CaptureSink, register_capture};
use relaylog::dictconfig::{HandlerConfig, LoggerConfig, to_dict_config};
use relaylog::{
    ConfigDirective, DictConfig, Envelope, FilterSpec, FormatterSpec, HandlerSpec, Level,
    LogRecord, LoggerSpec, Registry,
};

#[test]
fn logger_spec_flattens_with_generated_names() {
    let spec = LoggerSpec::new("app")
        .level(Level::Debug)
        .filter(FilterSpec::name("app.db"))
        .handler(
            HandlerSpec::new("stream")
                .level(Level::Info)
                .formatter(FormatterSpec::new("%(message)s").datefmt("%H:%M"))
                .filter(FilterSpec::reverse(Level::Warn))
                .arg("stream", "stdout"),
        )
        .handler(HandlerSpec::new("null"));

    let config = spec.to_dict_config(false);

    assert!(!config.disable_existing_loggers);
    let logger = &config.loggers["app"];
    assert_eq!(logger.level, Some(Level::Debug));
    assert_eq!(logger.propagate, Some(true));
    assert_eq!(logger.filters, vec!["app.filter0"]);
    assert_eq!(logger.handlers, vec!["app.handler0", "app.handler1"]);

    let handler = &config.handlers["app.handler0"];
    assert_eq!(handler.class, "stream");
    assert_eq!(handler.level, Some(Level::Info));
    assert_eq!(handler.formatter.as_deref(), Some("app.handler0.formatter"));
    assert_eq!(handler.filters, vec!["app.handler0.filter0"]);
    assert_eq!(handler.args["stream"], "stdout");

    let formatter = &config.formatters["app.handler0.formatter"];
    assert_eq!(formatter.datefmt.as_deref(), Some("%H:%M"));
    assert_eq!(
        config.filters["app.handler0.filter0"].class.as_deref(),
        Some("reverse")
    );
    assert_eq!(config.filters["app.filter0"].class, None);
}

#[test]
fn root_spec_fills_root_section() {
    let config = to_dict_config(
        &[
            LoggerSpec::new("root").handler(HandlerSpec::new("null")),
            LoggerSpec::new("svc").propagate(false),
        ],
        true,
    );

    let root = config.root.as_ref().unwrap();
    assert_eq!(root.handlers, vec!["root.handler0"]);
    assert_eq!(root.propagate, None);
    assert!(!config.loggers.contains_key("root"));
    assert_eq!(config.loggers["svc"].propagate, Some(false));
}

#[test]
fn flattened_spec_applies_to_registry() {
    let registry = Registry::new();
    let sink = CaptureSink::default();
    register_capture(&registry, "capture", &sink);

    let spec = LoggerSpec::new("app").handler(
        HandlerSpec::new("capture")
            .formatter(FormatterSpec::new("%(levelname)s %(message)s"))
            .filter(FilterSpec::attribute("tag")),
    );
    registry.apply(&spec.to_dict_config(true)).unwrap();

    registry
        .handle(&LogRecord::new("app", Level::Info, "untagged"))
        .unwrap();
    registry
        .handle(&LogRecord::new("app", Level::Info, "tagged").with_extra("tag", "x"))
        .unwrap();

    assert_eq!(sink.lines(), vec!["INFO tagged"]);
}

#[test]
fn dict_config_json_roundtrip_keeps_handler_args() {
    let config = DictConfig::default()
        .handler(
            "mail",
            HandlerConfig::new("smtp")
                .arg("mailhost", serde_json::json!(["localhost", 2525]))
                .arg("toAddrs", serde_json::json!(["ops@x.com"])),
        )
        .logger("app", LoggerConfig::default().handler("mail"));

    let json = serde_json::to_string(&config).unwrap();
    let back = DictConfig::from_json(&json).unwrap();

    assert_eq!(back, config);
    assert_eq!(back.handlers["mail"].args["mailhost"][1], 2525);
}

#[test]
fn dict_config_defaults() {
    let config = DictConfig::from_json(r#"{"version": 1}"#).unwrap();
    assert!(config.disable_existing_loggers);
    assert!(!config.incremental);
    assert!(config.root.is_none());
}

#[test]
fn unsupported_version_fails_to_parse() {
    assert!(DictConfig::from_json(r#"{"version": 3}"#).is_err());
}

#[test]
fn envelope_wire_form() {
    let envelope = Envelope::both(
        ConfigDirective::SetLevel {
            logger: "app".to_string(),
            level: Some(Level::Debug),
        },
        LogRecord::new("app", Level::Info, "hi"),
    );
    let json = serde_json::to_value(&envelope).unwrap();

    assert_eq!(json["config"]["set_level"]["logger"], "app");
    assert_eq!(json["config"]["set_level"]["level"], "DEBUG");
    assert_eq!(json["record"]["level"], "INFO");

    let back: Envelope = serde_json::from_value(json).unwrap();
    assert_eq!(back, envelope);
}

#[test]
fn set_level_accepts_notset() {
    let envelope: Envelope = serde_json::from_str(
        r#"{"config": {"set_level": {"logger": "app", "level": "NOTSET"}}}"#,
    )
    .unwrap();

    assert_eq!(
        envelope.config,
        Some(ConfigDirective::SetLevel {
            logger: "app".to_string(),
            level: None
        })
    );
    assert!(envelope.record.is_none());
    envelope.validate().unwrap();
}
