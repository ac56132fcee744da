use relaylog::mail::{BodyType, EmailFields, EmailMessage};
use relaylog::{Level, LogRecord};
use serde_json::json;
use std::io::Write;

fn fields() -> EmailFields {
    EmailFields {
        from_addr: "alerts@example.com".to_string(),
        to_addrs: vec!["a@x.com".to_string(), "b@x.com".to_string()],
        cc_addrs: vec!["c@x.com".to_string()],
        bcc_addrs: vec!["d@x.com".to_string()],
        subject: "Disk alert".to_string(),
        attachment: None,
    }
}

#[test]
fn headers_list_to_and_cc_but_never_bcc() {
    let message = EmailMessage::new(fields(), "body".to_string(), BodyType::Plain);
    let headers = message.headers("BOUNDARY");

    assert!(headers.contains("To: a@x.com, b@x.com\r\n"));
    assert!(headers.contains("Cc: c@x.com\r\n"));
    assert!(headers.contains("From: alerts@example.com\r\n"));
    assert!(headers.contains("Subject: Disk alert\r\n"));
    assert!(headers.contains("boundary=\"BOUNDARY\""));
    assert!(!headers.contains("d@x.com"));
}

#[test]
fn envelope_recipients_include_bcc() {
    assert_eq!(
        fields().envelope_recipients(),
        vec!["a@x.com", "b@x.com", "c@x.com", "d@x.com"]
    );
}

#[test]
fn cc_header_omitted_when_empty() {
    let mut fields = fields();
    fields.cc_addrs.clear();
    let message = EmailMessage::new(fields, "body".to_string(), BodyType::Plain);
    assert!(!message.headers("B").contains("Cc:"));
}

#[test]
fn non_ascii_subject_is_encoded() {
    let mut fields = fields();
    fields.subject = "Störung".to_string();
    let message = EmailMessage::new(fields, String::new(), BodyType::Plain);
    let headers = message.headers("B");
    assert!(headers.contains("Subject: =?utf-8?b?"));
}

#[test]
fn render_encodes_body_as_base64_part() {
    let message = EmailMessage::new(fields(), "hello".to_string(), BodyType::Html);
    let rendered = message.render().unwrap();

    assert!(rendered.contains("Content-Type: text/html; charset=\"utf-8\""));
    assert!(rendered.contains("aGVsbG8=\r\n"));
    assert!(rendered.trim_end().ends_with("==--"));
}

#[test]
fn render_includes_attachment() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"attached").unwrap();

    let mut fields = fields();
    fields.attachment = Some(file.path().to_string_lossy().into_owned());
    let rendered = EmailMessage::new(fields, "b".to_string(), BodyType::Plain)
        .render()
        .unwrap();

    assert!(rendered.contains("Content-Disposition: attachment; filename="));
    assert!(rendered.contains("YXR0YWNoZWQ=\r\n"));
}

#[test]
fn missing_attachment_is_an_error() {
    let mut fields = fields();
    fields.attachment = Some("/nonexistent/relaylog/attachment.bin".to_string());
    let message = EmailMessage::new(fields, "b".to_string(), BodyType::Plain);
    assert!(message.render().is_err());
}

#[test]
fn record_overrides_replace_defaults() {
    let record = LogRecord::new("app", Level::Error, "boom").with_extra(
        "email",
        json!({
            "toAddrs": "ops@x.com",
            "subject": "Override",
            "ccAddrs": ["e@x.com", "f@x.com"],
        }),
    );

    let resolved = fields().resolve(&record);

    assert_eq!(resolved.to_addrs, vec!["ops@x.com"]);
    assert_eq!(resolved.cc_addrs, vec!["e@x.com", "f@x.com"]);
    assert_eq!(resolved.subject, "Override");
    assert_eq!(resolved.from_addr, "alerts@example.com");
    assert_eq!(resolved.bcc_addrs, vec!["d@x.com"]);
}

#[test]
fn record_without_overrides_uses_defaults() {
    let record = LogRecord::new("app", Level::Error, "boom");
    assert_eq!(fields().resolve(&record), fields());
}

#[test]
fn body_type_parse() {
    assert_eq!(BodyType::parse("text").unwrap(), BodyType::Plain);
    assert_eq!(BodyType::parse("text/html").unwrap(), BodyType::Html);
    assert!(BodyType::parse("application/pdf").is_err());
}
