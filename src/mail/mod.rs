//! Email rendering and a minimal SMTP client for the buffered mail sink.

mod client;
mod message;

pub use client::{Reply, SmtpClient, TlsSettings};
pub use message::{BodyType, EmailMessage};

use crate::record::LogRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record attribute holding per-record email overrides.
pub const EMAIL_ATTR: &str = "email";

/// Addressing and subject of one email.
///
/// Keys use the camelCase spelling records carry in `extra.email`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailFields {
    #[serde(default)]
    pub from_addr: String,
    #[serde(default)]
    pub to_addrs: Vec<String>,
    #[serde(default)]
    pub cc_addrs: Vec<String>,
    #[serde(default)]
    pub bcc_addrs: Vec<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

impl EmailFields {
    /// Starts from `self` as defaults and applies whatever the record's
    /// `extra.email` object overrides. Malformed override values are ignored.
    #[must_use]
    pub fn resolve(&self, record: &LogRecord) -> Self {
        let mut fields = self.clone();
        let Some(Value::Object(overrides)) = record.attr(EMAIL_ATTR) else {
            return fields;
        };

        if let Some(Value::String(from)) = overrides.get("fromAddr") {
            fields.from_addr.clone_from(from);
        }
        if let Some(to) = overrides.get("toAddrs").and_then(address_list) {
            fields.to_addrs = to;
        }
        if let Some(cc) = overrides.get("ccAddrs").and_then(address_list) {
            fields.cc_addrs = cc;
        }
        if let Some(bcc) = overrides.get("bccAddrs").and_then(address_list) {
            fields.bcc_addrs = bcc;
        }
        if let Some(Value::String(subject)) = overrides.get("subject") {
            fields.subject.clone_from(subject);
        }
        match overrides.get("attachment") {
            Some(Value::String(path)) => fields.attachment = Some(path.clone()),
            Some(Value::Null) => fields.attachment = None,
            _ => {}
        }
        fields
    }

    /// SMTP `RCPT TO` addresses: To, then Cc, then Bcc.
    #[must_use]
    pub fn envelope_recipients(&self) -> Vec<String> {
        self.to_addrs
            .iter()
            .chain(&self.cc_addrs)
            .chain(&self.bcc_addrs)
            .cloned()
            .collect()
    }
}

/// A single address string or an array of them.
fn address_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect(),
        ),
        _ => None,
    }
}
