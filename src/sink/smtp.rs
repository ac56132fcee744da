//! Buffered email delivery. Each flush opens one SMTP session and sends either
//! one message per buffered record or a single digest.

use super::batch::{BufferedRecord, Deliver};
use crate::error::DeliveryError;
use crate::internal;
use crate::mail::{BodyType, EMAIL_ATTR, EmailFields, EmailMessage, SmtpClient, TlsSettings};
use crate::record::LogRecord;
use serde_json::Value;
use std::borrow::Cow;
use std::time::Duration;

/// How buffered records map onto messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmtpGranularity {
    /// One message per record, addressed by the record's own `extra.email` overrides.
    #[default]
    PerRecord,
    /// One message per flush with the default addressing and every body joined.
    Digest,
}

impl SmtpGranularity {
    /// # Errors
    /// Unknown names.
    pub fn parse(s: &str) -> Result<Self, crate::Error> {
        match s.trim().to_lowercase().as_str() {
            "record" | "per_record" | "per-record" => Ok(Self::PerRecord),
            "digest" | "batch" => Ok(Self::Digest),
            other => Err(crate::Error::Config(format!("unknown smtp granularity: {other}"))),
        }
    }
}

/// Relay, addressing defaults and session options.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub defaults: EmailFields,
    pub body_type: BodyType,
    pub credentials: Option<(String, String)>,
    pub tls: Option<TlsSettings>,
    pub granularity: SmtpGranularity,
}

impl SmtpSettings {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_secs(10),
            defaults: EmailFields::default(),
            body_type: BodyType::Plain,
            credentials: None,
            tls: None,
            granularity: SmtpGranularity::PerRecord,
        }
    }

    #[must_use]
    pub fn defaults(mut self, defaults: EmailFields) -> Self {
        self.defaults = defaults;
        self
    }

    #[must_use]
    pub const fn body_type(mut self, body_type: BodyType) -> Self {
        self.body_type = body_type;
        self
    }

    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    #[must_use]
    pub fn tls(mut self, tls: TlsSettings) -> Self {
        self.tls = Some(tls);
        self
    }

    #[must_use]
    pub const fn granularity(mut self, granularity: SmtpGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// `Deliver` backend for `BatchingSink`.
#[derive(Debug, Clone)]
pub struct SmtpDeliver {
    settings: SmtpSettings,
}

impl SmtpDeliver {
    #[must_use]
    pub const fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub const fn settings(&self) -> &SmtpSettings {
        &self.settings
    }

    /// The message a buffered record becomes under `PerRecord` granularity.
    #[must_use]
    pub fn message_for(&self, item: &BufferedRecord) -> EmailMessage {
        EmailMessage::new(
            self.settings.defaults.resolve(&item.record),
            item.formatted.clone(),
            self.settings.body_type,
        )
    }

    fn open(&self) -> Result<SmtpClient, crate::Error> {
        let s = &self.settings;
        let mut client = SmtpClient::connect(&s.host, s.port, s.timeout)?;
        if let Some(tls) = &s.tls {
            client.starttls(tls)?;
        }
        if let Some((user, pass)) = &s.credentials {
            client.login(user, pass)?;
        }
        Ok(client)
    }

    fn send(client: &mut SmtpClient, message: &EmailMessage) -> Result<(), crate::Error> {
        let data = message.render()?;
        client.send_mail(
            &message.fields.from_addr,
            &message.fields.envelope_recipients(),
            &data,
        )
    }
}

impl Deliver for SmtpDeliver {
    /// Lifts the keys of `extra.email` to the top level of `extra` so body
    /// templates can reference them, e.g. `%(subject)s`.
    fn prepare<'a>(&self, record: &'a LogRecord) -> Cow<'a, LogRecord> {
        let Some(Value::Object(email)) = record.attr(EMAIL_ATTR) else {
            return Cow::Borrowed(record);
        };
        let mut owned = record.clone();
        for (k, v) in email {
            owned.extra.entry(k.clone()).or_insert_with(|| v.clone());
        }
        Cow::Owned(owned)
    }

    fn deliver(&self, batch: &[BufferedRecord]) -> Result<(), DeliveryError> {
        let mut client = self.open()?;

        match self.settings.granularity {
            SmtpGranularity::PerRecord => {
                for (delivered, item) in batch.iter().enumerate() {
                    Self::send(&mut client, &self.message_for(item))
                        .map_err(|source| DeliveryError { delivered, source })?;
                }
            }
            SmtpGranularity::Digest => {
                let body = batch
                    .iter()
                    .map(|item| item.formatted.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                let message = EmailMessage::new(
                    self.settings.defaults.clone(),
                    body,
                    self.settings.body_type,
                );
                Self::send(&mut client, &message)?;
            }
        }

        if let Err(e) = client.quit() {
            internal::warn("SMTP", &format!("QUIT failed after delivery: {e}"));
        }
        internal::debug("SMTP", &format!("Delivered {} record(s)", batch.len()));
        Ok(())
    }
}
