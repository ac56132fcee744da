use super::EmailFields;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Local;
use std::fmt::Write as _;
use std::path::PathBuf;
use ulid::Ulid;

const LINE_WIDTH: usize = 76;

/// MIME subtype of the primary body part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyType {
    #[default]
    Plain,
    Html,
}

impl BodyType {
    /// Accepts `text`, `plain`, `text/plain`, `html` and `text/html`.
    ///
    /// # Errors
    /// Returns `Error::Config` for other values.
    pub fn parse(s: &str) -> Result<Self, crate::Error> {
        match s.trim().to_lowercase().as_str() {
            "text" | "plain" | "text/plain" => Ok(Self::Plain),
            "html" | "text/html" => Ok(Self::Html),
            other => Err(crate::Error::Config(format!("unsupported mime type: {other}"))),
        }
    }

    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Plain => "text/plain",
            Self::Html => "text/html",
        }
    }
}

/// One outgoing email: resolved addressing plus a rendered body.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub fields: EmailFields,
    pub body: String,
    pub body_type: BodyType,
}

impl EmailMessage {
    #[must_use]
    pub const fn new(fields: EmailFields, body: String, body_type: BodyType) -> Self {
        Self {
            fields,
            body,
            body_type,
        }
    }

    /// Header block only, without the trailing blank line. BCC addresses never appear.
    #[must_use]
    pub fn headers(&self, boundary: &str) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\nMIME-Version: 1.0\r\n"
        );
        let _ = write!(out, "From: {}\r\n", self.fields.from_addr);
        let _ = write!(out, "To: {}\r\n", self.fields.to_addrs.join(", "));
        if !self.fields.cc_addrs.is_empty() {
            let _ = write!(out, "Cc: {}\r\n", self.fields.cc_addrs.join(", "));
        }
        let _ = write!(out, "Subject: {}\r\n", encode_header(&self.fields.subject));
        let _ = write!(out, "Date: {}\r\n", Local::now().to_rfc2822());
        let _ = write!(out, "Message-ID: <{}@relaylog>", Ulid::new());
        out
    }

    /// Full multipart/mixed message with CRLF line endings.
    ///
    /// # Errors
    /// The attachment cannot be read.
    pub fn render(&self) -> Result<String, crate::Error> {
        let boundary = format!("===============relaylog-{}==", Ulid::new());
        let mut out = self.headers(&boundary);
        out.push_str("\r\n\r\n");

        let _ = write!(
            out,
            "--{boundary}\r\nContent-Type: {}; charset=\"utf-8\"\r\nMIME-Version: 1.0\r\nContent-Transfer-Encoding: base64\r\n\r\n",
            self.body_type.content_type()
        );
        push_base64(&mut out, self.body.as_bytes());

        if let Some(attachment) = &self.fields.attachment {
            let path = resolve_attachment(attachment)?;
            let bytes = std::fs::read(&path)?;
            let _ = write!(
                out,
                "--{boundary}\r\nContent-Type: application/octet-stream\r\nMIME-Version: 1.0\r\nContent-Transfer-Encoding: base64\r\nContent-Disposition: attachment; filename={}\r\n\r\n",
                path.display()
            );
            push_base64(&mut out, &bytes);
        }

        let _ = write!(out, "--{boundary}--\r\n");
        Ok(out)
    }
}

/// Expands `~` and makes the path absolute.
fn resolve_attachment(path: &str) -> Result<PathBuf, crate::Error> {
    let expanded = shellexpand::tilde(path);
    Ok(std::fs::canonicalize(expanded.as_ref())?)
}

fn push_base64(out: &mut String, bytes: &[u8]) {
    let encoded = STANDARD.encode(bytes);
    for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
}

/// RFC 2047 encoded-word for non-ASCII header values.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?b?{}?=", STANDARD.encode(value))
    }
}
