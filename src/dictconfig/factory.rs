//! Class-name → constructor tables for handlers and filters.

use crate::filter::{AttributeFilter, Filter, NameFilter, ReverseLevelFilter};
use crate::fmt::{FormatStyle, Formatter};
use crate::level::Level;
use crate::mail::{BodyType, EMAIL_ATTR, EmailFields, TlsSettings};
use crate::sink::{
    BatchingSink, ClearPolicy, DatabaseDeliver, Handler, JsonlCollection, NullSink, Rotation,
    SmtpDeliver, SmtpGranularity, SmtpSettings, StreamSink, StreamTarget, TimedRotatingFileSink,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Builds a handler (sink plus any class-intrinsic filters or formatter) from
/// constructor arguments. Level, configured filters and a named formatter are
/// applied afterwards by the registry.
pub type HandlerFactory =
    Arc<dyn Fn(&FactoryArgs<'_>) -> Result<Handler, crate::Error> + Send + Sync>;

/// Builds a filter from its arguments.
pub type FilterFactory =
    Arc<dyn Fn(&FactoryArgs<'_>) -> Result<Arc<dyn Filter>, crate::Error> + Send + Sync>;

/// Typed access to the loose constructor arguments of one config entry.
#[derive(Debug, Clone, Copy)]
pub struct FactoryArgs<'a> {
    pub name: &'a str,
    pub class: &'a str,
    pub args: &'a Map<String, Value>,
}

impl<'a> FactoryArgs<'a> {
    #[must_use]
    pub const fn new(name: &'a str, class: &'a str, args: &'a Map<String, Value>) -> Self {
        Self { name, class, args }
    }

    /// First present key among `keys`; aliases cover snake/camel spellings.
    #[must_use]
    pub fn get(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter()
            .find_map(|k| self.args.get(*k))
            .filter(|v| !v.is_null())
    }

    fn invalid(&self, key: &str, expected: &str) -> crate::Error {
        crate::Error::Config(format!(
            "handler '{}' ({}): '{key}' must be {expected}",
            self.name, self.class
        ))
    }

    /// # Errors
    /// Present but not a string.
    pub fn str(&self, keys: &[&str]) -> Result<Option<&'a str>, crate::Error> {
        match self.get(keys) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(self.invalid(keys[0], "a string")),
        }
    }

    /// # Errors
    /// Missing or not a string.
    pub fn required_str(&self, keys: &[&str]) -> Result<&'a str, crate::Error> {
        self.str(keys)?.ok_or_else(|| {
            crate::Error::Config(format!(
                "handler '{}' ({}): missing '{}'",
                self.name, self.class, keys[0]
            ))
        })
    }

    /// # Errors
    /// Present but not a non-negative integer.
    pub fn u64(&self, keys: &[&str]) -> Result<Option<u64>, crate::Error> {
        match self.get(keys) {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.invalid(keys[0], "a non-negative integer")),
        }
    }

    /// Negative numbers read as zero, matching the "-1 means unbounded" convention
    /// of buffer sizes and timeouts.
    ///
    /// # Errors
    /// Present but not a number.
    pub fn non_negative_f64(&self, keys: &[&str]) -> Result<Option<f64>, crate::Error> {
        match self.get(keys) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(|n| Some(n.max(0.0)))
                .ok_or_else(|| self.invalid(keys[0], "a number")),
        }
    }

    /// # Errors
    /// Present but not a boolean.
    pub fn bool(&self, keys: &[&str]) -> Result<Option<bool>, crate::Error> {
        match self.get(keys) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(self.invalid(keys[0], "a boolean")),
        }
    }

    /// A single string or an array of strings.
    ///
    /// # Errors
    /// Any other shape.
    pub fn string_list(&self, keys: &[&str]) -> Result<Option<Vec<String>>, crate::Error> {
        match self.get(keys) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(ToString::to_string))
                .collect::<Option<Vec<_>>>()
                .map(Some)
                .ok_or_else(|| self.invalid(keys[0], "a list of strings")),
            Some(_) => Err(self.invalid(keys[0], "a string or list of strings")),
        }
    }

    /// # Errors
    /// Present but not a level name or number.
    pub fn level(&self, keys: &[&str]) -> Result<Option<Level>, crate::Error> {
        match self.get(keys) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Level::parse_optional(s)?),
            Some(Value::Number(n)) => Ok(n.as_u64().and_then(Level::from_number)),
            Some(_) => Err(self.invalid(keys[0], "a level")),
        }
    }

    fn seconds(&self, keys: &[&str]) -> Result<Option<Duration>, crate::Error> {
        Ok(self
            .non_negative_f64(keys)?
            .map(Duration::from_secs_f64))
    }

    fn clear_policy(&self) -> Result<ClearPolicy, crate::Error> {
        match self.str(&["clear_policy", "clearPolicy"])? {
            None => Ok(ClearPolicy::default()),
            Some(p) => match p.trim().to_lowercase().as_str() {
                "at_most_once" | "at-most-once" => Ok(ClearPolicy::AtMostOnce),
                "at_least_once" | "at-least-once" => Ok(ClearPolicy::AtLeastOnce),
                _ => Err(self.invalid("clear_policy", "at_most_once or at_least_once")),
            },
        }
    }

    fn capacity(&self, keys: &[&str]) -> Result<usize, crate::Error> {
        let n = self.non_negative_f64(keys)?.unwrap_or(0.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(n as usize)
    }
}

/// Built-in handler classes under their short names and conventional aliases.
#[must_use]
pub fn builtin_handler_classes() -> HashMap<String, HandlerFactory> {
    let table: [(&[&str], HandlerFactory); 6] = [
        (&["stream", "logging.StreamHandler"], Arc::new(build_stream)),
        (&["file", "logging.FileHandler"], Arc::new(build_file)),
        (
            &[
                "timed_rotating_file",
                "logging.handlers.TimedRotatingFileHandler",
                "TimedRotatingFileHandlerWithHeader",
            ],
            Arc::new(build_timed_file),
        ),
        (&["smtp", "BufferingSMTPHandler"], Arc::new(build_smtp)),
        (&["database", "MongoLogHandler"], Arc::new(build_database)),
        (&["null", "logging.NullHandler"], Arc::new(build_null)),
    ];

    let mut classes = HashMap::new();
    for (names, factory) in table {
        for name in names {
            classes.insert((*name).to_string(), Arc::clone(&factory));
        }
    }
    classes
}

/// Built-in filter classes. Entries without a class use the name filter.
#[must_use]
pub fn builtin_filter_classes() -> HashMap<String, FilterFactory> {
    let table: [(&[&str], FilterFactory); 3] = [
        (&["name", "logging.Filter"], Arc::new(build_name_filter)),
        (&["reverse", "ReverseLogFilter"], Arc::new(build_reverse_filter)),
        (&["attribute", "AttributeFilter"], Arc::new(build_attribute_filter)),
    ];

    let mut classes = HashMap::new();
    for (names, factory) in table {
        for name in names {
            classes.insert((*name).to_string(), Arc::clone(&factory));
        }
    }
    classes
}

fn build_name_filter(a: &FactoryArgs<'_>) -> Result<Arc<dyn Filter>, crate::Error> {
    Ok(Arc::new(NameFilter::new(
        a.str(&["name"])?.unwrap_or_default(),
    )))
}

fn build_reverse_filter(a: &FactoryArgs<'_>) -> Result<Arc<dyn Filter>, crate::Error> {
    Ok(Arc::new(ReverseLevelFilter::new(a.level(&["level"])?)))
}

fn build_attribute_filter(a: &FactoryArgs<'_>) -> Result<Arc<dyn Filter>, crate::Error> {
    let attr = a.required_str(&["attr_name", "attr", "attribute"])?;
    Ok(Arc::new(AttributeFilter::new(attr)))
}

fn build_null(_: &FactoryArgs<'_>) -> Result<Handler, crate::Error> {
    Ok(Handler::new(NullSink))
}

fn build_stream(a: &FactoryArgs<'_>) -> Result<Handler, crate::Error> {
    let target = match a.str(&["stream"])? {
        Some(s) => StreamTarget::parse(s)?,
        None => StreamTarget::Stderr,
    };
    Ok(Handler::new(StreamSink::new(target)))
}

fn build_file(a: &FactoryArgs<'_>) -> Result<Handler, crate::Error> {
    file_handler(a, "")
}

fn build_timed_file(a: &FactoryArgs<'_>) -> Result<Handler, crate::Error> {
    file_handler(a, "H")
}

fn file_handler(a: &FactoryArgs<'_>, default_when: &str) -> Result<Handler, crate::Error> {
    let filename = a.required_str(&["filename"])?;
    let when = a.str(&["when"])?.unwrap_or(default_when);
    let interval = a.u64(&["interval"])?.unwrap_or(1);
    let interval = u32::try_from(interval).map_err(|_| a.invalid("interval", "a 32-bit integer"))?;
    let backups = a.u64(&["backup_count", "backupCount"])?.unwrap_or(0);

    let mut sink = TimedRotatingFileSink::new(filename)?
        .rotation(Rotation::parse(when, interval)?)
        .backup_count(usize::try_from(backups).unwrap_or(usize::MAX))
        .compress(a.bool(&["compress"])?.unwrap_or(false));
    if let Some(header) = a.str(&["header"])? {
        sink = sink.header(header);
    }
    Ok(Handler::new(sink))
}

fn email_defaults(a: &FactoryArgs<'_>) -> Result<EmailFields, crate::Error> {
    Ok(EmailFields {
        from_addr: a
            .str(&["fromAddr", "fromaddr", "from_addr"])?
            .unwrap_or_default()
            .to_string(),
        to_addrs: a
            .string_list(&["toAddrs", "toaddrs", "to_addrs"])?
            .unwrap_or_default(),
        cc_addrs: a
            .string_list(&["ccAddrs", "ccaddrs", "cc_addrs"])?
            .unwrap_or_default(),
        bcc_addrs: a
            .string_list(&["bccAddrs", "bccaddrs", "bcc_addrs"])?
            .unwrap_or_default(),
        subject: a.str(&["subject"])?.unwrap_or_default().to_string(),
        attachment: a.str(&["attachment"])?.map(ToString::to_string),
    })
}

fn mailhost(a: &FactoryArgs<'_>) -> Result<(String, u16), crate::Error> {
    let default_port = a
        .u64(&["port", "mailport"])?
        .map(|p| u16::try_from(p).map_err(|_| a.invalid("port", "a valid port")))
        .transpose()?
        .unwrap_or(25);

    match a.get(&["mailhost", "host"]) {
        Some(Value::Array(pair)) => match pair.as_slice() {
            [Value::String(host), Value::Number(port)] => {
                let port = port
                    .as_u64()
                    .and_then(|p| u16::try_from(p).ok())
                    .ok_or_else(|| a.invalid("mailhost", "[host, port]"))?;
                Ok((host.clone(), port))
            }
            _ => Err(a.invalid("mailhost", "[host, port]")),
        },
        Some(Value::String(host)) => match host.rsplit_once(':') {
            Some((h, p)) if p.parse::<u16>().is_ok() => {
                Ok((h.to_string(), p.parse().unwrap_or(default_port)))
            }
            _ => Ok((host.clone(), default_port)),
        },
        Some(_) => Err(a.invalid("mailhost", "a host string or [host, port]")),
        None => Ok(("localhost".to_string(), default_port)),
    }
}

fn build_smtp(a: &FactoryArgs<'_>) -> Result<Handler, crate::Error> {
    let (host, port) = mailhost(a)?;
    let mut settings = SmtpSettings::new(host, port)
        .defaults(email_defaults(a)?)
        .body_type(BodyType::parse(a.str(&["mime_type", "mimeType"])?.unwrap_or("text"))?);

    if let Some(g) = a.str(&["granularity"])? {
        settings = settings.granularity(SmtpGranularity::parse(g)?);
    }
    if let Some(t) = a.seconds(&["timeout"])? {
        settings = settings.timeout(t);
    }
    if let (Some(user), Some(pass)) = (a.str(&["username"])?, a.str(&["password"])?) {
        settings = settings.credentials(user, pass);
    }
    let starttls = a.bool(&["starttls", "secure"])?.unwrap_or(false);
    match (starttls, a.str(&["ca_file", "cafile"])?) {
        (_, Some(ca)) => {
            let mut tls = TlsSettings::new(ca);
            tls.server_name = a.str(&["server_name"])?.map(ToString::to_string);
            settings = settings.tls(tls);
        }
        (true, None) => return Err(a.invalid("ca_file", "set when starttls is enabled")),
        (false, None) => {}
    }

    let style = match a.str(&["template_style", "style"])? {
        Some(marker) => FormatStyle::from_marker(marker)
            .ok_or_else(|| a.invalid("template_style", "'%' or '{'"))?,
        None => FormatStyle::Percent,
    };
    let mut formatter = Formatter::with_style(
        a.str(&["body_template"])?.unwrap_or("%(message)s"),
        style,
    );
    if let Some(datefmt) = a.str(&["datefmt"])? {
        formatter = formatter.datefmt(datefmt);
    }

    let sink = BatchingSink::new(SmtpDeliver::new(settings))
        .capacity(a.capacity(&["capacity", "buffer_size"])?)
        .timeout(a.seconds(&["buffer_timeout"])?.unwrap_or_default())
        .clear_policy(a.clear_policy()?);

    Ok(Handler::new(sink)
        .formatter(formatter)
        .filter(AttributeFilter::new(EMAIL_ATTR)))
}

fn default_database_dir() -> String {
    directories::ProjectDirs::from("", "", "relaylog").map_or_else(
        || "db".to_string(),
        |dirs| dirs.data_dir().join("db").to_string_lossy().into_owned(),
    )
}

fn build_database(a: &FactoryArgs<'_>) -> Result<Handler, crate::Error> {
    let dir = a
        .str(&["directory", "dir"])?
        .map_or_else(default_database_dir, ToString::to_string);
    let database = a
        .str(&["database", "database_name"])?
        .unwrap_or("logs");
    let collection = JsonlCollection::open(&dir, database, a.str(&["collection"])?)?;

    let sink = BatchingSink::new(DatabaseDeliver::new(collection)?)
        .capacity(a.capacity(&["buffer_size", "capacity"])?)
        .timeout(a.seconds(&["buffer_timeout"])?.unwrap_or_default())
        .clear_policy(a.clear_policy()?);
    Ok(Handler::new(sink))
}
