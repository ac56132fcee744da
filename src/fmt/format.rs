//! Handlers need different line layouts: a file wants timestamps and source
//! locations, an email body only the message. Templates use the conventional
//! `%(field)s` syntax (or `{field}` with the brace style) and are parsed once
//! into segments.

use crate::record::LogRecord;
use chrono::Local;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Default `datefmt` for `%(asctime)s`.
pub const DEFAULT_DATEFMT: &str = "%Y-%m-%d %H:%M:%S,%3f";

static PERCENT_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"%%|%\((?P<key>[^)]+)\)(?P<flags>[-#0 +]*)(?P<width>\d*)(?:\.(?P<prec>\d+))?[sdrfi]",
    )
    .unwrap_or_else(|_| unreachable!("static pattern"))
});

static BRACE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\{\{|\}\}|\{(?P<key>[A-Za-z_][A-Za-z0-9_]*)(?::(?P<align>[<>^])?(?P<width>\d+)?(?:\.(?P<prec>\d+))?)?\}",
    )
    .unwrap_or_else(|_| unreachable!("static pattern"))
});

/// Which placeholder syntax a template uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatStyle {
    /// `%(name)s`
    #[default]
    Percent,
    /// `{name}`
    Brace,
}

impl FormatStyle {
    /// Accepts the single-character style markers used by dict-config payloads.
    #[must_use]
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "%" => Some(Self::Percent),
            "{" => Some(Self::Brace),
            _ => None,
        }
    }
}

/// Record attributes a template can reference; anything else is looked up in `extra`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    Name,
    LevelName,
    LevelNo,
    Message,
    AscTime,
    Created,
    Msecs,
    PathName,
    FileName,
    Module,
    LineNo,
    FuncName,
    Thread,
    ThreadName,
    Process,
    ExcText,
    Extra(String),
}

impl Placeholder {
    fn from_key(key: &str) -> Self {
        match key {
            "name" => Self::Name,
            "levelname" => Self::LevelName,
            "levelno" => Self::LevelNo,
            "message" | "msg" => Self::Message,
            "asctime" => Self::AscTime,
            "created" => Self::Created,
            "msecs" => Self::Msecs,
            "pathname" => Self::PathName,
            "filename" => Self::FileName,
            "module" => Self::Module,
            "lineno" => Self::LineNo,
            "funcName" | "funcname" => Self::FuncName,
            "thread" => Self::Thread,
            "threadName" => Self::ThreadName,
            "process" => Self::Process,
            "exc_text" => Self::ExcText,
            other => Self::Extra(other.to_string()),
        }
    }
}

/// Padding applied to a rendered field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    Left,
    #[default]
    Right,
    Center,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldSpec {
    pub width: usize,
    pub align: Align,
    pub precision: Option<usize>,
}

impl FieldSpec {
    fn apply(&self, value: String) -> String {
        let value = match self.precision {
            Some(prec) => match value.parse::<f64>() {
                Ok(n) => format!("{n:.prec$}"),
                Err(_) => value.chars().take(prec).collect(),
            },
            None => value,
        };
        let width = self.width;
        match self.align {
            Align::Left => format!("{value:<width$}"),
            Align::Right => format!("{value:>width$}"),
            Align::Center => format!("{value:^width$}"),
        }
    }
}

/// Parsing into segments once avoids re-scanning the template on every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatSegment {
    Literal(String),
    Field(Placeholder, FieldSpec),
}

/// Pre-parsed template.
#[derive(Debug, Clone)]
pub struct FormatTemplate {
    segments: Vec<FormatSegment>,
    uses_asctime: bool,
}

impl FormatTemplate {
    /// Parses a template in the given style. Unrecognised `%` sequences stay literal.
    #[must_use]
    pub fn parse(template: &str, style: FormatStyle) -> Self {
        let regex = match style {
            FormatStyle::Percent => &*PERCENT_FIELD,
            FormatStyle::Brace => &*BRACE_FIELD,
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for caps in regex.captures_iter(template) {
            let Some(whole) = caps.get(0) else { continue };
            literal.push_str(&template[last..whole.start()]);
            last = whole.end();

            let Some(key) = caps.name("key") else {
                // `%%`, `{{` and `}}` escapes
                literal.push_str(&whole.as_str()[..1]);
                continue;
            };

            if !literal.is_empty() {
                segments.push(FormatSegment::Literal(std::mem::take(&mut literal)));
            }

            let width = caps
                .name("width")
                .and_then(|w| w.as_str().parse().ok())
                .unwrap_or(0);
            let precision = caps.name("prec").and_then(|p| p.as_str().parse().ok());
            let align = match style {
                FormatStyle::Percent => {
                    if caps.name("flags").is_some_and(|f| f.as_str().contains('-')) {
                        Align::Left
                    } else {
                        Align::Right
                    }
                }
                FormatStyle::Brace => match caps.name("align").map(|a| a.as_str()) {
                    Some(">") => Align::Right,
                    Some("^") => Align::Center,
                    _ => Align::Left,
                },
            };

            segments.push(FormatSegment::Field(
                Placeholder::from_key(key.as_str()),
                FieldSpec {
                    width,
                    align,
                    precision,
                },
            ));
        }

        literal.push_str(&template[last..]);
        if !literal.is_empty() {
            segments.push(FormatSegment::Literal(literal));
        }

        let uses_asctime = segments
            .iter()
            .any(|s| matches!(s, FormatSegment::Field(Placeholder::AscTime, _)));

        Self {
            segments,
            uses_asctime,
        }
    }

    #[must_use]
    pub fn segments(&self) -> &[FormatSegment] {
        &self.segments
    }

    #[must_use]
    pub const fn uses_asctime(&self) -> bool {
        self.uses_asctime
    }
}

/// Renders records through a template and a date format.
#[derive(Debug, Clone)]
pub struct Formatter {
    template: FormatTemplate,
    datefmt: String,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new("%(message)s")
    }
}

impl Formatter {
    /// A `%`-style formatter.
    #[must_use]
    pub fn new(format: &str) -> Self {
        Self::with_style(format, FormatStyle::Percent)
    }

    #[must_use]
    pub fn with_style(format: &str, style: FormatStyle) -> Self {
        Self {
            template: FormatTemplate::parse(format, style),
            datefmt: DEFAULT_DATEFMT.to_string(),
        }
    }

    /// Sets the strftime pattern used for `%(asctime)s`.
    #[must_use]
    pub fn datefmt(mut self, datefmt: impl Into<String>) -> Self {
        self.datefmt = datefmt.into();
        self
    }

    #[must_use]
    pub const fn template(&self) -> &FormatTemplate {
        &self.template
    }

    /// Creation time in local time, rendered with `datefmt`.
    #[must_use]
    pub fn format_time(&self, record: &LogRecord) -> String {
        record
            .created
            .with_timezone(&Local)
            .format(&self.datefmt)
            .to_string()
    }

    /// Renders one record. `exc_text`, when present and not already referenced, follows on its own line.
    #[must_use]
    pub fn format(&self, record: &LogRecord) -> String {
        let asctime = self
            .template
            .uses_asctime()
            .then(|| self.format_time(record));

        let mut out = String::new();
        let mut wrote_exc = false;
        for segment in &self.template.segments {
            match segment {
                FormatSegment::Literal(s) => out.push_str(s),
                FormatSegment::Field(placeholder, spec) => {
                    if matches!(placeholder, Placeholder::ExcText) {
                        wrote_exc = true;
                    }
                    let value = field_value(placeholder, record, asctime.as_deref());
                    out.push_str(&spec.apply(value));
                }
            }
        }

        if !wrote_exc && let Some(exc) = &record.exc_text {
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(exc);
        }
        out
    }
}

fn field_value(placeholder: &Placeholder, record: &LogRecord, asctime: Option<&str>) -> String {
    let location = record.location.as_ref();
    match placeholder {
        Placeholder::Name => record.name.clone(),
        Placeholder::LevelName => record.level.name().to_string(),
        Placeholder::LevelNo => record.level.as_u8().to_string(),
        Placeholder::Message => record.msg.clone(),
        Placeholder::AscTime => asctime.unwrap_or_default().to_string(),
        Placeholder::Created => {
            let micros = record.created.timestamp_micros();
            #[allow(clippy::cast_precision_loss)]
            let secs = micros as f64 / 1_000_000.0;
            secs.to_string()
        }
        Placeholder::Msecs => record.created.timestamp_subsec_millis().to_string(),
        Placeholder::PathName => location.map(|l| l.pathname.clone()).unwrap_or_default(),
        Placeholder::FileName => location
            .map(|l| l.filename().to_string())
            .unwrap_or_default(),
        Placeholder::Module => location
            .and_then(|l| l.module.clone())
            .unwrap_or_else(|| record.name.clone()),
        Placeholder::LineNo => location.map_or(0, |l| l.lineno).to_string(),
        Placeholder::FuncName => record
            .attr("funcName")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Placeholder::Thread => record.thread.clone(),
        Placeholder::ThreadName => record.thread_name.clone().unwrap_or_default(),
        Placeholder::Process => record.process.to_string(),
        Placeholder::ExcText => record.exc_text.clone().unwrap_or_default(),
        Placeholder::Extra(key) => match record.attr(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        },
    }
}
