//! Severity levels that gate which records reach which handlers.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Numeric values follow the conventional logging scale so dict-config
/// payloads may carry either names or numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Level {
    /// High-volume instrumentation, below `Debug`.
    Trace = 5,
    Debug = 10,
    #[default]
    Info = 20,
    /// Non-fatal anomalies that may need attention.
    Warn = 30,
    Error = 40,
    /// Failures that likely take the program down with them.
    Critical = 50,
}

impl Level {
    /// Lowercase because config files and CLI args use lowercase level strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// The `levelname` rendered by formatters and written on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Maps a numeric level to the closest named level at or below it.
    ///
    /// Returns `None` for 0 (`NOTSET`).
    #[must_use]
    pub const fn from_number(n: u64) -> Option<Self> {
        match n {
            0 => None,
            1..=9 => Some(Self::Trace),
            10..=19 => Some(Self::Debug),
            20..=29 => Some(Self::Info),
            30..=39 => Some(Self::Warn),
            40..=49 => Some(Self::Error),
            _ => Some(Self::Critical),
        }
    }

    /// Parses a level that may be `NOTSET`, which means "inherit".
    ///
    /// # Errors
    /// Returns `ParseLevelError` for unknown names.
    pub fn parse_optional(s: &str) -> Result<Option<Self>, ParseLevelError> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("notset") {
            return Ok(None);
        }
        if let Ok(n) = trimmed.parse::<u64>() {
            return Ok(Self::from_number(n));
        }
        trimmed.parse().map(Some)
    }

    /// Convenience for iteration in help output and tests.
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [
            Self::Trace,
            Self::Debug,
            Self::Info,
            Self::Warn,
            Self::Error,
            Self::Critical,
        ]
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by `FromStr` so callers can distinguish "unknown level" from other parse failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown log level: '{}'", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl From<ParseLevelError> for crate::Error {
    fn from(e: ParseLevelError) -> Self {
        Self::InvalidLevel(e.0)
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" | "err" => Ok(Self::Error),
            "critical" | "fatal" => Ok(Self::Critical),
            other => other
                .parse::<u64>()
                .ok()
                .and_then(Self::from_number)
                .ok_or_else(|| ParseLevelError(s.to_string())),
        }
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

struct LevelVisitor;

impl Visitor<'_> for LevelVisitor {
    type Value = Level;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a level name or a positive level number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Level, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Level, E> {
        Level::from_number(v).ok_or_else(|| E::custom("NOTSET is not a record level"))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Level, E> {
        u64::try_from(v)
            .map_err(|_| E::custom("negative level"))
            .and_then(|n| self.visit_u64(n))
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LevelVisitor)
    }
}

/// Deserializes an optional level that may also be `null`, `"NOTSET"` or `0`.
///
/// # Errors
/// Fails on unknown level names or values that are neither strings nor numbers.
pub fn deserialize_optional<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Level>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Name(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Level::from_number(n)),
        Some(Raw::Name(s)) => Level::parse_optional(&s).map_err(de::Error::custom),
    }
}
