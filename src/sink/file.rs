//! Time-rotated log files with an optional header line on fresh files.

use super::Sink;
use crate::fmt::Formatter;
use crate::internal;
use crate::record::LogRecord;
use chrono::{DateTime, Datelike, Days, Local, TimeDelta, Weekday};
use flate2::Compression;
use flate2::write::GzEncoder;
use regex::Regex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// When the active file is rolled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Never,
    Seconds(u32),
    Minutes(u32),
    Hours(u32),
    Days(u32),
    /// Every `n` local midnights.
    Midnight(u32),
    /// Local midnight starting the given weekday.
    Weekday(Weekday),
}

impl Rotation {
    /// Parses the conventional `when` codes: `S`, `M`, `H`, `D`, `MIDNIGHT`, `W0`..`W6` (Monday is `W0`).
    ///
    /// # Errors
    /// Unknown codes or a zero interval.
    pub fn parse(when: &str, interval: u32) -> Result<Self, crate::Error> {
        if interval == 0 {
            return Err(crate::Error::Config("rotation interval must be positive".into()));
        }
        let when = when.trim().to_uppercase();
        let rotation = match when.as_str() {
            "" | "NEVER" => Self::Never,
            "S" => Self::Seconds(interval),
            "M" => Self::Minutes(interval),
            "H" => Self::Hours(interval),
            "D" => Self::Days(interval),
            "MIDNIGHT" => Self::Midnight(interval),
            w if w.len() == 2 && w.starts_with('W') => {
                let day = match &w[1..] {
                    "0" => Weekday::Mon,
                    "1" => Weekday::Tue,
                    "2" => Weekday::Wed,
                    "3" => Weekday::Thu,
                    "4" => Weekday::Fri,
                    "5" => Weekday::Sat,
                    "6" => Weekday::Sun,
                    _ => return Err(crate::Error::Config(format!("invalid rollover day: {w}"))),
                };
                Self::Weekday(day)
            }
            other => return Err(crate::Error::Config(format!("invalid rollover interval: {other}"))),
        };
        Ok(rotation)
    }

    /// strftime pattern appended to rotated file names.
    const fn suffix_format(self) -> &'static str {
        match self {
            Self::Seconds(_) | Self::Never => "%Y-%m-%d_%H-%M-%S",
            Self::Minutes(_) => "%Y-%m-%d_%H-%M",
            Self::Hours(_) => "%Y-%m-%d_%H",
            Self::Days(_) | Self::Midnight(_) | Self::Weekday(_) => "%Y-%m-%d",
        }
    }

    const fn suffix_pattern(self) -> &'static str {
        match self {
            Self::Seconds(_) | Self::Never => r"^\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2}(\.gz)?$",
            Self::Minutes(_) => r"^\d{4}-\d{2}-\d{2}_\d{2}-\d{2}(\.gz)?$",
            Self::Hours(_) => r"^\d{4}-\d{2}-\d{2}_\d{2}(\.gz)?$",
            Self::Days(_) | Self::Midnight(_) | Self::Weekday(_) => r"^\d{4}-\d{2}-\d{2}(\.gz)?$",
        }
    }

    /// Next rollover instant after `from`, or `None` when rotation is disabled.
    #[must_use]
    pub fn next_after(self, from: DateTime<Local>) -> Option<DateTime<Local>> {
        match self {
            Self::Never => None,
            Self::Seconds(n) => Some(from + TimeDelta::seconds(i64::from(n))),
            Self::Minutes(n) => Some(from + TimeDelta::minutes(i64::from(n))),
            Self::Hours(n) => Some(from + TimeDelta::hours(i64::from(n))),
            Self::Days(n) => Some(from + TimeDelta::days(i64::from(n))),
            Self::Midnight(n) => local_midnight(from, u64::from(n)),
            Self::Weekday(day) => {
                let today = from.weekday().num_days_from_monday();
                let target = day.num_days_from_monday();
                let ahead = match (target + 7 - today) % 7 {
                    0 => 7,
                    n => n,
                };
                local_midnight(from, u64::from(ahead))
            }
        }
    }
}

fn local_midnight(from: DateTime<Local>, days_ahead: u64) -> Option<DateTime<Local>> {
    from.date_naive()
        .checked_add_days(Days::new(days_ahead))?
        .and_hms_opt(0, 0, 0)?
        .and_local_timezone(Local)
        .earliest()
}

struct FileState {
    file: Option<File>,
    period_start: DateTime<Local>,
    rollover_at: Option<DateTime<Local>>,
}

/// Appends formatted records to a file, rotating it on a schedule.
///
/// A header, when configured, is written whenever the file is opened at
/// offset 0: on creation and after each rollover, never into a non-empty file.
pub struct TimedRotatingFileSink {
    path: PathBuf,
    header: Option<String>,
    rotation: Rotation,
    backup_count: usize,
    compress: bool,
    state: Mutex<FileState>,
}

impl TimedRotatingFileSink {
    /// Config values use `~` for portability; it is expanded here. Missing parent
    /// directories are created.
    ///
    /// # Errors
    /// Directory creation failures.
    pub fn new(path: &str) -> Result<Self, crate::Error> {
        let expanded = shellexpand::tilde(path);
        let path = PathBuf::from(expanded.as_ref());
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
            internal::debug("FILE", &format!("Created directory: {}", parent.display()));
        }

        let period_start = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_or_else(|_| Local::now(), DateTime::<Local>::from);

        Ok(Self {
            path,
            header: None,
            rotation: Rotation::Never,
            backup_count: 0,
            compress: false,
            state: Mutex::new(FileState {
                file: None,
                period_start,
                rollover_at: None,
            }),
        })
    }

    #[must_use]
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    #[must_use]
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.rollover_at = rotation.next_after(state.period_start);
        self
    }

    /// Rotated files kept; 0 keeps all of them.
    #[must_use]
    pub const fn backup_count(mut self, count: usize) -> Self {
        self.backup_count = count;
        self
    }

    /// Gzip rotated files.
    #[must_use]
    pub const fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> io::Result<File> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if let Some(header) = &self.header
            && file.metadata()?.len() == 0
        {
            writeln!(file, "{header}")?;
        }
        Ok(file)
    }

    fn rollover(&self, state: &mut FileState, now: DateTime<Local>) -> Result<(), crate::Error> {
        state.file = None;

        if self.path.exists() {
            let suffix = state.period_start.format(self.rotation.suffix_format());
            let rotated = PathBuf::from(format!("{}.{suffix}", self.path.display()));
            if rotated.exists() {
                fs::remove_file(&rotated)?;
            }
            fs::rename(&self.path, &rotated)?;
            internal::debug("FILE", &format!("Rotated to {}", rotated.display()));
            if self.compress {
                compress_file(&rotated)?;
            }
        }
        if self.backup_count > 0 {
            self.prune_backups()?;
        }

        state.period_start = now;
        let mut next = self.rotation.next_after(now);
        // a long-idle file may be several intervals behind
        while let Some(at) = next
            && at <= now
        {
            next = self.rotation.next_after(at);
        }
        state.rollover_at = next;
        Ok(())
    }

    fn prune_backups(&self) -> Result<(), crate::Error> {
        let (Some(dir), Some(base)) = (self.path.parent(), self.path.file_name()) else {
            return Ok(());
        };
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        let prefix = format!("{}.", base.to_string_lossy());
        let pattern = Regex::new(self.rotation.suffix_pattern())
            .map_err(|e| crate::Error::Config(e.to_string()))?;

        let mut backups: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_prefix(&prefix))
                    .is_some_and(|suffix| pattern.is_match(suffix))
            })
            .map(|entry| entry.path())
            .collect();
        backups.sort();

        let excess = backups.len().saturating_sub(self.backup_count);
        for old in backups.into_iter().take(excess) {
            internal::debug("FILE", &format!("Removing old backup {}", old.display()));
            fs::remove_file(old)?;
        }
        Ok(())
    }
}

impl Sink for TimedRotatingFileSink {
    fn emit(&self, record: &LogRecord, formatter: &Formatter) -> Result<(), crate::Error> {
        let line = formatter.format(record);
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let now = Local::now();
        if state.rollover_at.is_some_and(|at| now >= at) {
            self.rollover(&mut state, now)?;
        }
        if state.file.is_none() {
            state.file = Some(self.open()?);
        }
        if let Some(file) = state.file.as_mut() {
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), crate::Error> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(file) = state.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    fn close(&self) -> Result<(), crate::Error> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(mut file) = state.file.take() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Replaces `path` with `path.gz`.
fn compress_file(path: &Path) -> Result<(), crate::Error> {
    let mut reader = BufReader::new(File::open(path)?);
    let gz_path = format!("{}.gz", path.display());
    let writer = BufWriter::new(File::create(&gz_path)?);
    let mut encoder = GzEncoder::new(writer, Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?.flush()?;
    fs::remove_file(path)?;
    Ok(())
}
