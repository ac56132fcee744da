//! Cross-process stop signal backed by a marker file.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const POLL: Duration = Duration::from_millis(50);

/// Set when the marker file exists. Any process that knows the path can set,
/// clear or observe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopEvent {
    path: PathBuf,
}

impl StopEvent {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Errors
    /// The marker cannot be created.
    pub fn set(&self) -> Result<(), crate::Error> {
        File::create(&self.path)?;
        Ok(())
    }

    /// # Errors
    /// The marker exists but cannot be removed.
    pub fn clear(&self) -> Result<(), crate::Error> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.path.exists()
    }

    /// Waits until the event is set or `timeout` passes; `None` waits forever.
    /// Returns whether the event is set.
    #[must_use]
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if self.is_set() {
                return true;
            }
            let pause = match deadline {
                Some(d) => {
                    let left = d.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return false;
                    }
                    left.min(POLL)
                }
                None => POLL,
            };
            thread::sleep(pause);
        }
    }
}
