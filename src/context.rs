//! The explicit handle every component is built from: where the shared queue
//! and stop event live, and open endpoints to them.

use crate::config::Config;
use crate::envelope::Envelope;
use crate::internal;
use crate::producer::Producer;
use crate::queue::SharedQueue;
use crate::sink::QueueSink;
use crate::stop::StopEvent;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const QUEUE_FILE: &str = "queue.sock";
const STOP_FILE: &str = "stop";

/// Runtime directory used when the config does not name one.
#[must_use]
pub fn default_runtime_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "relaylog").map_or_else(
        || std::env::temp_dir().join("relaylog"),
        |dirs| {
            dirs.runtime_dir().map_or_else(
                || {
                    dirs.state_dir()
                        .unwrap_or_else(|| dirs.data_local_dir())
                        .join("run")
                },
                Path::to_path_buf,
            )
        },
    )
}

/// Cheap to clone; clones share the same queue endpoint.
#[derive(Debug, Clone)]
pub struct LogContext {
    dir: PathBuf,
    queue: Arc<SharedQueue<Envelope>>,
    stop: StopEvent,
}

impl LogContext {
    /// Creates the queue and stop event as their owner (the listener side).
    /// A stale socket or stop marker from an earlier run is replaced.
    ///
    /// # Errors
    /// The directory cannot be created or the socket cannot be bound.
    pub fn init(dir: impl Into<PathBuf>) -> Result<Self, crate::Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let queue = SharedQueue::bind(dir.join(QUEUE_FILE))?;
        let stop = StopEvent::new(dir.join(STOP_FILE));
        stop.clear()?;
        internal::debug("CONTEXT", &format!("Initialized {}", dir.display()));
        Ok(Self {
            dir,
            queue: Arc::new(queue),
            stop,
        })
    }

    /// Connects to a context created by `init`, possibly in another process.
    ///
    /// # Errors
    /// No queue has been bound in `dir`.
    pub fn attach(dir: impl Into<PathBuf>) -> Result<Self, crate::Error> {
        let dir = dir.into();
        let queue = SharedQueue::connect(dir.join(QUEUE_FILE))?;
        let stop = StopEvent::new(dir.join(STOP_FILE));
        Ok(Self {
            dir,
            queue: Arc::new(queue),
            stop,
        })
    }

    /// `init` in the configured runtime directory with the configured queue limits.
    ///
    /// # Errors
    /// As for `init`, or an invalid overflow policy.
    pub fn init_with_config(config: &Config) -> Result<Self, crate::Error> {
        let dir = config.runtime_dir();
        fs::create_dir_all(&dir)?;
        let queue = SharedQueue::bind(dir.join(QUEUE_FILE))?;
        let stop = StopEvent::new(dir.join(STOP_FILE));
        stop.clear()?;
        Self::configured(dir, queue, stop, config)
    }

    /// `attach` to the configured runtime directory with the configured queue limits.
    ///
    /// # Errors
    /// As for `attach`, or an invalid overflow policy.
    pub fn attach_with_config(config: &Config) -> Result<Self, crate::Error> {
        let dir = config.runtime_dir();
        let queue = SharedQueue::connect(dir.join(QUEUE_FILE))?;
        let stop = StopEvent::new(dir.join(STOP_FILE));
        Self::configured(dir, queue, stop, config)
    }

    fn configured(
        dir: PathBuf,
        queue: SharedQueue<Envelope>,
        stop: StopEvent,
        config: &Config,
    ) -> Result<Self, crate::Error> {
        let queue = queue
            .with_overflow(config.overflow_policy()?)
            .with_max_message_bytes(config.queue.max_envelope_bytes);
        Ok(Self {
            dir,
            queue: Arc::new(queue),
            stop,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub const fn queue(&self) -> &Arc<SharedQueue<Envelope>> {
        &self.queue
    }

    #[must_use]
    pub const fn stop_event(&self) -> &StopEvent {
        &self.stop
    }

    /// Whether this handle owns the receiving end.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.queue.is_consumer()
    }

    #[must_use]
    pub fn queue_sink(&self) -> QueueSink {
        QueueSink::new(Arc::clone(&self.queue))
    }

    #[must_use]
    pub fn producer(&self, name: impl Into<String>) -> Producer {
        Producer::new(name, self)
    }

    /// Validates and enqueues one envelope.
    ///
    /// # Errors
    /// Empty envelope, or whatever `SharedQueue::put` rejects.
    pub fn send(&self, envelope: &Envelope) -> Result<(), crate::Error> {
        envelope.validate()?;
        self.queue.put(envelope)
    }

    /// Sets the stop event and wakes a listener blocked on the queue.
    ///
    /// # Errors
    /// The stop marker cannot be written.
    pub fn request_stop(&self) -> Result<(), crate::Error> {
        self.stop.set()?;
        if let Err(e) = self.queue.wake() {
            internal::debug("CONTEXT", &format!("Wake-up not delivered: {e}"));
        }
        Ok(())
    }
}
