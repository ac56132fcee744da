//! Buffered delivery: records accumulate until a size and a time threshold are
//! both crossed, or until an explicit flush, and are then handed to a
//! `Deliver` implementation as one batch.

use super::Sink;
use crate::error::DeliveryError;
use crate::fmt::Formatter;
use crate::internal;
use crate::record::LogRecord;
use std::borrow::Cow;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A buffered record and its rendering through the handler's formatter.
#[derive(Debug, Clone)]
pub struct BufferedRecord {
    pub record: LogRecord,
    pub formatted: String,
}

/// What happens to the buffer when a delivery fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearPolicy {
    /// The whole batch is discarded after the failure is reported.
    #[default]
    AtMostOnce,
    /// Only the records reported as delivered are removed; the rest are retried
    /// on the next flush.
    AtLeastOnce,
}

/// The backend half of a batching sink: how a batch reaches its destination.
pub trait Deliver: Send + Sync {
    /// Adjusts a record before it is formatted and buffered.
    fn prepare<'a>(&self, record: &'a LogRecord) -> Cow<'a, LogRecord> {
        Cow::Borrowed(record)
    }

    /// Delivers a non-empty batch in order.
    ///
    /// # Errors
    /// `DeliveryError::delivered` counts the leading records that did arrive.
    fn deliver(&self, batch: &[BufferedRecord]) -> Result<(), DeliveryError>;

    /// Releases connections; called once when the sink closes.
    ///
    /// # Errors
    /// Backend-specific.
    fn close(&self) -> Result<(), crate::Error> {
        Ok(())
    }
}

struct Buffer {
    records: Vec<BufferedRecord>,
    last_flush: Instant,
}

/// Generic buffering front end for any `Deliver` backend.
pub struct BatchingSink<D: Deliver> {
    deliver: D,
    capacity: usize,
    timeout: Duration,
    policy: ClearPolicy,
    buffer: Mutex<Buffer>,
}

impl<D: Deliver> BatchingSink<D> {
    /// Zero capacity and zero timeout: every emit flushes.
    #[must_use]
    pub fn new(deliver: D) -> Self {
        Self {
            deliver,
            capacity: 0,
            timeout: Duration::ZERO,
            policy: ClearPolicy::default(),
            buffer: Mutex::new(Buffer {
                records: Vec::new(),
                last_flush: Instant::now(),
            }),
        }
    }

    /// An emit flushes implicitly once the buffer holds *more* than `capacity` records.
    #[must_use]
    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Minimum time since the previous flush before an implicit flush may happen.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn clear_policy(mut self, policy: ClearPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn deliverer(&self) -> &D {
        &self.deliver
    }

    /// Records currently waiting for delivery.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Buffer> {
        self.buffer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn flush_locked(&self, buffer: &mut Buffer) -> Result<(), crate::Error> {
        if buffer.records.is_empty() {
            return Ok(());
        }
        buffer.last_flush = Instant::now();

        match self.deliver.deliver(&buffer.records) {
            Ok(()) => {
                buffer.records.clear();
                Ok(())
            }
            Err(DeliveryError { delivered, source }) => {
                let delivered = delivered.min(buffer.records.len());
                match self.policy {
                    ClearPolicy::AtMostOnce => {
                        let lost = buffer.records.len() - delivered;
                        if lost > 0 {
                            internal::warn(
                                "BATCH",
                                &format!("Discarding {lost} undelivered record(s) after failed flush"),
                            );
                        }
                        buffer.records.clear();
                    }
                    ClearPolicy::AtLeastOnce => {
                        buffer.records.drain(..delivered);
                        internal::debug(
                            "BATCH",
                            &format!("Retaining {} record(s) for retry", buffer.records.len()),
                        );
                    }
                }
                Err(source)
            }
        }
    }
}

impl<D: Deliver> Sink for BatchingSink<D> {
    fn emit(&self, record: &LogRecord, formatter: &Formatter) -> Result<(), crate::Error> {
        let prepared = self.deliver.prepare(record);
        let formatted = formatter.format(&prepared);

        let mut buffer = self.lock();
        buffer.records.push(BufferedRecord {
            record: prepared.into_owned(),
            formatted,
        });

        if buffer.records.len() > self.capacity && buffer.last_flush.elapsed() >= self.timeout {
            return self.flush_locked(&mut buffer);
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), crate::Error> {
        let mut buffer = self.lock();
        self.flush_locked(&mut buffer)
    }

    fn close(&self) -> Result<(), crate::Error> {
        let flushed = self.flush();
        self.deliver.close()?;
        flushed
    }
}
