//! Producer-side handler: ships records to the listener through the shared queue.

use super::Sink;
use crate::envelope::Envelope;
use crate::fmt::Formatter;
use crate::queue::SharedQueue;
use crate::record::LogRecord;
use std::sync::Arc;

/// Puts each record on the queue as an `Envelope`.
///
/// The record's `msg` is replaced by the formatter's rendering and `exc_text`
/// is folded into it, so the listener receives plain data that needs no
/// producer-side state to render.
#[derive(Debug, Clone)]
pub struct QueueSink {
    queue: Arc<SharedQueue<Envelope>>,
}

impl QueueSink {
    #[must_use]
    pub const fn new(queue: Arc<SharedQueue<Envelope>>) -> Self {
        Self { queue }
    }

    #[must_use]
    pub const fn queue(&self) -> &Arc<SharedQueue<Envelope>> {
        &self.queue
    }

    /// Renders a record into the form that travels on the queue.
    #[must_use]
    pub fn prepare(record: &LogRecord, formatter: &Formatter) -> LogRecord {
        let mut prepared = record.clone();
        prepared.msg = formatter.format(record);
        prepared.exc_text = None;
        prepared
    }
}

impl Sink for QueueSink {
    fn emit(&self, record: &LogRecord, formatter: &Formatter) -> Result<(), crate::Error> {
        self.queue
            .put(&Envelope::record(Self::prepare(record, formatter)))
    }
}
