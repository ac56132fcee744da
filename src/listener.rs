//! The dispatch loop: one consumer pulling messages off the shared queue and
//! fanning each out to its own short-lived worker thread.

use crate::context::LogContext;
use crate::envelope::Envelope;
use crate::internal;
use crate::queue::SharedQueue;
use crate::registry::Registry;
use crate::stop::StopEvent;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Callback run once per dequeued message, on a worker thread.
pub trait MessageHandler<M>: Send + Sync + 'static {
    /// # Errors
    /// Whatever went wrong handling the message; the listener reports it.
    fn handle(&self, message: M) -> Result<(), crate::Error>;

    /// Runs once when a started listener shuts down gracefully.
    fn shutdown(&self) {}
}

impl<M, F> MessageHandler<M> for F
where
    F: Fn(M) -> Result<(), crate::Error> + Send + Sync + 'static,
{
    fn handle(&self, message: M) -> Result<(), crate::Error> {
        self(message)
    }
}

/// The envelope callback: applies `config`, then routes `record`.
#[derive(Debug, Default)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MessageHandler<Envelope> for Dispatcher {
    /// A config that fails to apply drops the record travelling with it.
    fn handle(&self, envelope: Envelope) -> Result<(), crate::Error> {
        envelope.validate()?;
        if let Some(directive) = &envelope.config {
            self.registry.apply_directive(directive)?;
        }
        if let Some(record) = &envelope.record {
            self.registry.handle(record)?;
        }
        Ok(())
    }

    fn shutdown(&self) {
        self.registry.flush_all();
    }
}

pub struct QueueListener<M> {
    queue: Arc<SharedQueue<M>>,
    stop: StopEvent,
    handler: Arc<dyn MessageHandler<M>>,
    raise_on_exc: bool,
    poll_interval: Duration,
}

impl<M> Clone for QueueListener<M> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            stop: self.stop.clone(),
            handler: Arc::clone(&self.handler),
            raise_on_exc: self.raise_on_exc,
            poll_interval: self.poll_interval,
        }
    }
}

impl<M> std::fmt::Debug for QueueListener<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueListener")
            .field("queue", &self.queue)
            .field("stop", &self.stop)
            .field("raise_on_exc", &self.raise_on_exc)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl<M> QueueListener<M> {
    #[must_use]
    pub const fn stop_event(&self) -> &StopEvent {
        &self.stop
    }

    #[must_use]
    pub const fn queue(&self) -> &Arc<SharedQueue<M>> {
        &self.queue
    }

    #[must_use]
    pub const fn raises(&self) -> bool {
        self.raise_on_exc
    }

    pub(crate) const fn set_raise_on_exc(&mut self, raise: bool) {
        self.raise_on_exc = raise;
    }

    pub(crate) const fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }
}

impl QueueListener<Envelope> {
    /// A listener on the context's queue that dispatches into `registry`.
    #[must_use]
    pub fn for_context(context: &LogContext, registry: Arc<Registry>) -> Self {
        Self::new(
            Arc::clone(context.queue()),
            context.stop_event().clone(),
            Dispatcher::new(registry),
        )
    }
}

impl<M> QueueListener<M>
where
    M: serde::Serialize + serde::de::DeserializeOwned + Send + 'static,
{
    #[must_use]
    pub fn new(
        queue: Arc<SharedQueue<M>>,
        stop: StopEvent,
        handler: impl MessageHandler<M>,
    ) -> Self {
        Self {
            queue,
            stop,
            handler: Arc::new(handler),
            raise_on_exc: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Handler errors terminate their worker thread with a panic instead of
    /// only being reported.
    #[must_use]
    pub const fn raise_on_exc(mut self, raise: bool) -> Self {
        self.set_raise_on_exc(raise);
        self
    }

    /// How often `start` checks the stop event.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.set_poll_interval(interval);
        self
    }

    /// Blocking dequeue loop. Returns once the stop event is observed; an
    /// iteration already waiting on the queue needs a wake-up to notice it.
    pub fn listen(&self) {
        internal::debug("LISTENER", "Dispatch loop running");
        while !self.stop.is_set() {
            match self.queue.get() {
                Ok(Some(message)) => self.dispatch(message),
                Ok(None) => internal::trace("LISTENER", "Woken up"),
                Err(crate::Error::Json(e)) => {
                    internal::error("LISTENER", &format!("Discarded undecodable message: {e}"));
                }
                Err(e) => {
                    internal::error("LISTENER", &format!("Receive failed: {e}"));
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        internal::debug("LISTENER", "Dispatch loop stopped");
    }

    fn dispatch(&self, message: M) {
        let handler = Arc::clone(&self.handler);
        let raise = self.raise_on_exc;
        let spawned = thread::Builder::new()
            .name("relaylog-worker".into())
            .spawn(move || run_handler(handler.as_ref(), message, raise));
        if let Err(e) = spawned {
            internal::error("LISTENER", &format!("Cannot spawn worker: {e}"));
        }
    }

    /// Runs the dispatch loop on a background thread and coordinates shutdown
    /// from the calling thread: polls the stop event every `poll_interval`,
    /// then runs the handler's shutdown hook and flushes stdio.
    pub fn start(&self) {
        let listener = self.clone();
        let worker = thread::Builder::new()
            .name("relaylog-listen".into())
            .spawn(move || listener.listen());
        if let Err(e) = &worker {
            internal::error("LISTENER", &format!("Cannot spawn dispatch loop: {e}"));
        }

        while !self.stop.wait(Some(self.poll_interval)) {}
        internal::info("LISTENER", "Stop event set, shutting down");

        if let Err(e) = self.queue.wake() {
            internal::debug("LISTENER", &format!("Wake-up not delivered: {e}"));
        }
        if let Ok(worker) = worker {
            let _ = worker.join();
        }
        self.handler.shutdown();
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
    }

    /// Runs `start` on a background thread of this process.
    ///
    /// # Errors
    /// The thread cannot be spawned.
    pub fn spawn(self) -> Result<ListenerHandle, crate::Error> {
        let stop = self.stop.clone();
        let thread = thread::Builder::new()
            .name("relaylog-listener".into())
            .spawn(move || self.start())?;
        Ok(ListenerHandle {
            stop,
            thread: Some(thread),
        })
    }
}

fn run_handler<M: 'static>(handler: &dyn MessageHandler<M>, message: M, raise: bool) {
    if let Err(e) = handler.handle(message) {
        internal::error("LISTENER", &format!("Handling message failed: {e}"));
        assert!(!raise, "relaylog worker aborted: {e}");
    }
}

/// Handle to a listener started with `QueueListener::spawn`.
///
/// Dropping the handle sets the stop event without waiting.
pub struct ListenerHandle {
    stop: StopEvent,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Sets the stop event; the listener notices within one poll interval.
    pub fn stop(&self) {
        if let Err(e) = self.stop.set() {
            internal::error("LISTENER", &format!("Cannot set stop event: {e}"));
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stops the listener and waits for its shutdown hook to finish.
    pub fn join(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reject(_: u32) -> Result<(), crate::Error> {
        Err(crate::Error::Config("rejected".to_string()))
    }

    #[test]
    fn failing_handler_panics_worker_when_raising() {
        let outcome = thread::spawn(|| run_handler(&reject, 7, true)).join();
        assert!(outcome.is_err());
    }

    #[test]
    fn failing_handler_only_reports_by_default() {
        let outcome = thread::spawn(|| run_handler(&reject, 7, false)).join();
        assert!(outcome.is_ok());
    }
}
