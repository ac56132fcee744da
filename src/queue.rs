//! Multi-process FIFO over a Unix stream socket.
//!
//! The consumer binds the socket path. Every producer handle holds one
//! connection and writes length-prefixed JSON frames, so messages from one
//! handle arrive in the order they were put. The first `get` in the
//! consuming process starts a receiver thread that accepts connections and
//! drains each of them into an unbounded in-process channel; socket buffers
//! only have to absorb what arrives before the consumer starts.
//!
//! A zero-length frame is a wake-up for a waiting consumer, never a message.
//!
//! Connections and the receiver are tied to the process that opened them.
//! After a `fork` the child opens its own on first use.

use crate::internal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Default upper bound for one encoded message.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// How long `Block` waits for room by default.
pub const DEFAULT_BLOCK_TIMEOUT: Duration = Duration::from_secs(1);

const FRAME_HEADER: usize = 4;

/// What `put` does when the socket cannot take the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Fail with `Error::QueueFull` at once.
    Error,
    /// Discard the message, count it and warn.
    Drop,
    /// Wait for room, up to `timeout` (`None` waits indefinitely), then fail
    /// with `Error::QueueFull`.
    Block { timeout: Option<Duration> },
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        Self::Block {
            timeout: Some(DEFAULT_BLOCK_TIMEOUT),
        }
    }
}

/// Producer connection, owned by the process that opened it.
struct Connection {
    pid: u32,
    stream: UnixStream,
}

/// Consumer side of a started receiver.
struct Inbox {
    pid: u32,
    frames: Receiver<Vec<u8>>,
    closed: Arc<AtomicBool>,
    connections: Arc<Mutex<HashMap<u64, UnixStream>>>,
}

/// Cross-process queue of serde-encodable messages.
pub struct SharedQueue<M> {
    path: PathBuf,
    listener: Option<UnixListener>,
    inbox: Mutex<Option<Inbox>>,
    connection: Mutex<Option<Connection>>,
    overflow: OverflowPolicy,
    max_message_bytes: usize,
    dropped: AtomicU64,
    _message: PhantomData<fn() -> M>,
}

impl<M> std::fmt::Debug for SharedQueue<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedQueue")
            .field("path", &self.path)
            .field("consumer", &self.listener.is_some())
            .field("overflow", &self.overflow)
            .field("max_message_bytes", &self.max_message_bytes)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<M: Serialize + DeserializeOwned> SharedQueue<M> {
    /// Creates the queue as its consumer, replacing a stale socket file.
    ///
    /// # Errors
    /// Socket creation or bind failures.
    pub fn bind(path: impl Into<PathBuf>) -> Result<Self, crate::Error> {
        let path = path.into();
        if path.exists() {
            fs::remove_file(&path)?;
            internal::debug("QUEUE", &format!("Removed stale socket {}", path.display()));
        }
        let listener = UnixListener::bind(&path)?;
        internal::debug("QUEUE", &format!("Bound {}", path.display()));
        Ok(Self::with_parts(path, Some(listener), None))
    }

    /// Opens a producer handle to a queue bound by another process.
    ///
    /// # Errors
    /// Nothing is listening at the path.
    pub fn connect(path: impl Into<PathBuf>) -> Result<Self, crate::Error> {
        let path = path.into();
        let stream = open(&path)?;
        let connection = Connection {
            pid: std::process::id(),
            stream,
        };
        Ok(Self::with_parts(path, None, Some(connection)))
    }

    fn with_parts(
        path: PathBuf,
        listener: Option<UnixListener>,
        connection: Option<Connection>,
    ) -> Self {
        Self {
            path,
            listener,
            inbox: Mutex::new(None),
            connection: Mutex::new(connection),
            overflow: OverflowPolicy::default(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            dropped: AtomicU64::new(0),
            _message: PhantomData,
        }
    }

    #[must_use]
    pub const fn with_overflow(mut self, policy: OverflowPolicy) -> Self {
        self.overflow = policy;
        self
    }

    #[must_use]
    pub const fn with_max_message_bytes(mut self, limit: usize) -> Self {
        self.max_message_bytes = limit;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn is_consumer(&self) -> bool {
        self.listener.is_some()
    }

    #[must_use]
    pub const fn overflow(&self) -> OverflowPolicy {
        self.overflow
    }

    /// Messages discarded under `OverflowPolicy::Drop`.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Encodes and enqueues one message.
    ///
    /// # Errors
    /// `MessageTooLarge`, `QueueFull` (per overflow policy), or I/O failures
    /// such as the consumer having gone away.
    pub fn put(&self, message: &M) -> Result<(), crate::Error> {
        let bytes = serde_json::to_vec(message)?;
        if bytes.len() > self.max_message_bytes {
            return Err(crate::Error::MessageTooLarge {
                size: bytes.len(),
                limit: self.max_message_bytes,
            });
        }
        self.send(&bytes)
    }

    /// Unblocks a consumer waiting in `get`.
    ///
    /// # Errors
    /// I/O failures other than a full socket (a full socket already means
    /// the consumer has something to wake up for).
    pub fn wake(&self) -> Result<(), crate::Error> {
        match self.send(&[]) {
            Err(crate::Error::QueueFull) | Ok(()) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn send(&self, payload: &[u8]) -> Result<(), crate::Error> {
        let len = u32::try_from(payload.len()).map_err(|_| crate::Error::MessageTooLarge {
            size: payload.len(),
            limit: self.max_message_bytes,
        })?;
        let mut frame = Vec::with_capacity(FRAME_HEADER + payload.len());
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(payload);

        let pid = std::process::id();
        let mut connection = lock(&self.connection);
        let mut reconnected = false;
        loop {
            if connection.as_ref().is_none_or(|c| c.pid != pid) {
                *connection = Some(Connection {
                    pid,
                    stream: open(&self.path)?,
                });
                reconnected = true;
            }
            let Some(conn) = connection.as_mut() else {
                return Err(crate::Error::QueueFull);
            };

            match write_frame(&mut conn.stream, &frame, self.overflow) {
                Ok(()) => return Ok(()),
                Err((e, written)) => {
                    // A partial frame leaves the stream unusable; the receiver
                    // discards it when the connection closes.
                    if written > 0 || !is_full(&e) {
                        *connection = None;
                    }
                    if is_full(&e) {
                        return self.overflowed(payload.is_empty());
                    }
                    // The receiving process went away and another may be
                    // listening now.
                    if written == 0 && !reconnected && is_disconnect(&e) {
                        internal::debug("QUEUE", &format!("Reconnecting after: {e}"));
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    fn overflowed(&self, wakeup: bool) -> Result<(), crate::Error> {
        match self.overflow {
            OverflowPolicy::Drop if !wakeup => {
                let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                internal::warn("QUEUE", &format!("Queue full, dropped message ({n} total)"));
                Ok(())
            }
            _ => Err(crate::Error::QueueFull),
        }
    }

    /// Blocks until a message arrives. `Ok(None)` is a wake-up.
    ///
    /// # Errors
    /// Called on a producer handle, the receiver cannot start, or an
    /// undecodable message (which is consumed either way).
    pub fn get(&self) -> Result<Option<M>, crate::Error> {
        let inbox = self.inbox()?;
        let Some(inbox) = inbox.as_ref() else {
            return Err(not_consumer());
        };
        match inbox.frames.recv() {
            Ok(frame) => decode(&frame),
            Err(_) => Err(receiver_gone()),
        }
    }

    /// Like `get`, but gives up after `timeout` and returns `Ok(None)`.
    ///
    /// # Errors
    /// As for `get`.
    pub fn get_timeout(&self, timeout: Duration) -> Result<Option<M>, crate::Error> {
        let inbox = self.inbox()?;
        let Some(inbox) = inbox.as_ref() else {
            return Err(not_consumer());
        };
        match inbox.frames.recv_timeout(timeout) {
            Ok(frame) => decode(&frame),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(receiver_gone()),
        }
    }

    /// The receiver of this process, started on first use.
    fn inbox(&self) -> Result<MutexGuard<'_, Option<Inbox>>, crate::Error> {
        let Some(listener) = &self.listener else {
            return Err(not_consumer());
        };
        let pid = std::process::id();
        let mut inbox = lock(&self.inbox);
        if inbox.as_ref().is_none_or(|i| i.pid != pid) {
            *inbox = Some(start_receiver(listener, pid, self.max_message_bytes)?);
            internal::debug("QUEUE", &format!("Receiving on {}", self.path.display()));
        }
        Ok(inbox)
    }
}

impl<M> Drop for SharedQueue<M> {
    fn drop(&mut self) {
        if self.listener.is_none() {
            return;
        }
        let inbox = self
            .inbox
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(inbox) = inbox
            && inbox.pid == std::process::id()
        {
            inbox.closed.store(true, Ordering::SeqCst);
            for stream in lock(&inbox.connections).values() {
                let _ = stream.shutdown(std::net::Shutdown::Both);
            }
            // Unblocks the accept loop so it sees `closed`.
            let _ = UnixStream::connect(&self.path);
        }
        let _ = fs::remove_file(&self.path);
    }
}

fn open(path: &Path) -> Result<UnixStream, crate::Error> {
    UnixStream::connect(path).map_err(|e| {
        crate::Error::Io(io::Error::new(
            e.kind(),
            format!("no queue at {}: {e}", path.display()),
        ))
    })
}

fn not_consumer() -> crate::Error {
    crate::Error::Io(io::Error::new(
        io::ErrorKind::Unsupported,
        "producer handles cannot receive",
    ))
}

fn receiver_gone() -> crate::Error {
    crate::Error::Io(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "queue receiver stopped",
    ))
}

fn decode<M: DeserializeOwned>(frame: &[u8]) -> Result<Option<M>, crate::Error> {
    if frame.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(frame)?))
}

/// Writes one whole frame. On failure returns the error and how many bytes
/// already reached the socket.
fn write_frame(
    stream: &mut UnixStream,
    frame: &[u8],
    policy: OverflowPolicy,
) -> Result<(), (io::Error, usize)> {
    let prepared = match policy {
        OverflowPolicy::Error | OverflowPolicy::Drop => stream.set_nonblocking(true),
        OverflowPolicy::Block { timeout } => stream.set_nonblocking(false).and_then(|()| {
            stream.set_write_timeout(timeout.map(|t| t.max(Duration::from_millis(1))))
        }),
    };
    prepared.map_err(|e| (e, 0))?;

    let mut written = 0;
    while written < frame.len() {
        match stream.write(&frame[written..]) {
            Ok(0) => return Err((io::ErrorKind::WriteZero.into(), written)),
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err((e, written)),
        }
    }
    Ok(())
}

fn start_receiver(listener: &UnixListener, pid: u32, limit: usize) -> Result<Inbox, crate::Error> {
    let listener = listener.try_clone()?;
    let (tx, frames) = mpsc::channel();
    let closed = Arc::new(AtomicBool::new(false));
    let connections = Arc::new(Mutex::new(HashMap::new()));

    let accept_closed = Arc::clone(&closed);
    let accept_connections = Arc::clone(&connections);
    thread::Builder::new()
        .name("relaylog-accept".into())
        .spawn(move || accept_loop(&listener, &tx, &accept_closed, &accept_connections, limit))?;

    Ok(Inbox {
        pid,
        frames,
        closed,
        connections,
    })
}

fn accept_loop(
    listener: &UnixListener,
    tx: &Sender<Vec<u8>>,
    closed: &AtomicBool,
    connections: &Arc<Mutex<HashMap<u64, UnixStream>>>,
    limit: usize,
) {
    let mut next_id = 0u64;
    for stream in listener.incoming() {
        if closed.load(Ordering::SeqCst) {
            break;
        }
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                internal::error("QUEUE", &format!("Accept failed: {e}"));
                thread::sleep(Duration::from_millis(100));
                continue;
            }
        };

        let id = next_id;
        next_id += 1;
        if let Ok(clone) = stream.try_clone() {
            lock(connections).insert(id, clone);
        }
        let tx = tx.clone();
        let registered = Arc::clone(connections);
        let spawned = thread::Builder::new()
            .name("relaylog-conn".into())
            .spawn(move || {
                read_frames(stream, &tx, limit);
                lock(&registered).remove(&id);
            });
        if let Err(e) = spawned {
            internal::error("QUEUE", &format!("Cannot read connection: {e}"));
            lock(connections).remove(&id);
        }
    }
    internal::trace("QUEUE", "Accept loop stopped");
}

/// Forwards frames until the producer disconnects or the consumer is gone.
fn read_frames(mut stream: UnixStream, tx: &Sender<Vec<u8>>, limit: usize) {
    let mut header = [0u8; FRAME_HEADER];
    loop {
        if let Err(e) = stream.read_exact(&mut header) {
            if e.kind() != io::ErrorKind::UnexpectedEof {
                internal::debug("QUEUE", &format!("Connection closed: {e}"));
            }
            return;
        }
        let len = usize::try_from(u32::from_be_bytes(header)).unwrap_or(usize::MAX);
        if len > limit {
            internal::error(
                "QUEUE",
                &format!("Frame of {len} bytes exceeds limit of {limit}, closing connection"),
            );
            return;
        }
        let mut frame = vec![0u8; len];
        if let Err(e) = stream.read_exact(&mut frame) {
            internal::warn("QUEUE", &format!("Discarded truncated frame: {e}"));
            return;
        }
        if tx.send(frame).is_err() {
            return;
        }
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::NotConnected
    )
}

fn is_full(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    ) || e.raw_os_error() == Some(nix::libc::ENOBUFS)
}
