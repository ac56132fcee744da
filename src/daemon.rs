//! Lifecycle of the listener process: start, graceful or forced stop, refresh.
//!
//! The listener runs in a forked child. Stopping always sets the stop event
//! first; the timeout decides whether and when SIGTERM (then SIGKILL after
//! the grace period) follows.
//!
//! Only the forking thread exists in the child, so any lock another thread
//! held at that moment stays locked there forever. `start_listener` refuses
//! to fork a process with more than one thread unless the caller opts in with
//! `allow_threaded_fork`.

use crate::config::Config;
use crate::context::LogContext;
use crate::envelope::Envelope;
use crate::internal;
use crate::listener::QueueListener;
use crate::registry::Registry;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(100);
const EXIT_POLL: Duration = Duration::from_millis(10);

/// Lifecycle misuse and process-control failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonError {
    /// `start_listener` while the listener process is alive.
    AlreadyRunning,
    /// `stop_listener` while no listener process is alive.
    NotRunning,
    /// The process already ran; `refresh_daemon` prepares a new one.
    Closed,
    /// Other threads exist (`None`: the count is unknown) and threaded
    /// forking was not allowed.
    Threaded(Option<usize>),
    /// `fork` failed.
    Fork(Errno),
}

impl std::fmt::Display for DaemonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "listener is already running"),
            Self::NotRunning => write!(f, "listener is not running"),
            Self::Closed => write!(f, "listener process already ran; refresh it first"),
            Self::Threaded(Some(n)) => {
                write!(f, "refusing to fork listener from a process with {n} threads")
            }
            Self::Threaded(None) => {
                write!(f, "refusing to fork listener: thread count unknown")
            }
            Self::Fork(e) => write!(f, "cannot fork listener: {e}"),
        }
    }
}

impl std::error::Error for DaemonError {}

/// How `stop_listener` ends the process after setting the stop event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTimeout {
    /// SIGTERM now, SIGKILL after the grace period.
    Immediate,
    /// Wait, then as `Immediate`.
    After(Duration),
    /// Wait for the listener to exit on its own.
    Never,
}

impl StopTimeout {
    /// `0` is `Immediate`, positive is `After`, negative (or NaN) is `Never`.
    #[must_use]
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs > 0.0 {
            Self::After(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
        } else if secs < 0.0 || secs.is_nan() {
            Self::Never
        } else {
            Self::Immediate
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    Running(Pid),
    /// `stop_listener` is ending the process without holding the lock.
    Stopping(Pid),
    Finished,
}

type Initializer = Arc<dyn Fn() + Send + Sync>;

pub struct ListenerDaemon<M> {
    listener: QueueListener<M>,
    initializer: Option<Initializer>,
    raise_on_exc: bool,
    threaded_fork: bool,
    grace_period: Duration,
    state: Mutex<State>,
}

impl<M> std::fmt::Debug for ListenerDaemon<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerDaemon")
            .field("listener", &self.listener)
            .field("raise_on_exc", &self.raise_on_exc)
            .field("threaded_fork", &self.threaded_fork)
            .field("grace_period", &self.grace_period)
            .field("state", &*self.state.lock().unwrap_or_else(PoisonError::into_inner))
            .finish_non_exhaustive()
    }
}

impl ListenerDaemon<Envelope> {
    /// A daemon dispatching the context's queue into `registry`.
    #[must_use]
    pub fn for_context(context: &LogContext, registry: Arc<Registry>) -> Self {
        Self::new(QueueListener::for_context(context, registry))
    }
}

impl<M> ListenerDaemon<M>
where
    M: Serialize + DeserializeOwned + Send + 'static,
{
    #[must_use]
    pub fn new(listener: QueueListener<M>) -> Self {
        Self {
            raise_on_exc: listener.raises(),
            listener,
            initializer: None,
            threaded_fork: false,
            grace_period: DEFAULT_GRACE_PERIOD,
            state: Mutex::new(State::Ready),
        }
    }

    /// Runs inside the child before the dispatch loop starts.
    #[must_use]
    pub fn initializer(mut self, init: impl Fn() + Send + Sync + 'static) -> Self {
        self.initializer = Some(Arc::new(init));
        self
    }

    /// Misuse returns `Err` instead of warning, and worker errors panic their thread.
    #[must_use]
    pub const fn raise_on_exc(mut self, raise: bool) -> Self {
        self.raise_on_exc = raise;
        self.listener.set_raise_on_exc(raise);
        self
    }

    /// Lets `start_listener` fork while other threads are running.
    ///
    /// The child must then not touch anything those threads may have been
    /// holding a lock on at the time of the fork: no allocator-heavy
    /// libraries with global state, no shared handlers, no stdio locked
    /// elsewhere. Only set this when the other threads are known to be idle,
    /// such as a test harness thread waiting for results.
    #[must_use]
    pub const fn allow_threaded_fork(mut self, allow: bool) -> Self {
        self.threaded_fork = allow;
        self
    }

    #[must_use]
    pub const fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Applies `[listener]` settings: `raise_on_exc`, grace period, poll interval.
    #[must_use]
    pub fn configure(self, config: &Config) -> Self {
        let mut daemon = self
            .raise_on_exc(config.listener.raise_on_exc)
            .grace_period(config.grace_period());
        daemon.listener.set_poll_interval(config.poll_interval());
        daemon
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn misuse(&self, err: DaemonError) -> Result<(), crate::Error> {
        if self.raise_on_exc {
            return Err(err.into());
        }
        internal::warn("DAEMON", &err.to_string());
        Ok(())
    }

    /// Forks the listener process.
    ///
    /// The calling process must be single-threaded unless
    /// `allow_threaded_fork` is set.
    ///
    /// # Errors
    /// Misuse (already running, already ran) when `raise_on_exc` is set;
    /// otherwise `DaemonError::Threaded`, a failed fork or stop-event reset.
    pub fn start_listener(&self) -> Result<(), crate::Error> {
        let mut state = self.lock();
        match *state {
            State::Running(pid) | State::Stopping(pid) if alive(pid) => {
                drop(state);
                return self.misuse(DaemonError::AlreadyRunning);
            }
            State::Running(_) | State::Stopping(_) | State::Finished => {
                *state = State::Finished;
                drop(state);
                return self.misuse(DaemonError::Closed);
            }
            State::Ready => {}
        }

        if !self.threaded_fork {
            match thread_count() {
                Some(1) => {}
                count => return Err(DaemonError::Threaded(count).into()),
            }
        }

        self.listener.stop_event().clear()?;

        // Single-threaded or explicitly allowed above. The child never
        // returns from its branch.
        #[allow(unsafe_code)]
        let forked = unsafe { fork() };
        match forked.map_err(DaemonError::Fork)? {
            ForkResult::Child => {
                if let Some(init) = &self.initializer {
                    init();
                }
                self.listener.start();
                std::process::exit(0);
            }
            ForkResult::Parent { child } => {
                *state = State::Running(child);
                internal::info("DAEMON", &format!("Listener started (pid {child})"));
                Ok(())
            }
        }
    }

    /// Sets the stop event, then ends the process as `timeout` says.
    ///
    /// The state lock is not held while waiting, so `is_alive` and `pid`
    /// answer at once; a concurrent second stop is a `NotRunning` misuse.
    ///
    /// # Errors
    /// Not running (when `raise_on_exc` is set), or signal/wait failures.
    pub fn stop_listener(&self, timeout: StopTimeout) -> Result<(), crate::Error> {
        let mut state = self.lock();
        let pid = match *state {
            State::Running(pid) if alive(pid) => pid,
            State::Running(_) => {
                *state = State::Finished;
                drop(state);
                return self.misuse(DaemonError::NotRunning);
            }
            State::Ready | State::Stopping(_) | State::Finished => {
                drop(state);
                return self.misuse(DaemonError::NotRunning);
            }
        };
        *state = State::Stopping(pid);
        drop(state);

        let result = self.end_process(pid, timeout);
        let mut state = self.lock();
        if result.is_ok() {
            *state = State::Finished;
            internal::info("DAEMON", &format!("Listener stopped (pid {pid})"));
        } else if *state == State::Stopping(pid) {
            *state = State::Running(pid);
        }
        result
    }

    fn end_process(&self, pid: Pid, timeout: StopTimeout) -> Result<(), crate::Error> {
        self.listener.stop_event().set()?;
        if let Err(e) = self.listener.queue().wake() {
            internal::debug("DAEMON", &format!("Wake-up not delivered: {e}"));
        }

        match timeout {
            StopTimeout::Immediate => self.terminate(pid),
            StopTimeout::After(wait) => {
                thread::sleep(wait);
                self.terminate(pid)
            }
            StopTimeout::Never => reap(pid, None).map(|_| ()),
        }
    }

    /// SIGTERM, grace period, SIGKILL, reap.
    fn terminate(&self, pid: Pid) -> Result<(), crate::Error> {
        if reap(pid, Some(Duration::ZERO))? {
            return Ok(());
        }
        send_signal(pid, Signal::SIGTERM)?;
        if reap(pid, Some(self.grace_period))? {
            return Ok(());
        }
        internal::warn(
            "DAEMON",
            &format!("Listener ignored SIGTERM for {:?}, killing", self.grace_period),
        );
        send_signal(pid, Signal::SIGKILL)?;
        reap(pid, None)?;
        Ok(())
    }

    /// `stop_listener`, then prepares a fresh, unstarted process with the same
    /// listener and initializer.
    ///
    /// # Errors
    /// As for `stop_listener`.
    pub fn refresh_daemon(&self, timeout: StopTimeout) -> Result<(), crate::Error> {
        self.stop_listener(timeout)?;
        *self.lock() = State::Ready;
        internal::debug("DAEMON", "Listener refreshed");
        Ok(())
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        let mut state = self.lock();
        match *state {
            State::Running(pid) | State::Stopping(pid) if alive(pid) => true,
            State::Running(_) => {
                *state = State::Finished;
                false
            }
            State::Ready | State::Stopping(_) | State::Finished => false,
        }
    }

    /// Child pid while the process is running or not yet reaped.
    #[must_use]
    pub fn pid(&self) -> Option<i32> {
        match *self.lock() {
            State::Running(pid) | State::Stopping(pid) => Some(pid.as_raw()),
            State::Ready | State::Finished => None,
        }
    }

    /// Waits for the listener to exit on its own. Returns whether it has.
    ///
    /// # Errors
    /// `waitpid` failures.
    pub fn wait_for_exit(&self, timeout: Option<Duration>) -> Result<bool, crate::Error> {
        let (State::Running(pid) | State::Stopping(pid)) = *self.lock() else {
            return Ok(true);
        };
        let exited = reap(pid, timeout)?;
        if exited {
            let mut state = self.lock();
            if *state == State::Running(pid) {
                *state = State::Finished;
            }
        }
        Ok(exited)
    }
}

impl<M> Drop for ListenerDaemon<M> {
    fn drop(&mut self) {
        if matches!(
            *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            State::Running(_) | State::Stopping(_)
        ) {
            let _ = self.listener.stop_event().set();
        }
    }
}

fn send_signal(pid: Pid, sig: Signal) -> Result<(), crate::Error> {
    match signal::kill(pid, sig) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Threads of this process, from procfs.
fn thread_count() -> Option<usize> {
    fs::read_dir("/proc/self/task").ok().map(Iterator::count)
}

/// Whether the child is still running; reaps it if it has exited.
fn alive(pid: Pid) -> bool {
    matches!(
        waitpid(pid, Some(WaitPidFlag::WNOHANG)),
        Ok(WaitStatus::StillAlive)
    )
}

/// Waits up to `timeout` (`None` blocks) for the child to exit, reaping it.
/// A child that is already gone counts as exited.
fn reap(pid: Pid, timeout: Option<Duration>) -> Result<bool, crate::Error> {
    let Some(timeout) = timeout else {
        loop {
            match waitpid(pid, None) {
                Ok(WaitStatus::StillAlive) | Err(Errno::EINTR) => {}
                Ok(_) | Err(Errno::ECHILD) => return Ok(true),
                Err(e) => return Err(e.into()),
            }
        }
    };
    let deadline = Instant::now() + timeout;
    loop {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => {}
            Ok(_) | Err(Errno::ECHILD) => return Ok(true),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e.into()),
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        thread::sleep(EXIT_POLL);
    }
}
