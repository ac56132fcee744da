//! Forks listener processes from the test binary.
//!
//! Everything lives in one test so the only other thread at fork time is the
//! harness main thread, which just waits for the result.

use nix::sys::signal::{SigSet, Signal};
use relaylog::dictconfig::{FormatterConfig, HandlerConfig, LoggerConfig};
use relaylog::{
    ConfigDirective, DictConfig, Envelope, Level, ListenerDaemon, LogContext, LogRecord,
    MessageHandler, QueueListener, Registry, StopTimeout,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn file_config(path: &Path) -> DictConfig {
    DictConfig::default()
        .formatter("plain", FormatterConfig::new("%(levelname)s %(message)s"))
        .handler(
            "file",
            HandlerConfig::new("file")
                .arg("filename", path.to_string_lossy().into_owned())
                .formatter("plain"),
        )
        .logger("app", LoggerConfig::default().handler("file"))
}

fn wait_for_file(path: &Path, expected: &str) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if fs::read_to_string(path).is_ok_and(|c| c.contains(expected)) {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

fn daemon(listener: QueueListener<Envelope>) -> ListenerDaemon<Envelope> {
    ListenerDaemon::new(listener.poll_interval(Duration::from_millis(20)))
        .grace_period(Duration::from_millis(200))
        .allow_threaded_fork(true)
}

/// Accepts everything, then never finishes shutting down.
struct StuckOnShutdown;

impl MessageHandler<Envelope> for StuckOnShutdown {
    fn handle(&self, _envelope: Envelope) -> Result<(), relaylog::Error> {
        Ok(())
    }

    fn shutdown(&self) {
        thread::sleep(Duration::from_secs(60));
    }
}

fn lifecycle(context: &LogContext, tmp: &Path) {
    let log = tmp.join("app.log");
    let marker = tmp.join("initialized");
    let init_marker = marker.clone();
    let daemon = daemon(QueueListener::for_context(context, Arc::new(Registry::new())))
        .initializer(move || {
            let _ = fs::write(&init_marker, "child");
        });

    // start, handle a record in the child, graceful stop
    daemon.start_listener().unwrap();
    assert!(daemon.is_alive());
    assert!(daemon.pid().is_some());
    assert!(wait_for_file(&marker, "child"));

    context
        .send(&Envelope::both(
            ConfigDirective::Dict(file_config(&log)),
            LogRecord::new("app", Level::Info, "hello"),
        ))
        .unwrap();
    assert!(wait_for_file(&log, "INFO hello"));

    // starting twice only warns
    daemon.start_listener().unwrap();
    assert!(daemon.is_alive());

    daemon.stop_listener(StopTimeout::Never).unwrap();
    assert!(!daemon.is_alive());
    assert!(context.stop_event().is_set());

    // a finished daemon refuses to start until refreshed
    daemon.start_listener().unwrap();
    assert!(!daemon.is_alive());
    daemon.refresh_daemon(StopTimeout::Immediate).unwrap();

    // the refreshed process starts with a cleared stop event
    daemon.start_listener().unwrap();
    assert!(!context.stop_event().is_set());
    assert!(daemon.is_alive());

    context
        .send(&Envelope::both(
            ConfigDirective::Dict(file_config(&log)),
            LogRecord::new("app", Level::Warn, "again"),
        ))
        .unwrap();
    assert!(wait_for_file(&log, "WARNING again"));

    // forced stop completes within the grace period
    let started = Instant::now();
    daemon.stop_listener(StopTimeout::Immediate).unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!daemon.is_alive());
    assert_eq!(daemon.pid(), None);
}

fn delayed_stop_leaves_state_readable(context: &LogContext) {
    let daemon = daemon(QueueListener::for_context(context, Arc::new(Registry::new())));
    daemon.start_listener().unwrap();
    assert!(daemon.is_alive());

    let wait = Duration::from_millis(300);
    let started = Instant::now();
    thread::scope(|s| {
        let stopping = s.spawn(|| daemon.stop_listener(StopTimeout::After(wait)));

        thread::sleep(Duration::from_millis(100));
        let asked = Instant::now();
        let _ = daemon.is_alive();
        assert!(daemon.pid().is_some());
        assert!(asked.elapsed() < Duration::from_millis(100));

        stopping.join().unwrap().unwrap();
    });

    assert!(started.elapsed() >= wait);
    assert!(!daemon.is_alive());
    assert_eq!(daemon.pid(), None);
}

fn ignored_sigterm_escalates_to_kill(context: &LogContext) {
    let listener = QueueListener::new(
        Arc::clone(context.queue()),
        context.stop_event().clone(),
        StuckOnShutdown,
    );
    let daemon = daemon(listener).initializer(|| {
        let mut blocked = SigSet::empty();
        blocked.add(Signal::SIGTERM);
        let _ = blocked.thread_block();
    });
    daemon.start_listener().unwrap();
    assert!(daemon.is_alive());

    // give the child time to block SIGTERM before it arrives
    thread::sleep(Duration::from_millis(100));
    let started = Instant::now();
    daemon.stop_listener(StopTimeout::Immediate).unwrap();

    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!daemon.is_alive());
}

#[test]
fn forked_listener_processes() {
    let tmp = TempDir::new().unwrap();
    let context = LogContext::init(tmp.path().join("run")).unwrap();

    lifecycle(&context, tmp.path());
    delayed_stop_leaves_state_readable(&context);
    ignored_sigterm_escalates_to_kill(&context);
}
