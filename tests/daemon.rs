use relaylog::{
    Config, DaemonError, Envelope, Error, ListenerDaemon, LogContext, QueueListener, Registry,
    StopTimeout,
};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn daemon(context: &LogContext) -> ListenerDaemon<Envelope> {
    ListenerDaemon::new(
        QueueListener::for_context(context, Arc::new(Registry::new()))
            .poll_interval(Duration::from_millis(20)),
    )
    .grace_period(Duration::from_millis(200))
}

#[test]
fn stop_timeout_from_seconds() {
    assert_eq!(StopTimeout::from_secs_f64(0.0), StopTimeout::Immediate);
    assert_eq!(
        StopTimeout::from_secs_f64(1.5),
        StopTimeout::After(Duration::from_millis(1500))
    );
    assert_eq!(StopTimeout::from_secs_f64(-1.0), StopTimeout::Never);
    assert_eq!(StopTimeout::from_secs_f64(f64::NAN), StopTimeout::Never);
}

#[test]
fn stopping_unstarted_daemon_warns_or_raises() {
    let tmp = TempDir::new().unwrap();
    let context = LogContext::init(tmp.path()).unwrap();

    let lenient = daemon(&context);
    assert!(lenient.stop_listener(StopTimeout::Immediate).is_ok());
    assert!(!lenient.is_alive());
    assert_eq!(lenient.pid(), None);
    assert!(lenient.wait_for_exit(Some(Duration::ZERO)).unwrap());

    let mut config = Config::default();
    config.listener.raise_on_exc = true;
    let strict =
        ListenerDaemon::for_context(&context, Arc::new(Registry::new())).configure(&config);
    let err = strict.stop_listener(StopTimeout::Immediate).unwrap_err();
    assert!(matches!(err, Error::Daemon(DaemonError::NotRunning)));
}

#[test]
fn threaded_process_refuses_to_fork() {
    let tmp = TempDir::new().unwrap();
    let context = LogContext::init(tmp.path()).unwrap();
    let daemon = daemon(&context);
    let (release, parked) = mpsc::channel::<()>();

    // A parked thread guarantees a second thread even under --test-threads=1.
    let result = thread::scope(|s| {
        let _parked = s.spawn(move || parked.recv());
        let result = daemon.start_listener();
        drop(release);
        result
    });

    assert!(matches!(
        result,
        Err(Error::Daemon(DaemonError::Threaded(Some(n)))) if n >= 2
    ));

    assert!(!daemon.is_alive());
    assert_eq!(daemon.pid(), None);
}
