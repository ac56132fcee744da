#![allow(dead_code)]

use relaylog::dictconfig::{FactoryArgs, HandlerFactory};
use relaylog::{Formatter, Handler, LogRecord, Registry, Sink};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// In-memory sink recording each formatted line.
#[derive(Clone, Default)]
pub struct CaptureSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CaptureSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap().len()
    }
}

impl Sink for CaptureSink {
    fn emit(&self, record: &LogRecord, formatter: &Formatter) -> Result<(), relaylog::Error> {
        self.lines.lock().unwrap().push(formatter.format(record));
        Ok(())
    }
}

/// Registers `class` so every handler of that class writes into `sink`.
pub fn register_capture(registry: &Registry, class: &str, sink: &CaptureSink) {
    let sink = sink.clone();
    let factory: HandlerFactory =
        Arc::new(move |_: &FactoryArgs<'_>| Ok(Handler::new(sink.clone())));
    registry.register_handler_class(class, factory);
}

/// Polls until `cond` holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}
