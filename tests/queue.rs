use relaylog::{Envelope, Error, Level, LogContext, LogRecord, OverflowPolicy, SharedQueue, StopEvent};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn fifo_order_across_handles() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("q.sock");
    let consumer: SharedQueue<u32> = SharedQueue::bind(&path).unwrap();
    let producer: SharedQueue<u32> = SharedQueue::connect(&path).unwrap();

    for n in 1..=5 {
        producer.put(&n).unwrap();
    }

    let received: Vec<u32> = (0..5)
        .map(|_| consumer.get_timeout(Duration::from_secs(1)).unwrap().unwrap())
        .collect();
    assert_eq!(received, vec![1, 2, 3, 4, 5]);
}

#[test]
fn default_policy_delivers_burst_in_order() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("q.sock");
    let consumer: SharedQueue<Envelope> = SharedQueue::bind(&path).unwrap();
    let producer: SharedQueue<Envelope> = SharedQueue::connect(&path).unwrap();
    assert_eq!(producer.overflow(), OverflowPolicy::default());
    assert_eq!(consumer.get_timeout(Duration::from_millis(1)).unwrap(), None);

    // Far more than the socket buffer holds, all put before the first read.
    for n in 0..2000 {
        let record = LogRecord::new("burst", Level::Info, format!("{n:04} {}", "z".repeat(200)));
        producer.put(&Envelope::record(record)).unwrap();
    }

    for n in 0..2000 {
        let envelope = consumer
            .get_timeout(Duration::from_secs(5))
            .unwrap()
            .unwrap();
        assert!(envelope.record.unwrap().msg.starts_with(&format!("{n:04} ")));
    }
    assert_eq!(consumer.get_timeout(Duration::from_millis(20)).unwrap(), None);
}

#[test]
fn burst_from_many_producers_reaches_running_consumer() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("q.sock");
    let consumer: SharedQueue<u32> = SharedQueue::bind(&path).unwrap();
    assert_eq!(consumer.get_timeout(Duration::from_millis(1)).unwrap(), None);

    let producers: Vec<_> = (0..4u32)
        .map(|p| {
            let path = path.clone();
            thread::spawn(move || {
                let producer: SharedQueue<u32> = SharedQueue::connect(&path).unwrap();
                for n in 0..500 {
                    producer.put(&(p * 1000 + n)).unwrap();
                }
            })
        })
        .collect();

    let mut last = [None::<u32>; 4];
    for _ in 0..2000 {
        let value = consumer
            .get_timeout(Duration::from_secs(5))
            .unwrap()
            .unwrap();
        let slot = &mut last[(value / 1000) as usize];
        assert!(slot.is_none_or(|prev| prev < value));
        *slot = Some(value);
    }
    for producer in producers {
        producer.join().unwrap();
    }
}

#[test]
fn wake_yields_none() {
    let tmp = TempDir::new().unwrap();
    let queue: SharedQueue<String> = SharedQueue::bind(tmp.path().join("q.sock")).unwrap();

    queue.wake().unwrap();
    assert_eq!(queue.get().unwrap(), None);
}

#[test]
fn get_timeout_returns_none_when_empty() {
    let tmp = TempDir::new().unwrap();
    let queue: SharedQueue<String> = SharedQueue::bind(tmp.path().join("q.sock")).unwrap();

    assert_eq!(queue.get_timeout(Duration::from_millis(20)).unwrap(), None);
}

#[test]
fn blocked_get_is_woken_from_another_thread() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("q.sock");
    let queue: SharedQueue<String> = SharedQueue::bind(&path).unwrap();

    let waker = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        let producer: SharedQueue<String> = SharedQueue::connect(&path).unwrap();
        producer.wake().unwrap();
    });

    assert_eq!(queue.get().unwrap(), None);
    waker.join().unwrap();
}

#[test]
fn oversized_message_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let queue: SharedQueue<String> = SharedQueue::bind(tmp.path().join("q.sock"))
        .unwrap()
        .with_max_message_bytes(16);

    let err = queue.put(&"x".repeat(64)).unwrap_err();
    assert!(matches!(err, Error::MessageTooLarge { limit: 16, .. }));
}

#[test]
fn connect_to_missing_socket_fails() {
    let tmp = TempDir::new().unwrap();
    let result: Result<SharedQueue<String>, _> = SharedQueue::connect(tmp.path().join("none.sock"));
    assert!(result.is_err());
}

#[test]
fn producer_handle_cannot_receive() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("q.sock");
    let _consumer: SharedQueue<String> = SharedQueue::bind(&path).unwrap();
    let producer: SharedQueue<String> = SharedQueue::connect(&path).unwrap();

    assert!(!producer.is_consumer());
    assert!(producer.get_timeout(Duration::from_millis(10)).is_err());
}

#[test]
fn dropping_consumer_removes_socket() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("q.sock");
    {
        let _queue: SharedQueue<String> = SharedQueue::bind(&path).unwrap();
        assert!(path.exists());
    }
    assert!(!path.exists());
}

#[test]
fn drop_policy_counts_overflow() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("q.sock");
    let _consumer: SharedQueue<String> = SharedQueue::bind(&path).unwrap();
    let producer: SharedQueue<String> = SharedQueue::connect(&path)
        .unwrap()
        .with_overflow(OverflowPolicy::Drop);

    let payload = "y".repeat(4096);
    for _ in 0..10_000 {
        producer.put(&payload).unwrap();
        if producer.dropped() > 0 {
            break;
        }
    }
    assert!(producer.dropped() > 0);
}

#[test]
fn stop_event_set_and_clear() {
    let tmp = TempDir::new().unwrap();
    let event = StopEvent::new(tmp.path().join("stop"));

    assert!(!event.is_set());
    event.set().unwrap();
    assert!(event.is_set());
    assert!(event.wait(Some(Duration::from_millis(10))));
    event.clear().unwrap();
    assert!(!event.is_set());
    assert!(!event.wait(Some(Duration::from_millis(20))));
}

#[test]
fn context_send_rejects_empty_envelope() {
    let tmp = TempDir::new().unwrap();
    let context = LogContext::init(tmp.path()).unwrap();
    let empty = Envelope {
        record: None,
        config: None,
    };

    assert!(matches!(context.send(&empty), Err(Error::EmptyEnvelope)));
}

#[test]
fn attached_context_reaches_owner() {
    let tmp = TempDir::new().unwrap();
    let owner = LogContext::init(tmp.path()).unwrap();
    let remote = LogContext::attach(tmp.path()).unwrap();

    assert!(owner.is_owner());
    assert!(!remote.is_owner());

    remote
        .send(&Envelope::record(LogRecord::new("app", Level::Info, "hi")))
        .unwrap();
    let envelope = owner
        .queue()
        .get_timeout(Duration::from_secs(1))
        .unwrap()
        .unwrap();
    assert_eq!(envelope.record.unwrap().msg, "hi");
}

#[test]
fn request_stop_sets_event_and_wakes() {
    let tmp = TempDir::new().unwrap();
    let owner = LogContext::init(tmp.path()).unwrap();
    let remote = LogContext::attach(tmp.path()).unwrap();

    remote.request_stop().unwrap();

    assert!(owner.stop_event().is_set());
    assert!(owner.queue().get().unwrap().is_none());
}
