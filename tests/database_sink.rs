use relaylog::sink::{Collection, DatabaseDeliver, DatabaseSink, JsonlCollection};
use relaylog::{BatchingSink, Error, Formatter, Level, LogRecord, Sink};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// In-memory collection counting bulk inserts.
#[derive(Debug, Clone, Default)]
struct MemoryCollection {
    inserts: Arc<Mutex<Vec<Vec<Value>>>>,
    read_only: bool,
}

impl Collection for MemoryCollection {
    fn is_writable(&self) -> bool {
        !self.read_only
    }

    fn insert_many(&self, documents: Vec<Value>) -> Result<usize, Error> {
        let n = documents.len();
        self.inserts.lock().unwrap().push(documents);
        Ok(n)
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("memory://logs")
    }
}

#[test]
fn missing_collection_name_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().to_str().unwrap();

    assert!(JsonlCollection::open(dir, "logs", None).is_err());
    assert!(JsonlCollection::open(dir, "logs", Some("")).is_err());
}

#[test]
fn read_only_collection_rejected_at_construction() {
    let collection = MemoryCollection {
        read_only: true,
        ..MemoryCollection::default()
    };
    let err = DatabaseDeliver::new(collection).unwrap_err();
    assert!(matches!(err, Error::NotWritable(_)));
}

#[test]
fn flush_is_a_single_bulk_insert() {
    let collection = MemoryCollection::default();
    let sink: DatabaseSink<MemoryCollection> =
        BatchingSink::new(DatabaseDeliver::new(collection.clone()).unwrap()).capacity(10);
    let formatter = Formatter::new("%(levelname)s %(message)s");

    for msg in ["a", "b", "c"] {
        sink.emit(&LogRecord::new("app.db", Level::Warn, msg), &formatter)
            .unwrap();
    }
    assert!(collection.inserts.lock().unwrap().is_empty());

    sink.flush().unwrap();

    let inserts = collection.inserts.lock().unwrap();
    assert_eq!(inserts.len(), 1);
    let docs = &inserts[0];
    assert_eq!(docs.len(), 3);
    assert_eq!(docs[0]["name"], "app.db");
    assert_eq!(docs[0]["level"], "WARNING");
    assert_eq!(docs[2]["formatted"], "WARNING c");
}

#[test]
fn jsonl_collection_appends_documents_with_ids() {
    let tmp = TempDir::new().unwrap();
    let collection =
        JsonlCollection::open(tmp.path().to_str().unwrap(), "logs", Some("events")).unwrap();
    let path = collection.path().to_path_buf();
    let sink = BatchingSink::new(DatabaseDeliver::new(collection).unwrap()).capacity(10);

    sink.emit(&LogRecord::new("app", Level::Info, "one"), &Formatter::default())
        .unwrap();
    sink.emit(&LogRecord::new("app", Level::Info, "two"), &Formatter::default())
        .unwrap();
    sink.close().unwrap();

    assert!(path.ends_with("logs/events.jsonl"));
    let content = fs::read_to_string(&path).unwrap();
    let docs: Vec<Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["msg"], "one");
    assert!(docs[0]["_id"].is_string());
    assert_ne!(docs[0]["_id"], docs[1]["_id"]);
}
