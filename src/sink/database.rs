//! Buffered document-store delivery: every flush is one bulk insert.

use super::batch::{BatchingSink, BufferedRecord, Deliver};
use crate::error::DeliveryError;
use crate::internal;
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use ulid::Ulid;

/// A writable collection of JSON documents.
pub trait Collection: Send + Sync {
    /// Whether the backing store currently accepts writes.
    fn is_writable(&self) -> bool;

    /// Inserts all documents in one operation, returning how many were stored.
    ///
    /// # Errors
    /// Backend failures; nothing is assumed stored on error.
    fn insert_many(&self, documents: Vec<Value>) -> Result<usize, crate::Error>;

    /// Human-readable location for diagnostics.
    fn location(&self) -> PathBuf;
}

/// Append-only JSONL collection at `<dir>/<database>/<collection>.jsonl`.
///
/// One object per line with a ULID `_id`, so documents sort by insertion time
/// and concurrent writers never collide.
#[derive(Debug, Clone)]
pub struct JsonlCollection {
    path: PathBuf,
}

impl JsonlCollection {
    /// # Errors
    /// `Error::Config` when no collection name is given.
    pub fn open(dir: &str, database: &str, collection: Option<&str>) -> Result<Self, crate::Error> {
        let Some(collection) = collection.filter(|c| !c.is_empty()) else {
            return Err(crate::Error::Config(
                "a logging collection must be specified".into(),
            ));
        };
        let expanded = shellexpand::tilde(dir);
        let path = Path::new(expanded.as_ref())
            .join(database)
            .join(format!("{collection}.jsonl"));
        internal::trace("DATABASE", &format!("Resolved collection: {}", path.display()));
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Collection for JsonlCollection {
    fn is_writable(&self) -> bool {
        if let Some(parent) = self.path.parent()
            && fs::create_dir_all(parent).is_err()
        {
            return false;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .is_ok()
    }

    fn insert_many(&self, documents: Vec<Value>) -> Result<usize, crate::Error> {
        let mut payload = String::new();
        let count = documents.len();
        for mut doc in documents {
            if let Value::Object(map) = &mut doc {
                map.entry("_id")
                    .or_insert_with(|| Value::String(Ulid::new().to_string()));
            }
            payload.push_str(&serde_json::to_string(&doc)?);
            payload.push('\n');
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(payload.as_bytes())?;
        Ok(count)
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}

/// `Deliver` backend that turns each buffered record into one document.
#[derive(Debug)]
pub struct DatabaseDeliver<C: Collection> {
    collection: C,
}

/// Batching sink over a collection.
pub type DatabaseSink<C> = BatchingSink<DatabaseDeliver<C>>;

impl<C: Collection> DatabaseDeliver<C> {
    /// Validates the collection up front; a store that cannot accept writes is
    /// a construction error rather than a flush-time surprise.
    ///
    /// # Errors
    /// `Error::NotWritable`.
    pub fn new(collection: C) -> Result<Self, crate::Error> {
        if !collection.is_writable() {
            return Err(crate::Error::NotWritable(collection.location()));
        }
        Ok(Self { collection })
    }

    #[must_use]
    pub const fn collection(&self) -> &C {
        &self.collection
    }

    fn document(item: &BufferedRecord) -> Result<Value, crate::Error> {
        let mut doc = match serde_json::to_value(&item.record)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        doc.insert("formatted".into(), Value::String(item.formatted.clone()));
        Ok(Value::Object(doc))
    }
}

impl<C: Collection> Deliver for DatabaseDeliver<C> {
    fn deliver(&self, batch: &[BufferedRecord]) -> Result<(), DeliveryError> {
        let documents = batch
            .iter()
            .map(Self::document)
            .collect::<Result<Vec<_>, _>>()?;
        let stored = self.collection.insert_many(documents)?;
        internal::debug(
            "DATABASE",
            &format!("Inserted {stored} document(s) into {}", self.collection.location().display()),
        );
        Ok(())
    }
}
