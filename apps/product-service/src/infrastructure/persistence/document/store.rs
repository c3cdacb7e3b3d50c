//! Embedded document store.
//!
//! Named collections of JSON documents keyed by a per-collection sequence
//! id. Reads share a lock; every write (including multi-step
//! [`DocumentStore::transaction`] closures) runs under one exclusive lock,
//! so a guarded update is evaluated and applied without interleaving.
//!
//! With a snapshot path, the store loads the snapshot on open and rewrites
//! it atomically after every committed write, before the write lock is
//! released. A write is acknowledged only once its snapshot is on disk.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

/// A stored document.
pub type Document = Map<String, Value>;

/// Field holding the store-assigned id.
pub const ID_FIELD: &str = "id";

/// Errors from document store operations.
#[derive(Debug, Error)]
pub enum DocumentStoreError {
    /// The store was closed.
    #[error("document store is closed")]
    Closed,

    /// Snapshot file I/O failed.
    #[error("snapshot I/O error at '{path}': {source}")]
    Io {
        /// Snapshot path.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Snapshot or document (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An increment would overflow or hit a non-integer field.
    #[error("cannot increment field '{field}': {message}")]
    Increment {
        /// Field name.
        field: String,
        /// Reason.
        message: String,
    },
}

/// Document filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document.
    All,
    /// Field equals value.
    Eq(String, Value),
    /// Integer field is at least the bound.
    Gte(String, i64),
    /// Integer field is at most the bound.
    Lte(String, i64),
    /// Every filter matches.
    And(Vec<Filter>),
}

impl Filter {
    /// Match on the store-assigned id.
    #[must_use]
    pub fn id(id: i64) -> Self {
        Self::Eq(ID_FIELD.to_string(), Value::from(id))
    }

    /// Field equals value.
    #[must_use]
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::Eq(field.to_string(), value.into())
    }

    /// Integer field is at least `bound`.
    #[must_use]
    pub fn gte(field: &str, bound: i64) -> Self {
        Self::Gte(field.to_string(), bound)
    }

    /// Integer field is at most `bound`.
    #[must_use]
    pub fn lte(field: &str, bound: i64) -> Self {
        Self::Lte(field.to_string(), bound)
    }

    /// Combine with another filter.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// True when `doc` satisfies the filter.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::All => true,
            Self::Eq(field, value) => doc.get(field) == Some(value),
            Self::Gte(field, bound) => doc
                .get(field)
                .and_then(Value::as_i64)
                .is_some_and(|v| v >= *bound),
            Self::Lte(field, bound) => doc
                .get(field)
                .and_then(Value::as_i64)
                .is_some_and(|v| v <= *bound),
            Self::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }
}

/// Field patch applied by [`DocumentStore::update_one`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Vec<(String, Value)>,
    inc: Vec<(String, i64)>,
}

impl Update {
    /// Empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a field.
    #[must_use]
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set.push((field.to_string(), value.into()));
        self
    }

    /// Add `delta` to an integer field.
    #[must_use]
    pub fn inc(mut self, field: &str, delta: i64) -> Self {
        self.inc.push((field.to_string(), delta));
        self
    }

    fn apply(&self, doc: &mut Document) -> Result<(), DocumentStoreError> {
        for (field, delta) in &self.inc {
            let current = doc.get(field).and_then(Value::as_i64).ok_or_else(|| {
                DocumentStoreError::Increment {
                    field: field.clone(),
                    message: "field is missing or not an integer".to_string(),
                }
            })?;
            let next = current
                .checked_add(*delta)
                .ok_or_else(|| DocumentStoreError::Increment {
                    field: field.clone(),
                    message: "integer overflow".to_string(),
                })?;
            doc.insert(field.clone(), Value::from(next));
        }
        for (field, value) in &self.set {
            doc.insert(field.clone(), value.clone());
        }
        Ok(())
    }
}

/// Skip and limit for [`DocumentStore::find`]; matches come back in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Skip this many matches.
    pub skip: u64,
    /// Return at most this many matches.
    pub limit: Option<u64>,
}

impl FindOptions {
    /// Page through matches in id order.
    #[must_use]
    pub const fn page(skip: u64, limit: u64) -> Self {
        Self {
            skip,
            limit: Some(limit),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Collection {
    last_id: i64,
    documents: BTreeMap<i64, Document>,
}

impl Collection {
    fn first_match(&self, filter: &Filter) -> Option<i64> {
        self.documents
            .iter()
            .find(|(_, doc)| filter.matches(doc))
            .map(|(id, _)| *id)
    }
}

/// Mutable view of the store handed to transaction closures.
///
/// Changes are applied as they are made; a closure that returns early has
/// already persisted anything it wrote before returning.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collections {
    collections: HashMap<String, Collection>,
}

impl Collections {
    /// Insert a document and return its assigned id.
    pub fn insert_one(&mut self, collection: &str, mut doc: Document) -> i64 {
        let coll = self.collections.entry(collection.to_string()).or_default();
        coll.last_id += 1;
        let id = coll.last_id;
        doc.insert(ID_FIELD.to_string(), Value::from(id));
        coll.documents.insert(id, doc);
        id
    }

    /// First matching document in id order.
    #[must_use]
    pub fn find_one(&self, collection: &str, filter: &Filter) -> Option<Document> {
        let coll = self.collections.get(collection)?;
        coll.first_match(filter)
            .and_then(|id| coll.documents.get(&id).cloned())
    }

    /// Matching documents in id order.
    #[must_use]
    pub fn find(&self, collection: &str, filter: &Filter, options: &FindOptions) -> Vec<Document> {
        let Some(coll) = self.collections.get(collection) else {
            return Vec::new();
        };
        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        coll.documents
            .values()
            .filter(|doc| filter.matches(doc))
            .skip(skip)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Apply `update` to the first match and return the updated document.
    ///
    /// Returns `None` when nothing matched; the filter doubles as the guard.
    pub fn update_one(
        &mut self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>, DocumentStoreError> {
        let Some(coll) = self.collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(id) = coll.first_match(filter) else {
            return Ok(None);
        };
        let Some(doc) = coll.documents.get_mut(&id) else {
            return Ok(None);
        };
        let mut patched = doc.clone();
        update.apply(&mut patched)?;
        *doc = patched.clone();
        Ok(Some(patched))
    }

    /// Remove the first match and return the deleted count.
    pub fn delete_one(&mut self, collection: &str, filter: &Filter) -> u64 {
        let Some(coll) = self.collections.get_mut(collection) else {
            return 0;
        };
        coll.first_match(filter)
            .and_then(|id| coll.documents.remove(&id))
            .map_or(0, |_| 1)
    }

    /// Number of documents in a collection.
    #[must_use]
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map_or(0, |c| c.documents.len())
    }
}

#[derive(Debug, Default)]
struct StoreState {
    data: Collections,
    closed: bool,
}

/// Embedded JSON document store.
#[derive(Debug, Default)]
pub struct DocumentStore {
    state: RwLock<StoreState>,
    snapshot_path: Option<PathBuf>,
}

impl DocumentStore {
    /// Create an empty, purely in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a store backed by a snapshot file, loading it if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing snapshot cannot be read or parsed.
    pub fn open(snapshot_path: impl Into<PathBuf>) -> Result<Self, DocumentStoreError> {
        let path = snapshot_path.into();
        let data = if path.exists() {
            let contents = std::fs::read(&path).map_err(|e| io_error(&path, e))?;
            let data: Collections = serde_json::from_slice(&contents)?;
            info!(
                path = %path.display(),
                collections = data.collections.len(),
                "Loaded document store snapshot"
            );
            data
        } else {
            Collections::default()
        };

        Ok(Self {
            state: RwLock::new(StoreState {
                data,
                closed: false,
            }),
            snapshot_path: Some(path),
        })
    }

    /// Insert a document and return its assigned id.
    pub fn insert_one(&self, collection: &str, doc: Document) -> Result<i64, DocumentStoreError> {
        self.transaction(|tx| Ok(tx.insert_one(collection, doc)))
    }

    /// First matching document in id order.
    pub fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, DocumentStoreError> {
        self.view(|data| data.find_one(collection, filter))
    }

    /// Matching documents in id order, after skip and limit.
    pub fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, DocumentStoreError> {
        self.view(|data| data.find(collection, filter, options))
    }

    /// Apply `update` to the first match; `None` when nothing matched.
    pub fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>, DocumentStoreError> {
        self.transaction(|tx| tx.update_one(collection, filter, update))
    }

    /// Remove the first match and return the deleted count.
    pub fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, DocumentStoreError> {
        self.transaction(|tx| Ok(tx.delete_one(collection, filter)))
    }

    /// Run `f` under the exclusive write lock.
    ///
    /// When `f` succeeds and the store has a snapshot path, the snapshot is
    /// rewritten before the lock is released.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&mut Collections) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DocumentStoreError>,
    {
        let mut state = self.state.write();
        if state.closed {
            return Err(DocumentStoreError::Closed.into());
        }
        let value = f(&mut state.data)?;
        if let Some(path) = &self.snapshot_path {
            write_snapshot(path, &state.data)?;
        }
        Ok(value)
    }

    /// Run `f` under the shared read lock.
    pub fn view<T>(&self, f: impl FnOnce(&Collections) -> T) -> Result<T, DocumentStoreError> {
        let state = self.state.read();
        if state.closed {
            return Err(DocumentStoreError::Closed);
        }
        Ok(f(&state.data))
    }

    /// Write a final snapshot and refuse further operations. Closing twice
    /// is a no-op.
    pub fn close(&self) -> Result<(), DocumentStoreError> {
        let mut state = self.state.write();
        if state.closed {
            return Ok(());
        }
        if let Some(path) = &self.snapshot_path {
            write_snapshot(path, &state.data)?;
        }
        state.closed = true;
        debug!("Document store closed");
        Ok(())
    }

    /// True once [`DocumentStore::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }
}

/// Serialize to a sibling temp file and rename it into place.
fn write_snapshot(path: &Path, data: &Collections) -> Result<(), DocumentStoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    let bytes = serde_json::to_vec(data)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(|e| io_error(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_error(path, e))?;
    debug!(path = %path.display(), "Document store snapshot written");
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> DocumentStoreError {
    DocumentStoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
