use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

use crate::media::{InMemoryUploader, MediaUploader};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: RecordId },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Collections the player writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// One finalized practice session.
    SessionRecord,
    /// Outcome of a single block within a session.
    UnitRecord,
    /// Progress saved when leaving a session early.
    ResumeSnapshot,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::SessionRecord => "session_record",
            EntityKind::UnitRecord => "unit_record",
            EntityKind::ResumeSnapshot => "resume_snapshot",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier handed out by the store on create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    #[must_use]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A record as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: RecordId,
    pub record: Value,
}

/// Generic create/update/delete contract over keyed collections.
///
/// Records are opaque JSON objects; the store assigns ids.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Persist a new record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn create(&self, kind: EntityKind, record: Value) -> Result<StoredRecord, StorageError>;

    /// Merge `patch` into an existing record. Top-level keys of an object patch
    /// overwrite the stored ones; any other patch replaces the record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn update(
        &self,
        kind: EntityKind,
        id: RecordId,
        patch: Value,
    ) -> Result<StoredRecord, StorageError>;

    /// Remove a record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn delete(&self, kind: EntityKind, id: RecordId) -> Result<(), StorageError>;

    /// Fetch a record by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get(&self, kind: EntityKind, id: RecordId) -> Result<StoredRecord, StorageError>;
}

/// Simple in-memory store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    records: Arc<Mutex<BTreeMap<(EntityKind, RecordId), Value>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All records of `kind` in creation order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn list(&self, kind: EntityKind) -> Result<Vec<StoredRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|((_, id), record)| StoredRecord {
                id: *id,
                record: record.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn create(&self, kind: EntityKind, record: Value) -> Result<StoredRecord, StorageError> {
        let id = RecordId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert((kind, id), record.clone());
        debug!(%kind, %id, "record created");
        Ok(StoredRecord { id, record })
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: RecordId,
        patch: Value,
    ) -> Result<StoredRecord, StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let current = guard
            .get_mut(&(kind, id))
            .ok_or(StorageError::NotFound { kind, id })?;
        merge_shallow(current, patch);
        debug!(%kind, %id, "record updated");
        Ok(StoredRecord {
            id,
            record: current.clone(),
        })
    }

    async fn delete(&self, kind: EntityKind, id: RecordId) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.remove(&(kind, id)).is_none() {
            return Err(StorageError::NotFound { kind, id });
        }
        debug!(%kind, %id, "record deleted");
        Ok(())
    }

    async fn get(&self, kind: EntityKind, id: RecordId) -> Result<StoredRecord, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .get(&(kind, id))
            .map(|record| StoredRecord {
                id,
                record: record.clone(),
            })
            .ok_or(StorageError::NotFound { kind, id })
    }
}

fn merge_shallow(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(current), Value::Object(fields)) => current.extend(fields),
        (target, patch) => *target = patch,
    }
}

/// Aggregates the collaborators behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub entities: Arc<dyn EntityStore>,
    pub media: Arc<dyn MediaUploader>,
}

impl Storage {
    #[must_use]
    pub fn new(entities: Arc<dyn EntityStore>, media: Arc<dyn MediaUploader>) -> Self {
        Self { entities, media }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        let entities: Arc<dyn EntityStore> = Arc::new(InMemoryStore::new());
        let media: Arc<dyn MediaUploader> = Arc::new(InMemoryUploader::new());
        Self { entities, media }
    }
}
