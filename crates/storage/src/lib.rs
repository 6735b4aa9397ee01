//! Collaborator contracts for persisting practice sessions and uploading
//! their media, plus in-memory adapters.

pub mod media;
pub mod repository;

pub use media::{InMemoryUploader, MediaFile, MediaUploader, UploadContext, UploadOutcome};
pub use repository::{
    EntityKind, EntityStore, InMemoryStore, RecordId, Storage, StorageError, StoredRecord,
};
