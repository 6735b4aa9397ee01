use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::state::PlaybackState;

/// Progress stored when a student leaves a session to finish it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeSnapshot {
    pub template_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
    pub state: PlaybackState,
}

impl ResumeSnapshot {
    /// Record body handed to the entity store.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the state cannot be encoded.
    pub fn to_record(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// # Errors
    ///
    /// Returns `serde_json::Error` if the record is not a snapshot.
    pub fn from_record(record: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(record)
    }
}
