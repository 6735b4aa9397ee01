//! Progressive persistence of a running session.
//!
//! The session record is created when a run starts and updated as the
//! student works through it, so a crash loses at most one heartbeat of
//! progress. Writes that fail are kept and retried on the next write or
//! [`SessionRecorder::flush`]; only the latest state per record is kept.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use practice_core::duration::playback_duration;
use practice_core::model::{MediaLink, UnitRecord};
use storage::{EntityKind, EntityStore, RecordId, StorageError};

use super::controller::PlaybackController;
use super::ticker::ElapsedTicker;

/// Period between progress saves while a session runs.
pub const PROGRESS_HEARTBEAT: Duration = Duration::from_secs(15);

/// A ticker that fires every [`PROGRESS_HEARTBEAT`].
#[must_use]
pub fn progress_heartbeat() -> ElapsedTicker {
    ElapsedTicker::every(PROGRESS_HEARTBEAT)
}

#[derive(Debug, Clone, Serialize)]
struct ProgressBody {
    template_name: String,
    started_at: Option<DateTime<Utc>>,
    total_units: usize,
    completed_count: usize,
    omitted_count: usize,
    pending_count: usize,
    current_index: usize,
    elapsed_secs: u64,
    planned_secs: u64,
    finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

impl ProgressBody {
    fn of(controller: &PlaybackController, user_id: Option<String>) -> Self {
        let state = controller.state();
        Self {
            template_name: controller.template().name().to_owned(),
            started_at: controller.started_at(),
            total_units: state.units().len(),
            completed_count: state.completed().len(),
            omitted_count: state.omitted().len(),
            pending_count: state.pending(),
            current_index: state.current_index(),
            elapsed_secs: state.elapsed_secs(),
            planned_secs: playback_duration(state.units()),
            finished: false,
            user_id,
        }
    }
}

#[derive(Serialize)]
struct UnitRecordBody<'a> {
    session_id: RecordId,
    #[serde(flatten)]
    record: &'a UnitRecord,
}

/// Keeps one run's session record and unit records in step with the controller.
///
/// The owner calls [`record_mark`](Self::record_mark) after each completion
/// or omission and [`record_progress`](Self::record_progress) on every
/// heartbeat. The same recorder is handed to the finalizer, which turns the
/// in-progress record into the final summary.
pub struct SessionRecorder {
    store: Arc<dyn EntityStore>,
    user_id: Option<String>,
    session: Option<RecordId>,
    units: BTreeMap<usize, RecordId>,
    queued_progress: Option<ProgressBody>,
    queued_units: BTreeMap<usize, UnitRecord>,
    uploaded_video: Option<MediaLink>,
    sealed: bool,
}

impl SessionRecorder {
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, user_id: Option<String>) -> Self {
        Self {
            store,
            user_id,
            session: None,
            units: BTreeMap::new(),
            queued_progress: None,
            queued_units: BTreeMap::new(),
            uploaded_video: None,
            sealed: false,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// The session record of the current run, once it has been written.
    #[must_use]
    pub fn session_record(&self) -> Option<RecordId> {
        self.session
    }

    #[must_use]
    pub fn unit_record(&self, index: usize) -> Option<RecordId> {
        self.units.get(&index).copied()
    }

    /// Writes waiting for a retry.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        usize::from(self.queued_progress.is_some()) + self.queued_units.len()
    }

    /// Whether the final summary has been written; progress is no longer recorded.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Start recording a freshly started run. Anything known about an earlier
    /// run is forgotten; its records stay in the store as they are.
    pub async fn begin(&mut self, controller: &PlaybackController) -> usize {
        self.session = None;
        self.units.clear();
        self.queued_progress = None;
        self.queued_units.clear();
        self.uploaded_video = None;
        self.sealed = false;
        self.record_progress(controller).await
    }

    /// Save the session counters and elapsed time. Returns the number of
    /// writes still waiting for a retry.
    pub async fn record_progress(&mut self, controller: &PlaybackController) -> usize {
        if self.sealed {
            debug!("session already finalized, progress not recorded");
            return self.pending_writes();
        }
        self.queued_progress = Some(ProgressBody::of(controller, self.user_id.clone()));
        self.flush().await
    }

    /// Save the outcome of unit `index` together with the session counters.
    pub async fn record_mark(&mut self, controller: &PlaybackController, index: usize) -> usize {
        if self.sealed {
            debug!(index, "session already finalized, mark not recorded");
            return self.pending_writes();
        }
        if let Some(record) = controller.state().records().get(&index) {
            self.queued_units.insert(index, record.clone());
        }
        self.record_progress(controller).await
    }

    /// Retry queued writes. Unit records wait until the session record exists.
    pub async fn flush(&mut self) -> usize {
        if let Some(progress) = self.queued_progress.take() {
            match self.write_session(&progress).await {
                Ok(id) => debug!(
                    session = %id,
                    elapsed_secs = progress.elapsed_secs,
                    "session progress saved"
                ),
                Err(error) => {
                    warn!(%error, "session progress not saved, will retry");
                    self.queued_progress = Some(progress);
                }
            }
        }

        if let Some(session) = self.session {
            for (index, record) in std::mem::take(&mut self.queued_units) {
                if let Err(error) = self.write_unit(session, &record).await {
                    warn!(index, %error, "unit record not saved, will retry");
                    self.queued_units.insert(index, record);
                }
            }
        }
        self.pending_writes()
    }

    pub(crate) fn uploaded_video(&self) -> Option<&MediaLink> {
        self.uploaded_video.as_ref()
    }

    pub(crate) fn remember_upload(&mut self, link: MediaLink) {
        self.uploaded_video = Some(link);
    }

    /// Write the closing session record and every unit outcome.
    ///
    /// Queued progress is superseded. After an error, calling it again
    /// updates the records already written instead of adding new ones.
    pub(crate) async fn write_final(
        &mut self,
        body: &(impl Serialize + Sync),
        records: &[UnitRecord],
    ) -> Result<(RecordId, Vec<RecordId>), StorageError> {
        self.queued_progress = None;
        let session = self.write_session(body).await?;

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            ids.push(self.write_unit(session, record).await?);
            self.queued_units.remove(&record.index);
        }
        self.queued_units.clear();
        self.sealed = true;
        Ok((session, ids))
    }

    async fn write_session(
        &mut self,
        body: &(impl Serialize + Sync),
    ) -> Result<RecordId, StorageError> {
        let value = serde_json::to_value(body)?;
        match self.session {
            Some(id) => Ok(self
                .store
                .update(EntityKind::SessionRecord, id, value)
                .await?
                .id),
            None => {
                let stored = self.store.create(EntityKind::SessionRecord, value).await?;
                self.session = Some(stored.id);
                Ok(stored.id)
            }
        }
    }

    async fn write_unit(
        &mut self,
        session: RecordId,
        record: &UnitRecord,
    ) -> Result<RecordId, StorageError> {
        let value = serde_json::to_value(UnitRecordBody {
            session_id: session,
            record,
        })?;
        match self.units.get(&record.index).copied() {
            Some(id) => Ok(self.store.update(EntityKind::UnitRecord, id, value).await?.id),
            None => {
                let stored = self.store.create(EntityKind::UnitRecord, value).await?;
                self.units.insert(record.index, stored.id);
                Ok(stored.id)
            }
        }
    }
}

impl fmt::Debug for SessionRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRecorder")
            .field("user_id", &self.user_id)
            .field("session", &self.session)
            .field("units", &self.units.len())
            .field("pending_writes", &self.pending_writes())
            .field("sealed", &self.sealed)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
