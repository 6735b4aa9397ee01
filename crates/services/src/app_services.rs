use std::sync::Arc;

use practice_core::model::SessionTemplate;
use practice_core::settings::PlayerSettings;
use storage::{EntityKind, RecordId, Storage};
use tracing::debug;

use crate::Clock;
use crate::error::PlaybackError;
use crate::finalizer::SessionFinalizer;
use crate::metronome::{AudioClock, MetronomeScheduler};
use crate::sessions::{
    ElapsedTicker, ExitCapabilities, PlaybackController, ResumeSnapshot, SessionRecorder,
    progress_heartbeat,
};

/// Assembles the player runtime around one set of collaborators.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    settings: PlayerSettings,
    storage: Storage,
    finalizer: Arc<SessionFinalizer>,
}

impl AppServices {
    #[must_use]
    pub fn new(storage: Storage, settings: PlayerSettings, clock: Clock) -> Self {
        let finalizer = Arc::new(SessionFinalizer::from_storage(&storage, &settings));
        Self {
            clock,
            settings,
            storage,
            finalizer,
        }
    }

    /// Services backed by the in-memory store and uploader.
    #[must_use]
    pub fn in_memory(settings: PlayerSettings, clock: Clock) -> Self {
        Self::new(Storage::in_memory(), settings, clock)
    }

    #[must_use]
    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn finalizer(&self) -> Arc<SessionFinalizer> {
        Arc::clone(&self.finalizer)
    }

    /// A fresh, not yet started session.
    #[must_use]
    pub fn controller(&self, template: SessionTemplate) -> PlaybackController {
        PlaybackController::new(template, &self.settings).with_clock(self.clock)
    }

    /// A session that can only be continued or discarded, never saved.
    #[must_use]
    pub fn try_controller(&self, template: SessionTemplate) -> PlaybackController {
        self.controller(template)
            .with_exit_capabilities(ExitCapabilities::try_mode())
    }

    /// Load saved progress and continue it. The snapshot is consumed.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::Storage` if the snapshot cannot be read or removed,
    /// `PlaybackError::Snapshot` if it cannot be decoded and
    /// `PlaybackError::InvalidSnapshot` if it does not fit `template`.
    pub async fn resume(
        &self,
        template: SessionTemplate,
        snapshot_id: RecordId,
    ) -> Result<PlaybackController, PlaybackError> {
        let stored = self
            .storage
            .entities
            .get(EntityKind::ResumeSnapshot, snapshot_id)
            .await?;
        let snapshot = ResumeSnapshot::from_record(stored.record)?;
        let controller = PlaybackController::resume_from(template, snapshot, &self.settings)?
            .with_clock(self.clock);
        self.storage
            .entities
            .delete(EntityKind::ResumeSnapshot, snapshot_id)
            .await?;
        debug!(snapshot = %snapshot_id, "resume snapshot consumed");
        Ok(controller)
    }

    #[must_use]
    pub fn metronome(&self, clock: Arc<dyn AudioClock>) -> MetronomeScheduler {
        MetronomeScheduler::new(clock, self.settings.metronome())
    }

    #[must_use]
    pub fn ticker(&self) -> ElapsedTicker {
        ElapsedTicker::new()
    }

    /// Timer for periodic progress saves.
    #[must_use]
    pub fn heartbeat(&self) -> ElapsedTicker {
        progress_heartbeat()
    }

    /// Progress recorder writing to the entity store.
    #[must_use]
    pub fn recorder(&self, user_id: Option<String>) -> SessionRecorder {
        SessionRecorder::new(Arc::clone(&self.storage.entities), user_id)
    }
}
