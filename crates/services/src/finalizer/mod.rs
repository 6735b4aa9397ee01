//! Turning a finished session into persisted records.

mod hotkeys;

pub use hotkeys::{InputFocus, is_save_shortcut, rating_for_key};

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use practice_core::model::{MediaLink, QualityRating, SessionFeedback, SessionSummary};
use practice_core::settings::PlayerSettings;
use storage::{MediaFile, MediaUploader, RecordId, Storage, UploadContext, UploadOutcome};

use crate::error::FinalizeError;
use crate::sessions::{FinishedSession, SessionEnd, SessionRecorder};

/// What the student submits on the summary screen.
#[derive(Debug, Clone, Default)]
pub struct FinalizeRequest {
    pub rating: QualityRating,
    pub notes: String,
    pub media_links: Vec<MediaLink>,
    pub video: Option<MediaFile>,
    pub context: UploadContext,
}

/// Problems that did not stop the save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeWarning {
    /// The video was dropped; the summary was saved without it.
    UploadFailed { reason: String },
}

#[derive(Debug, Clone)]
pub struct FinalizeReport {
    pub summary: SessionSummary,
    pub session_record: RecordId,
    pub unit_records: Vec<RecordId>,
    pub uploaded_video: Option<MediaLink>,
    pub warnings: Vec<FinalizeWarning>,
}

#[derive(Serialize)]
struct SessionRecordBody<'a> {
    #[serde(flatten)]
    summary: &'a SessionSummary,
    ended_by: SessionEnd,
    pending_count: usize,
    finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

/// Uploads the practice video, then closes the session record and writes its unit records.
#[derive(Clone)]
pub struct SessionFinalizer {
    media: Arc<dyn MediaUploader>,
    grace: Duration,
    upload_timeout: Option<Duration>,
}

impl SessionFinalizer {
    #[must_use]
    pub fn new(media: Arc<dyn MediaUploader>, settings: &PlayerSettings) -> Self {
        Self {
            media,
            grace: settings.finalize_grace(),
            upload_timeout: settings.upload_timeout(),
        }
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, settings: &PlayerSettings) -> Self {
        Self::new(Arc::clone(&storage.media), settings)
    }

    /// Pause between reporting "saved" and leaving.
    #[must_use]
    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Build the summary and persist it through `recorder`.
    ///
    /// The session record the recorder kept up to date while the session ran
    /// becomes the summary; without one, it is created here. A failed upload
    /// is reported as a warning and the summary is saved without the video.
    ///
    /// Retrying with the same recorder after an error never duplicates
    /// records and never uploads a video twice.
    ///
    /// # Errors
    ///
    /// Returns `FinalizeError::Summary` if the session counters are inconsistent
    /// and `FinalizeError::Storage` if a record cannot be written.
    pub async fn finalize(
        &self,
        session: &FinishedSession,
        request: FinalizeRequest,
        recorder: &mut SessionRecorder,
    ) -> Result<FinalizeReport, FinalizeError> {
        let FinalizeRequest {
            rating,
            notes,
            mut media_links,
            video,
            context,
        } = request;

        let mut warnings = Vec::new();
        let mut uploaded_video = recorder.uploaded_video().cloned();
        match video {
            Some(file) if uploaded_video.is_some() => {
                debug!(file = %file.file_name, "video already uploaded");
            }
            Some(file) if context.can_upload() => match self.upload(&file, &context).await {
                Ok(link) => {
                    recorder.remember_upload(link.clone());
                    uploaded_video = Some(link);
                }
                Err(reason) => {
                    warn!(file = %file.file_name, %reason, "video upload failed, saving without it");
                    warnings.push(FinalizeWarning::UploadFailed { reason });
                }
            },
            Some(file) => debug!(file = %file.file_name, "no user for upload, video skipped"),
            None => {}
        }
        if let Some(link) = &uploaded_video {
            if !media_links.contains(link) {
                media_links.push(link.clone());
            }
        }

        let summary = SessionSummary::new(
            session.template_name.clone(),
            session.started_at,
            session.finished_at,
            session.tally(),
            SessionFeedback {
                rating,
                notes,
                media_links,
            },
        )?;

        let user_id = context
            .user_id
            .clone()
            .or_else(|| recorder.user_id().map(str::to_owned));
        let body = SessionRecordBody {
            summary: &summary,
            ended_by: session.end,
            pending_count: session.pending,
            finished: true,
            user_id: user_id.as_deref(),
        };
        let (session_record, unit_records) =
            recorder.write_final(&body, &session.records).await?;

        info!(
            session = %session_record,
            units = unit_records.len(),
            rating = summary.quality_rating().value(),
            "session summary persisted"
        );
        Ok(FinalizeReport {
            summary,
            session_record,
            unit_records,
            uploaded_video,
            warnings,
        })
    }

    /// [`finalize`](Self::finalize), then signal "saved" and wait out the grace period.
    ///
    /// # Errors
    ///
    /// Same as `finalize`; nothing is awaited on failure.
    pub async fn finalize_and_exit(
        &self,
        session: &FinishedSession,
        request: FinalizeRequest,
        recorder: &mut SessionRecorder,
    ) -> Result<FinalizeReport, FinalizeError> {
        let report = self.finalize(session, request, recorder).await?;
        info!(session = %report.session_record, "saved");
        tokio::time::sleep(self.grace).await;
        Ok(report)
    }

    async fn upload(&self, file: &MediaFile, context: &UploadContext) -> Result<MediaLink, String> {
        let attempt = self.media.upload(file, context);
        let outcome = match self.upload_timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .map_err(|_| format!("timed out after {}s", limit.as_secs()))?,
            None => attempt.await,
        };
        match outcome {
            UploadOutcome::Uploaded { url } => MediaLink::parse(&url).map_err(|e| e.to_string()),
            UploadOutcome::Failed { error } => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use practice_core::model::{BlockCode, BlockKind, UnitRecord, UnitStatus};
    use practice_core::time::fixed_now;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage::{
        EntityKind, EntityStore, InMemoryStore, InMemoryUploader, StorageError, StoredRecord,
    };

    fn unit(index: usize, code: &str, status: UnitStatus) -> UnitRecord {
        UnitRecord {
            index,
            code: BlockCode::new(code),
            kind: BlockKind::Tc,
            status,
            target_secs: 60,
            actual_secs: 40,
        }
    }

    fn finished() -> FinishedSession {
        FinishedSession {
            template_name: "Scales".into(),
            started_at: fixed_now(),
            finished_at: fixed_now() + chrono::Duration::seconds(300),
            end: SessionEnd::Completed,
            total_units: 3,
            completed: 2,
            omitted: 1,
            pending: 0,
            elapsed_secs: 300,
            planned_secs: 240,
            records: vec![
                unit(0, "A", UnitStatus::Completed),
                unit(1, "B", UnitStatus::Omitted),
                unit(2, "C", UnitStatus::Completed),
            ],
        }
    }

    fn finalizer(uploader: InMemoryUploader) -> SessionFinalizer {
        SessionFinalizer::new(Arc::new(uploader), &PlayerSettings::default())
    }

    fn recorder(store: Arc<dyn EntityStore>) -> SessionRecorder {
        SessionRecorder::new(store, None)
    }

    fn video() -> MediaFile {
        MediaFile::new("take.webm", "video/webm", vec![0; 16])
    }

    /// Store whose `create` fails once, on the given call.
    struct FlakyStore {
        inner: InMemoryStore,
        creates: AtomicUsize,
        fail_on: usize,
    }

    impl FlakyStore {
        fn failing_create(fail_on: usize) -> Self {
            Self {
                inner: InMemoryStore::new(),
                creates: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl EntityStore for FlakyStore {
        async fn create(&self, kind: EntityKind, record: Value) -> Result<StoredRecord, StorageError> {
            if self.creates.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
                return Err(StorageError::Connection("write dropped".into()));
            }
            self.inner.create(kind, record).await
        }

        async fn update(
            &self,
            kind: EntityKind,
            id: RecordId,
            patch: Value,
        ) -> Result<StoredRecord, StorageError> {
            self.inner.update(kind, id, patch).await
        }

        async fn delete(&self, kind: EntityKind, id: RecordId) -> Result<(), StorageError> {
            self.inner.delete(kind, id).await
        }

        async fn get(&self, kind: EntityKind, id: RecordId) -> Result<StoredRecord, StorageError> {
            self.inner.get(kind, id).await
        }
    }

    #[tokio::test]
    async fn uploaded_video_is_linked() {
        let store = InMemoryStore::new();
        let finalizer = finalizer(InMemoryUploader::new());
        let request = FinalizeRequest {
            video: Some(video()),
            context: UploadContext::for_user("u-1"),
            ..FinalizeRequest::default()
        };

        let report = finalizer
            .finalize(&finished(), request, &mut recorder(Arc::new(store.clone())))
            .await
            .unwrap();
        assert!(report.warnings.is_empty());
        let link = report.uploaded_video.unwrap();
        assert_eq!(report.summary.media_links(), &[link]);
        assert_eq!(report.summary.quality_rating(), QualityRating::Good);
        assert_eq!(store.list(EntityKind::UnitRecord).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn video_without_user_is_not_uploaded() {
        let store = InMemoryStore::new();
        let uploader = InMemoryUploader::new();
        let finalizer = finalizer(uploader.clone());
        let request = FinalizeRequest {
            video: Some(video()),
            ..FinalizeRequest::default()
        };

        let report = finalizer
            .finalize(&finished(), request, &mut recorder(Arc::new(store)))
            .await
            .unwrap();
        assert!(uploader.uploads().is_empty());
        assert!(report.warnings.is_empty());
        assert!(report.summary.media_links().is_empty());
    }

    #[tokio::test]
    async fn invalid_upload_url_is_a_warning() {
        let store = InMemoryStore::new();
        let finalizer = finalizer(InMemoryUploader::with_base_url("not a url"));
        let request = FinalizeRequest {
            video: Some(video()),
            context: UploadContext::for_user("u-1"),
            ..FinalizeRequest::default()
        };

        let report = finalizer
            .finalize(&finished(), request, &mut recorder(Arc::new(store.clone())))
            .await
            .unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.uploaded_video.is_none());
        assert_eq!(store.list(EntityKind::SessionRecord).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn inconsistent_counts_are_rejected_before_writing() {
        let store = InMemoryStore::new();
        let finalizer = finalizer(InMemoryUploader::new());
        let mut session = finished();
        session.completed = 5;

        let err = finalizer
            .finalize(
                &session,
                FinalizeRequest::default(),
                &mut recorder(Arc::new(store.clone())),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FinalizeError::Summary(_)));
        assert!(store.list(EntityKind::SessionRecord).unwrap().is_empty());
    }

    #[tokio::test]
    async fn retry_after_partial_write_adds_no_duplicates() {
        let store = Arc::new(FlakyStore::failing_create(2));
        let uploader = InMemoryUploader::new();
        let finalizer = finalizer(uploader.clone());
        let mut recorder = recorder(store.clone());
        let request = FinalizeRequest {
            video: Some(video()),
            context: UploadContext::for_user("u-1"),
            ..FinalizeRequest::default()
        };

        let err = finalizer
            .finalize(&finished(), request.clone(), &mut recorder)
            .await
            .unwrap_err();
        assert!(matches!(err, FinalizeError::Storage(_)));
        assert_eq!(store.inner.list(EntityKind::SessionRecord).unwrap().len(), 1);
        assert!(!recorder.is_sealed());

        let report = finalizer
            .finalize(&finished(), request, &mut recorder)
            .await
            .unwrap();
        assert_eq!(store.inner.list(EntityKind::SessionRecord).unwrap().len(), 1);
        assert_eq!(store.inner.list(EntityKind::UnitRecord).unwrap().len(), 3);
        assert_eq!(report.unit_records.len(), 3);
        assert_eq!(uploader.uploads().len(), 1, "video uploaded once");
        assert_eq!(report.summary.media_links().len(), 1);
        assert!(recorder.is_sealed());
    }

    #[tokio::test]
    async fn finalizing_again_updates_the_same_records() {
        let store = InMemoryStore::new();
        let mut recorder = recorder(Arc::new(store.clone()));
        let finalizer = finalizer(InMemoryUploader::new());

        let first = finalizer
            .finalize(&finished(), FinalizeRequest::default(), &mut recorder)
            .await
            .unwrap();
        let request = FinalizeRequest {
            rating: QualityRating::Excellent,
            ..FinalizeRequest::default()
        };
        let second = finalizer
            .finalize(&finished(), request, &mut recorder)
            .await
            .unwrap();

        assert_eq!(first.session_record, second.session_record);
        assert_eq!(first.unit_records, second.unit_records);
        let sessions = store.list(EntityKind::SessionRecord).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].record["finished"], true);
        assert_eq!(sessions[0].record["quality_rating"], 4);
    }

    #[tokio::test(start_paused = true)]
    async fn finalize_and_exit_waits_the_grace_period() {
        let store = InMemoryStore::new();
        let finalizer = finalizer(InMemoryUploader::new());
        let before = tokio::time::Instant::now();

        finalizer
            .finalize_and_exit(
                &finished(),
                FinalizeRequest::default(),
                &mut recorder(Arc::new(store)),
            )
            .await
            .unwrap();
        assert!(before.elapsed() >= Duration::from_millis(1500));
    }
}
