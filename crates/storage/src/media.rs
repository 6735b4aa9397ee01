use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A recorded practice video waiting to be uploaded.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    #[must_use]
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Keeps payloads out of logs.
impl fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Who and what an upload belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadContext {
    pub user_id: Option<String>,
    pub session_name: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl UploadContext {
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_session(mut self, name: impl Into<String>) -> Self {
        self.session_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(at);
        self
    }

    /// Uploads are only attempted for an identified user.
    #[must_use]
    pub fn can_upload(&self) -> bool {
        self.user_id.as_deref().is_some_and(|id| !id.trim().is_empty())
    }
}

/// Result reported by an uploader. Transport failures are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { url: String },
    Failed { error: String },
}

#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(&self, file: &MediaFile, context: &UploadContext) -> UploadOutcome;
}

/// Records uploads in memory and hands back predictable URLs.
#[derive(Clone)]
pub struct InMemoryUploader {
    base_url: String,
    failure: Option<String>,
    uploads: Arc<Mutex<Vec<(MediaFile, UploadContext)>>>,
}

impl Default for InMemoryUploader {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUploader {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url("https://media.invalid")
    }

    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            failure: None,
            uploads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// An uploader whose every attempt fails with `error`.
    #[must_use]
    pub fn failing(error: impl Into<String>) -> Self {
        Self {
            failure: Some(error.into()),
            ..Self::new()
        }
    }

    /// Files received so far, oldest first.
    #[must_use]
    pub fn uploads(&self) -> Vec<(MediaFile, UploadContext)> {
        self.uploads
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MediaUploader for InMemoryUploader {
    async fn upload(&self, file: &MediaFile, context: &UploadContext) -> UploadOutcome {
        let mut guard = match self.uploads.lock() {
            Ok(guard) => guard,
            Err(e) => {
                return UploadOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };
        guard.push((file.clone(), context.clone()));

        if let Some(error) = &self.failure {
            return UploadOutcome::Failed {
                error: error.clone(),
            };
        }

        let owner = context.user_id.as_deref().unwrap_or("anonymous");
        let url = format!("{}/{owner}/{}/{}", self.base_url, guard.len(), file.file_name);
        debug!(file = %file.file_name, bytes = file.len(), %url, "media stored");
        UploadOutcome::Uploaded { url }
    }
}
