use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{MediaLink, QualityRating};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SummaryError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("completed ({completed}) + omitted ({omitted}) exceeds total units ({total})")]
    CountMismatch {
        completed: usize,
        omitted: usize,
        total: usize,
    },
}

/// Counters taken from a finished playback run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTally {
    pub total_units: usize,
    pub completed: usize,
    pub omitted: usize,
    pub elapsed_secs: u64,
    pub planned_secs: u64,
}

impl SessionTally {
    /// Units neither completed nor omitted.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.total_units
            .saturating_sub(self.completed)
            .saturating_sub(self.omitted)
    }
}

/// What the student adds when closing a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFeedback {
    pub rating: QualityRating,
    pub notes: String,
    pub media_links: Vec<MediaLink>,
}

/// Rated, annotated record of a completed practice session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    template_name: String,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    total_units: usize,
    completed_count: usize,
    omitted_count: usize,
    elapsed_secs: u64,
    planned_secs: u64,
    quality_rating: QualityRating,
    notes: String,
    media_links: Vec<MediaLink>,
}

impl SessionSummary {
    /// Build a summary from a playback tally and the student's feedback.
    ///
    /// Notes are trimmed.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::InvalidTimeRange` if `completed_at` is before `started_at`.
    /// Returns `SummaryError::CountMismatch` if completed + omitted exceeds the unit count.
    pub fn new(
        template_name: impl Into<String>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        tally: SessionTally,
        feedback: SessionFeedback,
    ) -> Result<Self, SummaryError> {
        if completed_at < started_at {
            return Err(SummaryError::InvalidTimeRange);
        }
        if tally.completed.saturating_add(tally.omitted) > tally.total_units {
            return Err(SummaryError::CountMismatch {
                completed: tally.completed,
                omitted: tally.omitted,
                total: tally.total_units,
            });
        }

        Ok(Self {
            template_name: template_name.into(),
            started_at,
            completed_at,
            total_units: tally.total_units,
            completed_count: tally.completed,
            omitted_count: tally.omitted,
            elapsed_secs: tally.elapsed_secs,
            planned_secs: tally.planned_secs,
            quality_rating: feedback.rating,
            notes: feedback.notes.trim().to_owned(),
            media_links: feedback.media_links,
        })
    }

    #[must_use]
    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn total_units(&self) -> usize {
        self.total_units
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed_count
    }

    #[must_use]
    pub fn omitted_count(&self) -> usize {
        self.omitted_count
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.total_units - self.completed_count - self.omitted_count
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    #[must_use]
    pub fn planned_secs(&self) -> u64 {
        self.planned_secs
    }

    #[must_use]
    pub fn quality_rating(&self) -> QualityRating {
        self.quality_rating
    }

    #[must_use]
    pub fn notes(&self) -> &str {
        &self.notes
    }

    #[must_use]
    pub fn media_links(&self) -> &[MediaLink] {
        &self.media_links
    }
}
