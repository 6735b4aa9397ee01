use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RatingError {
    #[error("quality rating must be between 1 and 4, got {0}")]
    OutOfRange(u8),
}

//
// ─── QUALITY RATING ───────────────────────────────────────────────────────────
//

/// Four-level self-assessment the student gives when a session ends.
///
/// - `VeryHard` (1): the session was a struggle
/// - `Hard` (2): got through it with difficulty
/// - `Good` (3): went well; the default selection
/// - `Excellent` (4): everything clicked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QualityRating {
    VeryHard,
    Hard,
    #[default]
    Good,
    Excellent,
}

impl QualityRating {
    pub const ALL: [QualityRating; 4] = [
        QualityRating::VeryHard,
        QualityRating::Hard,
        QualityRating::Good,
        QualityRating::Excellent,
    ];

    /// Converts a numeric rating (1-4) to a `QualityRating`.
    ///
    /// # Errors
    ///
    /// Returns `RatingError::OutOfRange` if the value is not in 1-4.
    pub fn from_u8(value: u8) -> Result<Self, RatingError> {
        match value {
            1 => Ok(Self::VeryHard),
            2 => Ok(Self::Hard),
            3 => Ok(Self::Good),
            4 => Ok(Self::Excellent),
            _ => Err(RatingError::OutOfRange(value)),
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        match self {
            QualityRating::VeryHard => 1,
            QualityRating::Hard => 2,
            QualityRating::Good => 3,
            QualityRating::Excellent => 4,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            QualityRating::VeryHard => "very hard",
            QualityRating::Hard => "hard",
            QualityRating::Good => "good",
            QualityRating::Excellent => "excellent",
        }
    }
}

impl TryFrom<u8> for QualityRating {
    type Error = RatingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value)
    }
}

impl From<QualityRating> for u8 {
    fn from(rating: QualityRating) -> Self {
        rating.value()
    }
}
