use serde::{Deserialize, Serialize};

use crate::model::ids::{BlockCode, RoundId};

/// A repeated, optionally shuffled group of block references.
///
/// `block_codes` may repeat a code and may reference codes that are missing
/// from the template; both are tolerated during playback and duration math.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub block_codes: Vec<BlockCode>,
    pub repetitions: i32,
    pub shuffle: bool,
}

impl Round {
    #[must_use]
    pub fn new(id: impl Into<RoundId>, block_codes: Vec<BlockCode>) -> Self {
        Self {
            id: id.into(),
            block_codes,
            repetitions: 1,
            shuffle: false,
        }
    }

    #[must_use]
    pub fn with_repetitions(mut self, repetitions: i32) -> Self {
        self.repetitions = repetitions;
        self
    }

    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Repetition count with unset or non-positive values floored to 1.
    #[must_use]
    pub fn effective_repetitions(&self) -> u32 {
        u32::try_from(self.repetitions).unwrap_or(0).max(1)
    }

    #[must_use]
    pub fn contains(&self, code: &BlockCode) -> bool {
        self.block_codes.contains(code)
    }
}

/// Round as authored, before an id has been allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RoundId>,
    #[serde(default)]
    pub block_codes: Vec<BlockCode>,
    #[serde(default = "default_repetitions")]
    pub repetitions: i32,
    #[serde(default)]
    pub shuffle: bool,
}

fn default_repetitions() -> i32 {
    1
}

impl RoundDraft {
    #[must_use]
    pub fn new(block_codes: Vec<BlockCode>) -> Self {
        Self {
            id: None,
            block_codes,
            repetitions: 1,
            shuffle: false,
        }
    }

    pub(crate) fn into_round(self, id: RoundId) -> Round {
        Round {
            id,
            block_codes: self.block_codes,
            repetitions: self.repetitions,
            shuffle: self.shuffle,
        }
    }
}

impl From<Round> for RoundDraft {
    fn from(round: Round) -> Self {
        Self {
            id: Some(round.id),
            block_codes: round.block_codes,
            repetitions: round.repetitions,
            shuffle: round.shuffle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_repetitions_floor_to_one() {
        let round = Round::new("r1", vec![]);
        assert_eq!(round.with_repetitions(0).effective_repetitions(), 1);
        let round = Round::new("r1", vec![]).with_repetitions(-4);
        assert_eq!(round.effective_repetitions(), 1);
        let round = Round::new("r1", vec![]).with_repetitions(3);
        assert_eq!(round.effective_repetitions(), 3);
    }

    #[test]
    fn draft_defaults_repetitions_when_missing() {
        let draft: RoundDraft = serde_json::from_str(r#"{"block_codes":["A"]}"#).unwrap();
        assert_eq!(draft.repetitions, 1);
        assert!(draft.id.is_none());
        assert!(!draft.shuffle);
    }
}
