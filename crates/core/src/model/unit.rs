use serde::{Deserialize, Serialize};

use crate::model::block::{Block, BlockKind};
use crate::model::ids::{BlockCode, RoundId};

/// Where a playback unit came from in the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum UnitOrigin {
    Standalone,
    Round {
        round_id: RoundId,
        /// 1-based repetition number.
        repetition: u32,
        total_repetitions: u32,
    },
}

/// One playable occurrence of a block.
///
/// A round with three repetitions of two blocks yields six units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackUnit {
    pub block: Block,
    pub origin: UnitOrigin,
}

impl PlaybackUnit {
    #[must_use]
    pub fn standalone(block: Block) -> Self {
        Self {
            block,
            origin: UnitOrigin::Standalone,
        }
    }

    #[must_use]
    pub fn code(&self) -> &BlockCode {
        &self.block.code
    }

    #[must_use]
    pub fn round_id(&self) -> Option<&RoundId> {
        match &self.origin {
            UnitOrigin::Standalone => None,
            UnitOrigin::Round { round_id, .. } => Some(round_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Completed,
    Omitted,
}

/// Outcome recorded for a single unit when the student completes or skips it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub index: usize,
    pub code: BlockCode,
    pub kind: BlockKind,
    pub status: UnitStatus,
    pub target_secs: u32,
    pub actual_secs: u64,
}

impl UnitRecord {
    /// Builds a record for `unit`; announcement blocks never log practice time.
    #[must_use]
    pub fn new(index: usize, unit: &PlaybackUnit, status: UnitStatus, actual_secs: u64) -> Self {
        let actual_secs = match status {
            UnitStatus::Completed if !unit.block.kind.is_announcement() => actual_secs,
            _ => 0,
        };
        Self {
            index,
            code: unit.block.code.clone(),
            kind: unit.block.kind,
            status,
            target_secs: unit.block.duration_secs,
            actual_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_records_zero_actual_time() {
        let unit = PlaybackUnit::standalone(Block::new("AD", BlockKind::Ad, 30));
        let record = UnitRecord::new(0, &unit, UnitStatus::Completed, 42);
        assert_eq!(record.actual_secs, 0);
        assert_eq!(record.target_secs, 30);
    }

    #[test]
    fn omitted_units_record_zero_actual_time() {
        let unit = PlaybackUnit::standalone(Block::new("TC", BlockKind::Tc, 60));
        let record = UnitRecord::new(2, &unit, UnitStatus::Omitted, 15);
        assert_eq!(record.actual_secs, 0);
        let record = UnitRecord::new(2, &unit, UnitStatus::Completed, 15);
        assert_eq!(record.actual_secs, 15);
    }
}
