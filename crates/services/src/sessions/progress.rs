use practice_core::model::BlockKind;

use super::controller::SessionPhase;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub completed: usize,
    pub omitted: usize,
    pub pending: usize,
    pub current_index: usize,
    pub elapsed_secs: u64,
    pub phase: SessionPhase,
}

/// How the time spent on a unit compares with its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitTiming {
    /// Announcements are never timed.
    Announcement,
    /// Block without a target duration.
    Untimed,
    OnTrack,
    /// Past 85% of the target.
    NearTarget,
    Over { excess_secs: u64 },
}

impl UnitTiming {
    #[must_use]
    pub fn classify(kind: BlockKind, target_secs: u32, actual_secs: u64) -> Self {
        if kind.is_announcement() {
            return UnitTiming::Announcement;
        }
        let target = u64::from(target_secs);
        if target == 0 {
            UnitTiming::Untimed
        } else if actual_secs > target {
            UnitTiming::Over {
                excess_secs: actual_secs - target,
            }
        } else if actual_secs * 100 > target * 85 {
            UnitTiming::NearTarget
        } else {
            UnitTiming::OnTrack
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_thresholds() {
        assert_eq!(UnitTiming::classify(BlockKind::Tc, 100, 85), UnitTiming::OnTrack);
        assert_eq!(UnitTiming::classify(BlockKind::Tc, 100, 86), UnitTiming::NearTarget);
        assert_eq!(UnitTiming::classify(BlockKind::Tc, 100, 100), UnitTiming::NearTarget);
        assert_eq!(
            UnitTiming::classify(BlockKind::Tc, 100, 130),
            UnitTiming::Over { excess_secs: 30 }
        );
    }

    #[test]
    fn announcements_and_untimed_blocks() {
        assert_eq!(UnitTiming::classify(BlockKind::Ad, 30, 500), UnitTiming::Announcement);
        assert_eq!(UnitTiming::classify(BlockKind::Vc, 0, 500), UnitTiming::Untimed);
    }
}
