//! Planned session length.
//!
//! Best-effort math over externally authored templates: unknown codes and
//! announcement blocks contribute nothing, non-positive repetition counts count once.

use crate::model::{PlaybackUnit, Round, SessionTemplate};

/// Planned total in seconds: every non-`AD` block once, plus each round's
/// block sum multiplied by its effective repetitions.
#[must_use]
pub fn planned_duration(template: &SessionTemplate) -> u64 {
    let base: u64 = template.blocks().iter().map(|b| b.counted_secs()).sum();
    let from_rounds: u64 = template
        .rounds()
        .iter()
        .map(|r| round_sum(template, r) * u64::from(r.effective_repetitions()))
        .sum();
    base + from_rounds
}

/// Seconds for a single pass through `round`.
#[must_use]
pub fn round_sum(template: &SessionTemplate, round: &Round) -> u64 {
    round
        .block_codes
        .iter()
        .filter_map(|code| template.block(code))
        .map(|b| b.counted_secs())
        .sum()
}

/// Seconds the expanded playback list is expected to take: every non-`AD`
/// unit once, so round blocks count per repetition and never as standalone.
#[must_use]
pub fn playback_duration(units: &[PlaybackUnit]) -> u64 {
    units.iter().map(|u| u.block.counted_secs()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, BlockKind, RoundDraft, TemplateDraft};
    use crate::sequence::expand_sequence;

    #[test]
    fn scenario_a_totals_fifty_five() {
        let template = TemplateDraft::new("Scenario A")
            .block(Block::new("A", BlockKind::Tc, 10))
            .block(Block::new("B", BlockKind::Tc, 5))
            .block(Block::new("C", BlockKind::Tm, 15))
            .round(Round::new("r1", vec!["A".into(), "C".into()]).with_repetitions(2))
            .into_template()
            .unwrap();

        // Base counts A, B and C once each; the round adds (10 + 15) x 2.
        assert_eq!(planned_duration(&template), 30 + 50);
        assert_eq!(round_sum(&template, &template.rounds()[0]), 25);

        // Played back, A and C only run inside the round: 5 + (10 + 15) x 2.
        let mut rng = || 0.0;
        let units = expand_sequence(&template, &mut rng);
        assert_eq!(playback_duration(&units), 55);
    }

    #[test]
    fn round_math_multiplies_by_repetitions() {
        let template = TemplateDraft::new("Round math")
            .block(Block::new("X", BlockKind::Ca, 10))
            .block(Block::new("Y", BlockKind::Cb, 20))
            .block(Block::new("Z", BlockKind::Fm, 30))
            .round(
                Round::new("r", vec!["X".into(), "Y".into(), "Z".into()]).with_repetitions(3),
            )
            .into_template()
            .unwrap();

        let round = &template.rounds()[0];
        let total = round_sum(&template, round) * u64::from(round.effective_repetitions());
        assert_eq!(total, 180);
    }

    #[test]
    fn announcement_duration_never_matters() {
        let build = |rest_secs: u32| {
            TemplateDraft::new("Rest")
                .block(Block::new("W", BlockKind::Ca, 40))
                .block(Block::new("REST", BlockKind::Ad, rest_secs))
                .round(Round::new("r", vec!["W".into(), "REST".into()]).with_repetitions(2))
                .into_template()
                .unwrap()
        };
        let expected = planned_duration(&build(0));
        for secs in [1, 30, 999, u32::MAX] {
            assert_eq!(planned_duration(&build(secs)), expected);
        }
        assert_eq!(expected, 40 + 80);
    }

    #[test]
    fn unknown_codes_and_bad_repetitions_are_tolerated() {
        let mut draft = RoundDraft::new(vec!["W".into(), "GHOST".into()]);
        draft.repetitions = -2;
        let template = TemplateDraft::new("Tolerant")
            .block(Block::new("W", BlockKind::Ca, 40))
            .round(draft)
            .into_template()
            .unwrap();
        assert_eq!(planned_duration(&template), 40 + 40);
    }

    #[test]
    fn empty_template_is_zero() {
        let template = TemplateDraft::new("Empty").into_template().unwrap();
        assert_eq!(planned_duration(&template), 0);
    }
}
