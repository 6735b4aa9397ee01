//! Turning a session template into an ordered list of playable steps.

use std::collections::HashSet;

use crate::model::{BlockCode, PlaybackUnit, SessionTemplate, Step, UnitOrigin};
use crate::shuffle::{RandomSource, resolve_play_order};

/// Default ordering: standalone blocks (those not referenced by any round) in
/// template order, followed by every round in template order.
///
/// Announcement blocks keep their slot; they are only excluded from duration math.
#[must_use]
pub fn build_default_sequence(template: &SessionTemplate) -> Vec<Step> {
    let in_round: HashSet<&BlockCode> = template
        .rounds()
        .iter()
        .flat_map(|r| r.block_codes.iter())
        .collect();

    let standalone = template
        .blocks()
        .iter()
        .filter(|b| !in_round.contains(&b.code))
        .map(|b| Step::Block(b.code.clone()));
    let rounds = template.rounds().iter().map(|r| Step::Round(r.id.clone()));

    standalone.chain(rounds).collect()
}

/// The template's stored sequence when it has one, the default ordering otherwise.
#[must_use]
pub fn sequence_for(template: &SessionTemplate) -> Vec<Step> {
    if template.explicit_sequence().is_empty() {
        build_default_sequence(template)
    } else {
        template.explicit_sequence().to_vec()
    }
}

/// Linearize the template's sequence into individual playback units.
///
/// Rounds expand once per effective repetition, with the block order resolved
/// independently for each repetition. References to missing blocks or rounds
/// are skipped.
pub fn expand_sequence(template: &SessionTemplate, rng: &mut dyn RandomSource) -> Vec<PlaybackUnit> {
    expand_steps(template, &sequence_for(template), rng)
}

/// Same as [`expand_sequence`] for an already resolved step list.
pub fn expand_steps(
    template: &SessionTemplate,
    steps: &[Step],
    rng: &mut dyn RandomSource,
) -> Vec<PlaybackUnit> {
    let mut units = Vec::new();
    for step in steps {
        match step {
            Step::Block(code) => {
                if let Some(block) = template.block(code) {
                    units.push(PlaybackUnit::standalone(block.clone()));
                }
            }
            Step::Round(id) => {
                let Some(round) = template.round(id) else {
                    continue;
                };
                let total = round.effective_repetitions();
                for repetition in 1..=total {
                    for code in resolve_play_order(round, rng) {
                        if let Some(block) = template.block(&code) {
                            units.push(PlaybackUnit {
                                block: block.clone(),
                                origin: UnitOrigin::Round {
                                    round_id: round.id.clone(),
                                    repetition,
                                    total_repetitions: total,
                                },
                            });
                        }
                    }
                }
            }
        }
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, BlockKind, Round, RoundId, TemplateDraft};
    use crate::shuffle::ThreadRandom;

    fn scenario_a() -> SessionTemplate {
        TemplateDraft::new("Scenario A")
            .block(Block::new("A", BlockKind::Tc, 10))
            .block(Block::new("B", BlockKind::Tc, 5))
            .block(Block::new("C", BlockKind::Tm, 15))
            .round(Round::new("r1", vec!["A".into(), "C".into()]).with_repetitions(2))
            .into_template()
            .unwrap()
    }

    #[test]
    fn default_sequence_puts_standalone_blocks_before_rounds() {
        let steps = build_default_sequence(&scenario_a());
        assert_eq!(
            steps,
            vec![Step::Block("B".into()), Step::Round(RoundId::new("r1"))]
        );
    }

    #[test]
    fn announcement_blocks_keep_their_slot() {
        let template = TemplateDraft::new("With rest")
            .block(Block::new("W", BlockKind::Ca, 60))
            .block(Block::new("REST", BlockKind::Ad, 30))
            .into_template()
            .unwrap();
        assert_eq!(
            build_default_sequence(&template),
            vec![Step::Block("W".into()), Step::Block("REST".into())]
        );
    }

    #[test]
    fn explicit_sequence_wins_when_present() {
        let explicit = vec![Step::Round(RoundId::new("r1")), Step::Block("B".into())];
        let template = scenario_a().with_explicit_sequence(explicit.clone());
        assert_eq!(sequence_for(&template), explicit);

        let template = template.with_explicit_sequence(Vec::new());
        assert_eq!(sequence_for(&template), build_default_sequence(&scenario_a()));
    }

    #[test]
    fn every_block_is_covered_exactly_once() {
        let template = TemplateDraft::new("Coverage")
            .block(Block::new("A", BlockKind::Ca, 10))
            .block(Block::new("B", BlockKind::Cb, 10))
            .block(Block::new("C", BlockKind::Tc, 10))
            .block(Block::new("D", BlockKind::Ad, 10))
            .round(Round::new("x", vec!["B".into(), "D".into()]))
            .into_template()
            .unwrap();

        let steps = build_default_sequence(&template);
        for block in template.blocks() {
            let standalone = steps
                .iter()
                .filter(|s| **s == Step::Block(block.code.clone()))
                .count();
            let via_rounds = steps
                .iter()
                .filter(|s| match s {
                    Step::Round(id) => template.round(id).is_some_and(|r| r.contains(&block.code)),
                    Step::Block(_) => false,
                })
                .count();
            assert_eq!(standalone + via_rounds, 1, "block {}", block.code);
        }
    }

    #[test]
    fn expansion_repeats_rounds_and_tags_units() {
        let mut rng = ThreadRandom;
        let units = expand_sequence(&scenario_a(), &mut rng);
        let codes: Vec<_> = units.iter().map(|u| u.code().as_str()).collect();
        assert_eq!(codes, vec!["B", "A", "C", "A", "C"]);
        assert_eq!(
            units[3].origin,
            UnitOrigin::Round {
                round_id: RoundId::new("r1"),
                repetition: 2,
                total_repetitions: 2,
            }
        );
    }

    #[test]
    fn expansion_skips_dangling_references() {
        let template = TemplateDraft::new("Dangling")
            .block(Block::new("A", BlockKind::Ca, 10))
            .round(Round::new("r1", vec!["A".into(), "GONE".into()]))
            .into_template()
            .unwrap()
            .with_explicit_sequence(vec![
                Step::Block("MISSING".into()),
                Step::Round(RoundId::new("r1")),
                Step::Round(RoundId::new("nope")),
            ]);

        let mut rng = ThreadRandom;
        let units = expand_sequence(&template, &mut rng);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].round_id(), Some(&RoundId::new("r1")));
    }

    #[test]
    fn shuffled_round_reshuffles_each_repetition() {
        let template = TemplateDraft::new("Shuffled")
            .block(Block::new("A", BlockKind::Ca, 10))
            .block(Block::new("B", BlockKind::Ca, 10))
            .round(
                Round::new("r1", vec!["A".into(), "B".into()])
                    .with_repetitions(2)
                    .with_shuffle(true),
            )
            .into_template()
            .unwrap();

        // First repetition draws j == 0 (swap), second draws j == 1 (keep).
        let mut draws = vec![0.0, 0.9].into_iter().cycle();
        let mut rng = move || draws.next().unwrap_or(0.0);
        let units = expand_sequence(&template, &mut rng);
        let codes: Vec<_> = units.iter().map(|u| u.code().as_str()).collect();
        assert_eq!(codes, vec!["B", "A", "A", "B"]);
    }
}
