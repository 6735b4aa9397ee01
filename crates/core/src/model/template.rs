use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::block::Block;
use crate::model::ids::{BlockCode, RoundId};
use crate::model::round::{Round, RoundDraft};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateError {
    #[error("block code `{0}` appears more than once")]
    DuplicateBlockCode(BlockCode),

    #[error("round id `{0}` appears more than once")]
    DuplicateRoundId(RoundId),
}

//
// ─── STEP ──────────────────────────────────────────────────────────────────────
//

/// One entry of a session sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ref", rename_all = "snake_case")]
pub enum Step {
    /// A single standalone block.
    Block(BlockCode),
    /// A round, expanded into its blocks at playback time.
    Round(RoundId),
}

//
// ─── TEMPLATE ──────────────────────────────────────────────────────────────────
//

/// A practice session as authored by the instructor.
///
/// Blocks and rounds are immutable once a session starts; a running session
/// owns its own clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TemplateDraft", into = "TemplateDraft")]
pub struct SessionTemplate {
    name: String,
    blocks: Vec<Block>,
    rounds: Vec<Round>,
    explicit_sequence: Vec<Step>,
}

impl SessionTemplate {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[must_use]
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    #[must_use]
    pub fn explicit_sequence(&self) -> &[Step] {
        &self.explicit_sequence
    }

    /// Looks a block up by code.
    #[must_use]
    pub fn block(&self, code: &BlockCode) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.code == code)
    }

    /// Looks a round up by its stable id.
    #[must_use]
    pub fn round(&self, id: &RoundId) -> Option<&Round> {
        self.rounds.iter().find(|r| &r.id == id)
    }

    /// Replaces the stored explicit sequence; an empty list falls back to the
    /// default ordering.
    #[must_use]
    pub fn with_explicit_sequence(mut self, steps: Vec<Step>) -> Self {
        self.explicit_sequence = steps;
        self
    }
}

/// Template as authored or imported; round ids may still be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub rounds: Vec<RoundDraft>,
    #[serde(default, alias = "sequence")]
    pub explicit_sequence: Vec<Step>,
}

impl TemplateDraft {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    #[must_use]
    pub fn round(mut self, round: impl Into<RoundDraft>) -> Self {
        self.rounds.push(round.into());
        self
    }

    #[must_use]
    pub fn sequence(mut self, steps: Vec<Step>) -> Self {
        self.explicit_sequence = steps;
        self
    }

    /// Validate the draft and allocate ids for rounds that have none.
    ///
    /// A missing id becomes `r_{position}`; if another round already claims
    /// that id, a fresh random id is allocated instead. Either way the id is
    /// fixed from here on.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError` on duplicate block codes or duplicate explicit round ids.
    pub fn into_template(self) -> Result<SessionTemplate, TemplateError> {
        let mut codes = HashSet::with_capacity(self.blocks.len());
        for block in &self.blocks {
            if !codes.insert(block.code.clone()) {
                return Err(TemplateError::DuplicateBlockCode(block.code.clone()));
            }
        }

        let mut taken: HashSet<RoundId> = HashSet::with_capacity(self.rounds.len());
        for id in self.rounds.iter().filter_map(|r| r.id.as_ref()) {
            if !taken.insert(id.clone()) {
                return Err(TemplateError::DuplicateRoundId(id.clone()));
            }
        }

        let rounds = self
            .rounds
            .into_iter()
            .enumerate()
            .map(|(index, draft)| {
                let id = match draft.id.clone() {
                    Some(id) => id,
                    None => {
                        let mut candidate = RoundId::positional(index);
                        while taken.contains(&candidate) {
                            candidate = RoundId::generate();
                        }
                        taken.insert(candidate.clone());
                        candidate
                    }
                };
                draft.into_round(id)
            })
            .collect();

        Ok(SessionTemplate {
            name: self.name,
            blocks: self.blocks,
            rounds,
            explicit_sequence: self.explicit_sequence,
        })
    }
}

impl TryFrom<TemplateDraft> for SessionTemplate {
    type Error = TemplateError;

    fn try_from(draft: TemplateDraft) -> Result<Self, Self::Error> {
        draft.into_template()
    }
}

impl From<SessionTemplate> for TemplateDraft {
    fn from(template: SessionTemplate) -> Self {
        Self {
            name: template.name,
            blocks: template.blocks,
            rounds: template.rounds.into_iter().map(RoundDraft::from).collect(),
            explicit_sequence: template.explicit_sequence,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
