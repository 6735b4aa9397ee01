use serde::{Deserialize, Serialize};

use crate::model::ids::BlockCode;

//
// ─── BLOCK KIND ────────────────────────────────────────────────────────────────
//

/// Category of a practice block.
///
/// `AD` marks announcements and rests: they occupy a playback slot but never
/// count towards planned or actual practice time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockKind {
    Ca,
    Cb,
    Tc,
    Tm,
    Fm,
    Vc,
    Ad,
}

impl BlockKind {
    /// Returns true for announcement/rest blocks.
    #[must_use]
    pub fn is_announcement(self) -> bool {
        matches!(self, BlockKind::Ad)
    }

    /// Two-letter code used by authoring tools.
    #[must_use]
    pub fn as_code(self) -> &'static str {
        match self {
            BlockKind::Ca => "CA",
            BlockKind::Cb => "CB",
            BlockKind::Tc => "TC",
            BlockKind::Tm => "TM",
            BlockKind::Fm => "FM",
            BlockKind::Vc => "VC",
            BlockKind::Ad => "AD",
        }
    }
}

//
// ─── BLOCK ─────────────────────────────────────────────────────────────────────
//

/// Smallest schedulable practice unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub code: BlockCode,
    pub kind: BlockKind,
    #[serde(default)]
    pub duration_secs: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Block {
    #[must_use]
    pub fn new(code: impl Into<BlockCode>, kind: BlockKind, duration_secs: u32) -> Self {
        Self {
            code: code.into(),
            kind,
            duration_secs,
            name: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Seconds this block contributes to practice time (zero for `AD`).
    #[must_use]
    pub fn counted_secs(&self) -> u64 {
        if self.kind.is_announcement() {
            0
        } else {
            u64::from(self.duration_secs)
        }
    }
}
