use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a block inside a session template.
///
/// Codes are authored externally; they are unique within one template.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockCode(String);

impl BlockCode {
    /// Creates a new `BlockCode`
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the underlying code
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Stable identifier of a round.
///
/// Allocated once when a template is imported and carried by the template
/// afterwards. Explicit sequences reference rounds through this id, never
/// through their position.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(String);

impl RoundId {
    /// Creates a new `RoundId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fallback id for a round that arrived without one, derived from its
    /// position at import time.
    #[must_use]
    pub fn positional(index: usize) -> Self {
        Self(format!("r_{index}"))
    }

    /// Allocates a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("r_{}", Uuid::new_v4().simple()))
    }

    /// Returns the underlying id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BlockCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockCode({})", self.0)
    }
}

impl fmt::Debug for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoundId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for BlockCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing an identifier from a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cannot be blank", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for BlockCode {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError { kind: "BlockCode" });
        }
        Ok(BlockCode::new(trimmed))
    }
}

impl FromStr for RoundId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError { kind: "RoundId" });
        }
        Ok(RoundId::new(trimmed))
    }
}

impl From<&str> for BlockCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BlockCode {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for RoundId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_code_display() {
        let code = BlockCode::new("CA-01");
        assert_eq!(code.to_string(), "CA-01");
    }

    #[test]
    fn block_code_from_str_trims() {
        let code: BlockCode = "  TC-2 ".parse().unwrap();
        assert_eq!(code, BlockCode::new("TC-2"));
    }

    #[test]
    fn blank_ids_are_rejected() {
        assert!("   ".parse::<BlockCode>().is_err());
        assert!("".parse::<RoundId>().is_err());
    }

    #[test]
    fn positional_round_id_uses_index() {
        assert_eq!(RoundId::positional(3).as_str(), "r_3");
    }

    #[test]
    fn generated_round_ids_differ() {
        assert_ne!(RoundId::generate(), RoundId::generate());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&RoundId::new("r1")).unwrap();
        assert_eq!(json, "\"r1\"");
    }
}
