//! Addressing a record's history.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ChronicleError;
use crate::versioning::VersionIndex;

/// A point in a record's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// The live record, synthesized and never persisted.
    Current,
    /// The oldest stored version.
    First,
    /// The newest stored version.
    Last,
    /// Zero-based index into the version list; negative counts from the end.
    Index(i64),
}

impl Position {
    /// Rollback target when none is given: the newest stored version, which
    /// holds the state from before the most recent recorded change.
    pub fn default_rollback(index: &VersionIndex) -> Self {
        Position::Index(i64::from(index.versions_count) - 1)
    }
}

impl From<i64> for Position {
    fn from(index: i64) -> Self {
        Position::Index(index)
    }
}

impl From<usize> for Position {
    fn from(index: usize) -> Self {
        Position::Index(index as i64)
    }
}

impl FromStr for Position {
    type Err = ChronicleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let name = trimmed.trim_start_matches(':');
        match name.to_ascii_lowercase().as_str() {
            "current" => Ok(Position::Current),
            "first" => Ok(Position::First),
            "last" => Ok(Position::Last),
            _ => name
                .parse::<i64>()
                .map(Position::Index)
                .map_err(|_| ChronicleError::invalid_position(trimmed)),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Current => f.write_str("current"),
            Position::First => f.write_str("first"),
            Position::Last => f.write_str("last"),
            Position::Index(i) => write!(f, "{}", i),
        }
    }
}
