//! Vote domain model.
//!
//! # Responsibility
//! - Define vote direction and aggregate counter shapes.
//! - Define the persisted per-device vote row.
//!
//! # Invariants
//! - A device holds at most one vote per engram.
//! - Counters are unsigned and therefore never negative.

use crate::model::engram::EngramId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Direction of one device vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// Stable storage value (`up|down`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// Parses the storage value. Unknown values return `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

impl Display for VoteDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate vote counters of one engram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
    pub upvotes: u32,
    pub downvotes: u32,
}

impl VoteCounts {
    pub fn new(upvotes: u32, downvotes: u32) -> Self {
        Self { upvotes, downvotes }
    }
}

/// Persisted vote row of the relational ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: i64,
    pub engram_id: EngramId,
    pub device_id: String,
    pub direction: VoteDirection,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}
