//! Vote transition rule shared by every ledger.
//!
//! # Responsibility
//! - Map `(prior vote, requested vote)` to new counters and vote state.
//! - Tell ledgers which vote-record mutation the transition implies.
//!
//! # Invariants
//! - Pure and deterministic; no I/O.
//! - Decrements saturate at zero, increments saturate at `u32::MAX`.
//! - Repeating the same direction toggles the vote off.

use crate::model::vote::{VoteCounts, VoteDirection};

/// Vote-record mutation implied by one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    /// No prior vote; a new record is created.
    Cast,
    /// Same direction repeated; the record is removed.
    Retract,
    /// Opposite direction; the record's direction is changed.
    Switch,
}

/// Result of applying one vote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub counts: VoteCounts,
    /// Device vote after the transition. `None` after a retract.
    pub direction: Option<VoteDirection>,
    pub transition: VoteTransition,
}

/// Applies one vote request to the current counters.
///
/// | prior | requested | counts | new direction |
/// |---|---|---|---|
/// | none | up | up+1 | up |
/// | none | down | down+1 | down |
/// | up | up | up-1 | none |
/// | down | down | down-1 | none |
/// | up | down | up-1, down+1 | down |
/// | down | up | down-1, up+1 | up |
pub fn apply_vote(
    current: VoteCounts,
    prior: Option<VoteDirection>,
    requested: VoteDirection,
) -> VoteOutcome {
    let mut counts = current;
    let transition = match prior {
        None => {
            increment(&mut counts, requested);
            VoteTransition::Cast
        }
        Some(previous) if previous == requested => {
            decrement(&mut counts, requested);
            VoteTransition::Retract
        }
        Some(previous) => {
            decrement(&mut counts, previous);
            increment(&mut counts, requested);
            VoteTransition::Switch
        }
    };

    let direction = match transition {
        VoteTransition::Retract => None,
        VoteTransition::Cast | VoteTransition::Switch => Some(requested),
    };

    VoteOutcome {
        counts,
        direction,
        transition,
    }
}

fn increment(counts: &mut VoteCounts, direction: VoteDirection) {
    match direction {
        VoteDirection::Up => counts.upvotes = counts.upvotes.saturating_add(1),
        VoteDirection::Down => counts.downvotes = counts.downvotes.saturating_add(1),
    }
}

fn decrement(counts: &mut VoteCounts, direction: VoteDirection) {
    match direction {
        VoteDirection::Up => counts.upvotes = counts.upvotes.saturating_sub(1),
        VoteDirection::Down => counts.downvotes = counts.downvotes.saturating_sub(1),
    }
}
