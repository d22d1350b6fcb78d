//! Battle results and reputation
//!
//! The winner is whoever holds the Owner role when the battle ends, compared
//! against the owner captured when it started.

use serde::Serialize;

use crate::core::config::SiegeConfig;
use crate::core::types::FactionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Captured {
        winner: FactionId,
        previous: Option<FactionId>,
    },
    Defended {
        owner: FactionId,
    },
    /// Nobody owns the stronghold afterwards
    Draw,
}

impl Outcome {
    pub fn decide(first_owner: Option<FactionId>, final_owner: Option<FactionId>) -> Self {
        match final_owner {
            Some(owner) if Some(owner) == first_owner => Outcome::Defended { owner },
            Some(winner) => Outcome::Captured {
                winner,
                previous: first_owner,
            },
            None => Outcome::Draw,
        }
    }

    /// Owner after the battle
    pub fn owner(&self) -> Option<FactionId> {
        match self {
            Outcome::Captured { winner, .. } => Some(*winner),
            Outcome::Defended { owner } => Some(*owner),
            Outcome::Draw => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReputationChange {
    Gain(FactionId, u32),
    Loss(FactionId, u32),
}

/// Reputation to apply for `outcome`
///
/// A new owner gains at most what the previous owner actually had to lose.
/// `previous_reputation` is read before any change is applied.
pub fn reputation_changes(outcome: Outcome, previous_reputation: i64, config: &SiegeConfig) -> Vec<ReputationChange> {
    let transfer = config.reputation_transfer;
    match outcome {
        Outcome::Captured {
            winner,
            previous: Some(previous),
        } => {
            let available = u32::try_from(previous_reputation.max(0)).unwrap_or(u32::MAX);
            vec![
                ReputationChange::Loss(previous, transfer),
                ReputationChange::Gain(winner, transfer.min(available)),
            ]
        }
        Outcome::Captured { winner, previous: None } => vec![ReputationChange::Gain(winner, transfer)],
        Outcome::Defended { owner } => vec![ReputationChange::Gain(owner, config.reputation_defended)],
        Outcome::Draw => Vec::new(),
    }
}
