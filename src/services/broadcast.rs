//! Participant-facing notifications

use std::fmt;

use serde::Serialize;

use crate::core::types::{FactionId, StrongholdId};

/// Everything the contest tells players about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Announcement {
    RegistrationClosed { stronghold: String },
    BattleStarted { stronghold: String },
    /// Nobody registered to attack; the date moved to the next cycle
    BattleCancelled { stronghold: String },
    TimeRemaining { stronghold: String, seconds: i64 },
    OwnershipSeized { stronghold: String, faction: FactionId },
    Captured { stronghold: String, winner: FactionId },
    Defended { stronghold: String, owner: FactionId },
    Draw { stronghold: String },
    BattleEnded { stronghold: String },
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Announcement::RegistrationClosed { stronghold } => {
                write!(f, "The registration term for the siege of {} has ended", stronghold)
            }
            Announcement::BattleStarted { stronghold } => {
                write!(f, "The siege of {} has begun", stronghold)
            }
            Announcement::BattleCancelled { stronghold } => write!(
                f,
                "The siege of {} has been cancelled: no faction registered to attack",
                stronghold
            ),
            Announcement::TimeRemaining { stronghold, seconds } => {
                if *seconds >= 3600 {
                    write!(f, "{} hour(s) until the siege of {} ends", seconds / 3600, stronghold)
                } else if *seconds >= 60 {
                    write!(f, "{} minute(s) until the siege of {} ends", seconds / 60, stronghold)
                } else {
                    write!(f, "{} second(s) until the siege of {} ends", seconds, stronghold)
                }
            }
            Announcement::OwnershipSeized { stronghold, faction } => {
                write!(f, "Faction {} has taken {}; the siege continues", faction, stronghold)
            }
            Announcement::Captured { stronghold, winner } => {
                write!(f, "Faction {} is victorious in the siege of {}", winner, stronghold)
            }
            Announcement::Defended { stronghold, owner } => {
                write!(f, "Faction {} has defended {}", owner, stronghold)
            }
            Announcement::Draw { stronghold } => {
                write!(f, "The siege of {} has ended in a draw", stronghold)
            }
            Announcement::BattleEnded { stronghold } => {
                write!(f, "The siege of {} has finished", stronghold)
            }
        }
    }
}

pub trait Broadcaster: Send + Sync {
    /// Deliver to the members of the given factions
    fn notify_participants(
        &self,
        stronghold: StrongholdId,
        factions: &[FactionId],
        message: &Announcement,
    );

    /// Deliver to every online player
    fn notify_all(&self, message: &Announcement);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_remaining_units() {
        let hours = Announcement::TimeRemaining { stronghold: "Giran".into(), seconds: 7200 };
        let minutes = Announcement::TimeRemaining { stronghold: "Giran".into(), seconds: 600 };
        let seconds = Announcement::TimeRemaining { stronghold: "Giran".into(), seconds: 10 };
        assert!(hours.to_string().starts_with("2 hour(s)"));
        assert!(minutes.to_string().starts_with("10 minute(s)"));
        assert!(seconds.to_string().starts_with("10 second(s)"));
    }
}
