//! Registration rules
//!
//! Each check is a small function over already-fetched facts, applied in a
//! fixed order by the contest; the first failing check decides the rejection.

use serde::Serialize;
use thiserror::Error;

use crate::core::config::SiegeConfig;
use crate::core::types::{FactionId, Role, StrongholdId};
use crate::services::faction::FactionInfo;
use crate::siege::roster::Roster;

/// Why a player request was turned down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum Rejection {
    #[error("registration is closed")]
    RegistrationClosed,

    #[error("unknown faction")]
    UnknownFaction,

    #[error("faction level {level} is below the required {required}")]
    LevelTooLow { level: u32, required: u32 },

    #[error("faction has {members} members, {required} required")]
    NotEnoughMembers { members: u32, required: u32 },

    #[error("faction already owns stronghold {0}")]
    OwnsStronghold(StrongholdId),

    #[error("faction is registered for stronghold {0} on the same day")]
    AlreadyRegisteredSameDay(StrongholdId),

    #[error("faction is already registered")]
    AlreadyRegistered,

    #[error("the stronghold has no owner to defend it")]
    NpcHeld,

    #[error("attacker limit of {0} reached")]
    AttackerCapReached(usize),

    #[error("defender limit of {0} reached")]
    DefenderCapReached(usize),

    #[error("allied faction {0} is registered on the opposing side")]
    AllianceConflict(FactionId),

    #[error("faction is not registered")]
    NotRegistered,

    #[error("faction is not awaiting approval")]
    NotPending,

    #[error("only the owner may do this")]
    NotOwner,

    #[error("only the faction leader may do this")]
    NotLeader,

    #[error("no battle is in progress")]
    BattleNotInProgress,

    #[error("a battle is already in progress")]
    BattleInProgress,

    #[error("banner limit of {0} reached")]
    BannerLimit(usize),

    #[error("faction is not fighting in this battle")]
    NotCombatant,

    #[error("faction is not attacking")]
    NotAttacker,

    #[error("hired guard limit of {0} reached")]
    HireCapReached(usize),
}

/// Side a faction asks to join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Attacker,
    Defender,
}

impl Side {
    /// Role the faction lands in
    pub fn initial_role(self) -> Role {
        match self {
            Side::Attacker => Role::Attacker,
            Side::Defender => Role::PendingDefender,
        }
    }
}

/// Facts about a faction that live outside the contest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Standing {
    /// Stronghold the faction owns, if any
    pub owns: Option<StrongholdId>,
    /// Another contest on the same calendar day the faction is registered in
    pub same_day: Option<StrongholdId>,
}

pub fn check_window(registration_closed: bool, in_progress: bool) -> Result<(), Rejection> {
    if registration_closed || in_progress {
        Err(Rejection::RegistrationClosed)
    } else {
        Ok(())
    }
}

pub fn check_faction<'a>(info: Option<&'a FactionInfo>, config: &SiegeConfig) -> Result<&'a FactionInfo, Rejection> {
    let info = info.ok_or(Rejection::UnknownFaction)?;
    if info.level < config.min_faction_level {
        return Err(Rejection::LevelTooLow {
            level: info.level,
            required: config.min_faction_level,
        });
    }
    if info.member_count < config.min_faction_members {
        return Err(Rejection::NotEnoughMembers {
            members: info.member_count,
            required: config.min_faction_members,
        });
    }
    Ok(info)
}

pub fn check_standing(standing: &Standing) -> Result<(), Rejection> {
    if let Some(owned) = standing.owns {
        return Err(Rejection::OwnsStronghold(owned));
    }
    if let Some(other) = standing.same_day {
        return Err(Rejection::AlreadyRegisteredSameDay(other));
    }
    Ok(())
}

pub fn check_not_registered(roster: &Roster, faction: FactionId) -> Result<(), Rejection> {
    if roster.contains(faction) {
        Err(Rejection::AlreadyRegistered)
    } else {
        Ok(())
    }
}

pub fn check_capacity(roster: &Roster, side: Side, config: &SiegeConfig) -> Result<(), Rejection> {
    match side {
        Side::Attacker if roster.attacker_count() >= config.attacker_cap => {
            Err(Rejection::AttackerCapReached(config.attacker_cap))
        }
        Side::Defender if roster.defender_count() >= config.defender_cap => {
            Err(Rejection::DefenderCapReached(config.defender_cap))
        }
        _ => Ok(()),
    }
}

/// No ally may sit on the opposite side; pending defenders count as
/// defenders and so does the owner, registered or not
pub fn check_alliance(
    roster: &Roster,
    side: Side,
    allies: &[FactionId],
    owner: Option<FactionId>,
) -> Result<(), Rejection> {
    let conflict = allies.iter().copied().find(|ally| match (side, roster.role(*ally)) {
        (Side::Attacker, _) if Some(*ally) == owner => true,
        (Side::Attacker, Some(role)) => role != Role::Attacker,
        (Side::Defender, Some(role)) => role == Role::Attacker,
        (_, None) => false,
    });
    match conflict {
        Some(ally) => Err(Rejection::AllianceConflict(ally)),
        None => Ok(()),
    }
}
