//! Contest phases and the pure transition planner
//!
//! `plan` decides what entering a phase means: which actions to run, which
//! phase follows and when. It reads nothing but its arguments, so the same
//! function serves the timer chain, admin overrides and restart recovery.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::SiegeConfig;
use crate::siege::schedule::roll_forward;
use crate::stronghold::SiegeSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Cooldown,
    RegistrationOpen,
    RegistrationClosed,
    Battle,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Cooldown => "cooldown",
            Phase::RegistrationOpen => "registration open",
            Phase::RegistrationClosed => "registration closed",
            Phase::Battle => "battle",
        };
        f.write_str(name)
    }
}

/// Every deadline of one contest, derived from its date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timeline {
    pub contest_date: DateTime<Utc>,
    pub registration_opens: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    pub battle_end: DateTime<Utc>,
}

impl Timeline {
    pub fn new(contest_date: DateTime<Utc>, config: &SiegeConfig) -> Self {
        Self {
            contest_date,
            registration_opens: contest_date - config.registration_open_lead(),
            registration_deadline: contest_date - config.registration_close_lead(),
            battle_end: contest_date + config.battle_length(),
        }
    }

    /// Phase that should hold at `now`; a stale timeline maps to cooldown,
    /// whose entry rolls the date forward
    pub fn phase_at(&self, now: DateTime<Utc>) -> Phase {
        if now < self.registration_opens {
            Phase::Cooldown
        } else if now < self.registration_deadline {
            Phase::RegistrationOpen
        } else if now < self.contest_date {
            Phase::RegistrationClosed
        } else if now < self.battle_end {
            Phase::Battle
        } else {
            Phase::Cooldown
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now >= self.battle_end
    }

    /// When `phase` hands over to the next one
    pub fn phase_end(&self, phase: Phase) -> DateTime<Utc> {
        match phase {
            Phase::Cooldown => self.registration_opens,
            Phase::RegistrationOpen => self.registration_deadline,
            Phase::RegistrationClosed => self.contest_date,
            Phase::Battle => self.battle_end,
        }
    }
}

/// One step of a phase entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseAction {
    OpenRegistration,
    CloseRegistration,
    BeginBattle { battle_end: DateTime<Utc> },
    ConcludeBattle,
    Reschedule { contest_date: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasePlan {
    pub actions: Vec<PhaseAction>,
    pub next: Phase,
    pub due: DateTime<Utc>,
}

/// Inputs to [`plan`]
#[derive(Debug, Clone, Copy)]
pub struct PlanContext {
    pub timeline: Timeline,
    pub now: DateTime<Utc>,
    pub slot: SiegeSlot,
    pub cycle: Duration,
    /// Phase being left, `None` on startup
    pub from: Option<Phase>,
}

pub fn plan(phase: Phase, ctx: &PlanContext, config: &SiegeConfig) -> PhasePlan {
    let timeline = ctx.timeline;
    match phase {
        Phase::Cooldown => {
            // Leaving a battle consumes its date even if the clock lags behind
            let reference = if ctx.from == Some(Phase::Battle) {
                ctx.now.max(timeline.contest_date)
            } else {
                ctx.now
            };
            let contest_date = roll_forward(timeline.contest_date, reference, ctx.slot, ctx.cycle);
            let next = Timeline::new(contest_date, config);
            let mut actions = vec![PhaseAction::ConcludeBattle];
            actions.push(PhaseAction::Reschedule { contest_date });
            PhasePlan {
                actions,
                next: Phase::RegistrationOpen,
                due: next.registration_opens,
            }
        }
        Phase::RegistrationOpen => PhasePlan {
            actions: vec![PhaseAction::OpenRegistration],
            next: Phase::RegistrationClosed,
            due: timeline.registration_deadline,
        },
        Phase::RegistrationClosed => PhasePlan {
            actions: vec![PhaseAction::CloseRegistration],
            next: Phase::Battle,
            due: timeline.contest_date,
        },
        Phase::Battle => PhasePlan {
            actions: vec![PhaseAction::BeginBattle {
                battle_end: timeline.battle_end,
            }],
            next: Phase::Cooldown,
            due: timeline.battle_end,
        },
    }
}
