//! Shared fixtures for the integration tests
//!
//! Two strongholds fight on the same Sunday evening:
//! - Gludio (1): NPC-held, two control towers, one flame tower, two guards
//! - Dion (2): owned by faction 100, one control tower, one guard
//!
//! Factions 100 and 101 are allied, as are 103 and 104. Faction 105 is too
//! small to register. Every faction's leader is `ActorId(faction * 10)`.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use stronghold_siege::core::clock::ManualClock;
use stronghold_siege::core::config::SiegeConfig;
use stronghold_siege::core::types::{ActorId, FactionId, StrongholdId};
use stronghold_siege::layout::parse_layouts;
use stronghold_siege::services::memory::MemoryServices;
use stronghold_siege::services::store::{ContestSchedule, SiegeStore};
use stronghold_siege::siege::{Contest, Phase, TaskScheduler};
use stronghold_siege::Coordinator;

pub const GLUDIO: StrongholdId = StrongholdId(1);
pub const DION: StrongholdId = StrongholdId(2);

pub const CROWS: FactionId = FactionId(100);
pub const VALE: FactionId = FactionId(101);
pub const TIDE: FactionId = FactionId(102);
pub const WOLVES: FactionId = FactionId(103);
pub const HAWKS: FactionId = FactionId(104);
pub const RUNTS: FactionId = FactionId(105);

pub const CONTROL_TOWER: u32 = 13002;
pub const FLAME_TOWER: u32 = 13004;
pub const GUARD: u32 = 35100;

const SEED: &str = r#"
[[stronghold]]
id = 1
name = "Gludio"
siege_day = "Sun"
siege_hour = 20
bounds = { min = [0.0, 0.0, 0.0], max = [2000.0, 2000.0, 500.0] }
gates = [{ id = 1, open = true, integrity = 1000, max_integrity = 1000 }]

[[stronghold]]
id = 2
name = "Dion"
owner = 100
treasury = 200000
siege_day = "Sun"
siege_hour = 20
bounds = { min = [5000.0, 0.0, 0.0], max = [7000.0, 2000.0, 500.0] }
gates = [{ id = 1, open = true, integrity = 2000, max_integrity = 2000 }]

[[guard]]
stronghold = 1
template_id = 35100
location = [110.0, 100.0, 0.0]
respawn_delay_secs = 30

[[guard]]
stronghold = 1
template_id = 35100
location = [890.0, 100.0, 0.0]
respawn_delay_secs = 30

[[guard]]
stronghold = 2
template_id = 35100
location = [5100.0, 100.0, 0.0]
respawn_delay_secs = 30

[[faction]]
id = 100
name = "Iron Crows"
level = 7
member_count = 40
alliance = 1
leader = 1000
reputation = 12000

[[faction]]
id = 101
name = "Ashen Vale"
level = 5
member_count = 18
alliance = 1
leader = 1010
reputation = 3000

[[faction]]
id = 102
name = "Night Tide"
level = 6
member_count = 25
leader = 1020
reputation = 4500

[[faction]]
id = 103
name = "Grey Wolves"
level = 5
member_count = 12
alliance = 2
leader = 1030
reputation = 800

[[faction]]
id = 104
name = "Red Hawks"
level = 5
member_count = 12
alliance = 2
leader = 1040
reputation = 900

[[faction]]
id = 105
name = "Runts"
level = 2
member_count = 3
leader = 1050
"#;

const LAYOUTS: &str = r#"
[[stronghold]]
id = 1

[[stronghold.control_tower]]
index = 0
template_id = 13002
location = [100.0, 100.0, 0.0]

[[stronghold.control_tower]]
index = 1
template_id = 13002
location = [900.0, 100.0, 0.0]

[[stronghold.flame_tower]]
index = 2
template_id = 13004
location = [500.0, 800.0, 0.0]

[[stronghold]]
id = 2

[[stronghold.control_tower]]
index = 0
template_id = 13002
location = [5100.0, 120.0, 0.0]
"#;

pub fn leader(faction: FactionId) -> ActorId {
    ActorId(faction.0 * 10)
}

/// Sunday 2026-03-22 20:00 UTC
pub fn contest_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 22, 20, 0, 0).unwrap()
}

/// A moment inside `phase` of the first contest
pub fn time_in(phase: Phase) -> DateTime<Utc> {
    let date = contest_date();
    match phase {
        Phase::Cooldown => date - Duration::days(13),
        Phase::RegistrationOpen => date - Duration::days(7),
        Phase::RegistrationClosed => date - Duration::hours(2),
        Phase::Battle => date + Duration::minutes(30),
    }
}

pub struct World {
    pub memory: MemoryServices,
    pub clock: Arc<ManualClock>,
    pub coordinator: Coordinator,
}

impl World {
    /// Fresh world with the first contest scheduled, clock at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_config(now, SiegeConfig::default())
    }

    pub fn with_config(now: DateTime<Utc>, config: SiegeConfig) -> Self {
        let memory = MemoryServices::from_seed_toml(SEED).expect("valid seed");
        for id in [GLUDIO, DION] {
            memory
                .store
                .save_contest_schedule(
                    id,
                    &ContestSchedule {
                        contest_date: Some(contest_date()),
                        registration_deadline: Some(contest_date() - Duration::days(1)),
                        registration_closed: false,
                    },
                )
                .unwrap();
        }
        Self::boot(memory, Arc::new(ManualClock::new(now)), config)
    }

    /// Build and start a coordinator over existing services, as after a restart
    pub fn boot(memory: MemoryServices, clock: Arc<ManualClock>, config: SiegeConfig) -> Self {
        let layouts = parse_layouts(LAYOUTS).expect("valid layouts");
        let coordinator = Coordinator::new(
            memory.services(clock.clone()),
            config,
            layouts,
            TaskScheduler::current().expect("inside a tokio runtime"),
        )
        .expect("coordinator");
        coordinator.start().expect("start");
        Self {
            memory,
            clock,
            coordinator,
        }
    }

    pub fn contest(&self, id: StrongholdId) -> Arc<Contest> {
        self.coordinator.contest(id).expect("known stronghold")
    }

    /// Move the clock and the contest to `phase`
    pub fn enter(&self, id: StrongholdId, phase: Phase) {
        self.clock.set(time_in(phase));
        self.contest(id).advance_to(phase);
    }

    pub fn attack(&self, faction: FactionId, id: StrongholdId) {
        self.coordinator
            .register(leader(faction), faction, id, stronghold_siege::siege::Side::Attacker)
            .expect("attacker registration");
    }
}
