//! The contest state machine of one stronghold
//!
//! A contest is driven by a chain of scheduled transitions. Entering a phase
//! runs the actions planned for it, then arms the single transition task
//! towards the next phase. Registration calls, death notifications and admin
//! overrides arrive on arbitrary threads in between.
//!
//! Locks are taken in the order state, roster, and are never held across a
//! call into the store: validate, mutate, release, then persist.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::core::config::SiegeConfig;
use crate::core::error::{Result, SiegeError};
use crate::core::types::{EntityId, FactionId, Location, Role, StrongholdId};
use crate::guards::GuardDetachmentManager;
use crate::layout::{TowerLayouts, TowerTemplate};
use crate::services::broadcast::Announcement;
use crate::services::store::ContestSchedule;
use crate::services::Services;
use crate::siege::countdown::next_checkpoint;
use crate::siege::installation::{bind_detachments, Installation, Installations, TowerPlan};
use crate::siege::outcome::{reputation_changes, Outcome, ReputationChange};
use crate::siege::phase::{plan, Phase, PhaseAction, PhasePlan, PlanContext, Timeline};
use crate::siege::registration::{self, Rejection, Side, Standing};
use crate::siege::roster::{Roster, SharedRoster};
use crate::siege::schedule::initial_date;
use crate::siege::scheduler::{TaskScheduler, TaskSlot};
use crate::stronghold::Stronghold;

#[derive(Debug, Clone)]
struct ContestState {
    phase: Phase,
    /// Whether `phase` has been entered at least once
    entered: bool,
    started: bool,
    contest_date: DateTime<Utc>,
    registration_closed: bool,
    in_progress: bool,
    battle_end: Option<DateTime<Utc>>,
    first_owner: Option<FactionId>,
    weakened_gates: bool,
}

#[derive(Debug, Default)]
struct DriverState {
    running: bool,
    queued: Option<Phase>,
}

/// Point-in-time view of a contest
#[derive(Debug, Clone, Serialize)]
pub struct ContestStatus {
    pub stronghold: StrongholdId,
    pub name: String,
    pub phase: Phase,
    pub owner: Option<FactionId>,
    pub contest_date: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    pub registration_closed: bool,
    pub in_progress: bool,
    pub battle_end: Option<DateTime<Utc>>,
    pub time_remaining_secs: i64,
    pub attackers: Vec<FactionId>,
    pub defenders: Vec<FactionId>,
    pub pending_defenders: Vec<FactionId>,
    pub installations: usize,
    pub control_towers: usize,
    pub active_guards: usize,
}

pub struct Contest {
    me: Weak<Contest>,
    stronghold: Arc<Stronghold>,
    services: Services,
    config: Arc<SiegeConfig>,
    layouts: Arc<TowerLayouts>,
    scheduler: TaskScheduler,
    guards: GuardDetachmentManager,
    state: RwLock<ContestState>,
    roster: SharedRoster,
    installations: Mutex<Installations>,
    transition: TaskSlot,
    countdown: TaskSlot,
    driver: Mutex<DriverState>,
}

impl Contest {
    /// Restore a contest from its stored schedule and membership
    ///
    /// Nothing is armed until [`Contest::start`].
    pub fn new(
        stronghold: Arc<Stronghold>,
        services: Services,
        config: Arc<SiegeConfig>,
        layouts: Arc<TowerLayouts>,
        scheduler: TaskScheduler,
    ) -> Result<Arc<Self>> {
        let id = stronghold.id();
        let schedule = services.store.load_contest_schedule(id)?;
        let rows = services.store.load_membership(id)?;
        let now = services.clock.now();
        let contest_date = initial_date(schedule.contest_date, now, stronghold.slot(), config.cycle());
        let phase = Timeline::new(contest_date, &config).phase_at(now);

        let guards = GuardDetachmentManager::new(
            id,
            services.store.clone(),
            services.spawner.clone(),
            scheduler.clone(),
            config.hired_guard_cap,
        );

        Ok(Arc::new_cyclic(|me| Self {
            me: me.clone(),
            stronghold,
            services,
            config,
            layouts,
            scheduler,
            guards,
            state: RwLock::new(ContestState {
                phase,
                entered: false,
                started: false,
                contest_date,
                registration_closed: schedule.registration_closed,
                in_progress: false,
                battle_end: None,
                first_owner: None,
                weakened_gates: false,
            }),
            roster: SharedRoster::new(Roster::from_rows(&rows)),
            installations: Mutex::new(Installations::new()),
            transition: TaskSlot::new("transition"),
            countdown: TaskSlot::new("countdown"),
            driver: Mutex::new(DriverState::default()),
        }))
    }

    /// Enter the phase the clock says should hold and arm the rest of the chain
    pub fn start(&self) -> Result<()> {
        let phase = {
            let mut state = self.state.write();
            if state.started {
                return Err(SiegeError::Invariant(format!(
                    "contest for {} started twice",
                    self.stronghold.name()
                )));
            }
            state.started = true;
            Timeline::new(state.contest_date, &self.config).phase_at(self.services.clock.now())
        };
        tracing::info!(stronghold = %self.stronghold.name(), %phase, "Resuming contest");
        self.drive(phase);
        Ok(())
    }

    // === PHASE DRIVER ===

    /// Enter `phase`, then any phase queued meanwhile, then arm the next transition
    fn drive(&self, phase: Phase) {
        {
            let mut driver = self.driver.lock();
            if driver.running {
                driver.queued = Some(phase);
                return;
            }
            driver.running = true;
        }

        let mut phase = phase;
        loop {
            // Whatever is armed belongs to the phase being replaced
            self.transition.cancel();
            let plan = self.enter(phase);
            self.arm_transition(plan.next, plan.due);

            let mut driver = self.driver.lock();
            match driver.queued.take() {
                Some(queued) => phase = queued,
                None => {
                    driver.running = false;
                    break;
                }
            }
        }
    }

    fn enter(&self, phase: Phase) -> PhasePlan {
        let ctx = {
            let state = self.state.read();
            PlanContext {
                timeline: Timeline::new(state.contest_date, &self.config),
                now: self.services.clock.now(),
                slot: self.stronghold.slot(),
                cycle: self.config.cycle(),
                from: state.entered.then_some(state.phase),
            }
        };
        let plan = plan(phase, &ctx, &self.config);

        for action in &plan.actions {
            match *action {
                PhaseAction::OpenRegistration => self.open_registration(),
                PhaseAction::CloseRegistration => self.close_registration(),
                PhaseAction::BeginBattle { battle_end } => {
                    if !self.begin_battle(battle_end) {
                        self.mark_entered(Phase::Battle);
                        return self.enter(Phase::Cooldown);
                    }
                }
                PhaseAction::ConcludeBattle => self.conclude_battle(),
                PhaseAction::Reschedule { contest_date } => self.reschedule(contest_date),
            }
        }

        self.mark_entered(phase);
        tracing::info!(
            stronghold = %self.stronghold.name(),
            %phase,
            next = %plan.next,
            due = %plan.due,
            "Entered phase"
        );
        self.persist_schedule();
        plan
    }

    fn mark_entered(&self, phase: Phase) {
        let mut state = self.state.write();
        state.phase = phase;
        state.entered = true;
    }

    /// Only the driver arms transitions, and only into an empty slot
    fn arm_transition(&self, next: Phase, due: DateTime<Utc>) {
        let me = self.me.clone();
        let armed = self
            .transition
            .arm(&self.scheduler, due, self.services.clock.as_ref(), move |token| {
                if let Some(contest) = me.upgrade() {
                    if contest.transition.complete(token) {
                        contest.drive(next);
                    }
                }
            });
        if let Err(e) = armed {
            tracing::error!(stronghold = %self.stronghold.name(), %next, error = %e, "Transition not armed");
        }
    }

    /// Jump to `phase` now, replacing the armed transition
    pub fn advance_to(&self, phase: Phase) {
        self.transition.cancel();
        self.drive(phase);
    }

    // === PHASE ENTRY ACTIONS ===

    fn open_registration(&self) {
        self.state.write().registration_closed = false;
    }

    fn close_registration(&self) {
        self.state.write().registration_closed = true;
        let dropped = self.roster.update(|r| r.discard_pending());
        self.delete_rows(dropped.iter().map(|p| p.faction));
        if !dropped.is_empty() {
            tracing::debug!(
                stronghold = %self.stronghold.name(),
                count = dropped.len(),
                "Discarded unapproved defenders"
            );
        }
        self.services.broadcaster.notify_all(&Announcement::RegistrationClosed {
            stronghold: self.stronghold.name().to_string(),
        });
    }

    /// Returns false when the battle was cancelled for lack of attackers
    fn begin_battle(&self, battle_end: DateTime<Utc>) -> bool {
        let id = self.stronghold.id();
        let name = self.stronghold.name().to_string();

        match self.services.store.load_membership(id) {
            Ok(rows) => self.roster.update(|r| r.merge_rows(&rows)),
            Err(e) => tracing::error!(stronghold = %name, error = %e, "Failed to reload membership"),
        }
        let dropped = self.roster.update(|r| r.discard_pending());
        self.delete_rows(dropped.iter().map(|p| p.faction));

        if self.roster.snapshot().attacker_count() == 0 {
            tracing::info!(stronghold = %name, "No attackers registered; battle cancelled");
            self.services
                .broadcaster
                .notify_all(&Announcement::BattleCancelled { stronghold: name });
            return false;
        }

        let owner = self.stronghold.owner();
        {
            let mut state = self.state.write();
            state.in_progress = true;
            state.registration_closed = true;
            state.battle_end = Some(battle_end);
            state.first_owner = owner;
            state.weakened_gates = false;
            if let Some(owner) = owner {
                self.roster.update(|r| r.set_owner(owner));
            }
        }
        if let Some(owner) = owner {
            self.persist_role(owner, Role::Owner);
        }

        // Entering twice replaces whatever the first entry spawned
        self.installations
            .lock()
            .despawn_all(self.services.spawner.as_ref());

        let gates = self.stronghold.respawn_gates(false, 1.0);
        if let Err(e) = self.stronghold.persist_gates(self.services.store.as_ref(), &gates) {
            tracing::error!(stronghold = %name, error = %e, "Failed to persist gates");
        }

        match self.guards.spawn(owner.is_some()) {
            Ok(count) => tracing::debug!(stronghold = %name, count, "Garrison deployed"),
            Err(e) => tracing::error!(stronghold = %name, error = %e, "Failed to deploy garrison"),
        }
        self.spawn_installations(false);

        self.services.zones.enable_contest_zone(id);
        self.services.zones.evict_non_participants(id);
        self.notify_participants(&Announcement::BattleStarted { stronghold: name.clone() });
        self.arm_countdown(None);

        let roster = self.roster.snapshot();
        tracing::info!(
            stronghold = %name,
            attackers = roster.attacker_count(),
            defenders = roster.defenders().len(),
            "Battle started"
        );
        true
    }

    fn conclude_battle(&self) {
        let id = self.stronghold.id();
        let (was_in_progress, first_owner, weakened) = {
            let mut state = self.state.write();
            let was_in_progress = std::mem::replace(&mut state.in_progress, false);
            state.battle_end = None;
            state.registration_closed = true;
            (
                was_in_progress,
                state.first_owner.take(),
                std::mem::take(&mut state.weakened_gates),
            )
        };
        self.countdown.cancel();

        if was_in_progress {
            self.resolve_outcome(first_owner);
        }

        let spawner = self.services.spawner.as_ref();
        let towers = self.installations.lock().despawn_all(spawner);
        let roster = self.roster.replace(Roster::new());
        for banner in roster.all_banners() {
            spawner.despawn(banner);
        }
        self.guards.despawn();
        if was_in_progress && first_owner.is_some() {
            if let Err(e) = self.guards.dismiss_hired() {
                tracing::error!(stronghold = %self.stronghold.name(), error = %e, "Failed to remove hired guards");
            }
        }

        let ratio = if weakened { self.config.weakened_gate_ratio } else { 1.0 };
        let gates = self.stronghold.respawn_gates(true, ratio);
        if let Err(e) = self.stronghold.persist_gates(self.services.store.as_ref(), &gates) {
            tracing::error!(stronghold = %self.stronghold.name(), error = %e, "Failed to persist gates");
        }

        if let Err(e) = self.services.store.delete_membership(id, None) {
            tracing::error!(stronghold = %self.stronghold.name(), error = %e, "Failed to clear membership");
        }
        self.services.zones.disable_contest_zone(id);
        if was_in_progress {
            self.services.zones.evict_non_participants(id);
        }
        tracing::debug!(stronghold = %self.stronghold.name(), towers, "Battlefield cleared");
    }

    fn resolve_outcome(&self, first_owner: Option<FactionId>) {
        let name = self.stronghold.name().to_string();

        // A lone attacker facing nobody takes the stronghold
        let roster = self.roster.update(|r| {
            let attackers = r.attackers();
            if r.defenders().is_empty() && attackers.len() == 1 {
                r.set_owner(attackers[0]);
            }
            r.clone()
        });

        let outcome = Outcome::decide(first_owner, roster.owner());
        let previous_reputation = match outcome {
            Outcome::Captured { previous: Some(previous), .. } => self.services.factions.reputation(previous),
            _ => 0,
        };
        for change in reputation_changes(outcome, previous_reputation, &self.config) {
            match change {
                ReputationChange::Gain(faction, amount) => self.services.factions.add_reputation(faction, amount),
                ReputationChange::Loss(faction, amount) => self.services.factions.take_reputation(faction, amount),
            }
        }

        if let Some(owner) = outcome.owner() {
            self.stronghold.set_owner(Some(owner));
        }
        if let Err(e) = self.stronghold.persist(self.services.store.as_ref()) {
            tracing::error!(stronghold = %name, error = %e, "Failed to persist ownership");
        }

        let announcement = match outcome {
            Outcome::Captured { winner, .. } => Announcement::Captured { stronghold: name.clone(), winner },
            Outcome::Defended { owner } => Announcement::Defended { stronghold: name.clone(), owner },
            Outcome::Draw => Announcement::Draw { stronghold: name.clone() },
        };
        self.services.broadcaster.notify_all(&announcement);
        self.services.broadcaster.notify_participants(
            self.stronghold.id(),
            &roster.recipients(true),
            &Announcement::BattleEnded { stronghold: name.clone() },
        );
        tracing::info!(stronghold = %name, ?outcome, "Battle concluded");
    }

    fn reschedule(&self, contest_date: DateTime<Utc>) {
        let previous = std::mem::replace(&mut self.state.write().contest_date, contest_date);
        if previous != contest_date {
            tracing::info!(
                stronghold = %self.stronghold.name(),
                date = %contest_date,
                "Next contest scheduled"
            );
        }
    }

    fn spawn_installations(&self, reset_upgrades: bool) {
        let id = self.stronghold.id();
        let level = |tower: &TowerTemplate| {
            if reset_upgrades {
                return 0;
            }
            self.services
                .store
                .load_tower_upgrade(id, tower.index)
                .unwrap_or_else(|e| {
                    tracing::warn!(stronghold = %self.stronghold.name(), tower = tower.index, error = %e, "Upgrade level unavailable");
                    0
                })
        };

        let templates = self.layouts.control_towers(id);
        let tower_points: Vec<Location> = templates.iter().map(|t| t.location).collect();
        let bindings = bind_detachments(&tower_points, &self.guards.spawn_points());
        let control_towers = templates
            .iter()
            .zip(bindings)
            .map(|(tower, guards)| TowerPlan {
                template: tower,
                upgrade_level: level(tower),
                guards,
            })
            .collect();
        let flame_towers = self
            .layouts
            .flame_towers(id)
            .iter()
            .map(|tower| TowerPlan {
                template: tower,
                upgrade_level: level(tower),
                guards: Vec::new(),
            })
            .collect();

        let spawner = self.services.spawner.as_ref();
        let spawned = Installations::spawn(spawner, control_towers, flame_towers);
        let mut installations = self.installations.lock();
        installations.despawn_all(spawner);
        *installations = spawned;
    }

    // === COUNTDOWN ===

    fn arm_countdown(&self, previous: Option<i64>) {
        let Some(battle_end) = self.state.read().battle_end else {
            return;
        };
        let remaining = (battle_end - self.services.clock.now()).num_seconds();
        let Some(checkpoint) = next_checkpoint(&self.config.countdown_checkpoints_secs, remaining, previous) else {
            return;
        };

        let me = self.me.clone();
        self.countdown.rearm(
            &self.scheduler,
            battle_end - Duration::seconds(checkpoint),
            self.services.clock.as_ref(),
            move |token| {
                if let Some(contest) = me.upgrade() {
                    if contest.countdown.complete(token) {
                        contest.announce_remaining(checkpoint);
                        contest.arm_countdown(Some(checkpoint));
                    }
                }
            },
        );
    }

    fn announce_remaining(&self, seconds: i64) {
        if !self.state.read().in_progress {
            return;
        }
        self.notify_participants(&Announcement::TimeRemaining {
            stronghold: self.stronghold.name().to_string(),
            seconds,
        });
    }

    // === REGISTRATION ===

    /// Register `faction` on `side`; returns the role it landed in
    pub fn admit(&self, faction: FactionId, side: Side, standing: &Standing) -> Result<Role> {
        match self.try_admit(faction, side, standing) {
            Ok(role) => {
                self.persist_role(faction, role);
                tracing::info!(stronghold = %self.stronghold.name(), %faction, ?role, "Faction registered");
                Ok(role)
            }
            Err(rejection) => Err(self.reject(faction, rejection)),
        }
    }

    fn try_admit(&self, faction: FactionId, side: Side, standing: &Standing) -> std::result::Result<Role, Rejection> {
        {
            let state = self.state.read();
            registration::check_window(state.registration_closed, state.in_progress)?;
        }
        let info = self.services.factions.faction(faction);
        registration::check_faction(info.as_ref(), &self.config)?;
        registration::check_standing(standing)?;
        let owner = self.stronghold.owner();
        if side == Side::Defender && owner.is_none() {
            return Err(Rejection::NpcHeld);
        }

        let allies = self.services.factions.allies_of(faction);
        let role = side.initial_role();
        let state = self.state.read();
        registration::check_window(state.registration_closed, state.in_progress)?;
        self.roster.try_update(|r| {
            registration::check_not_registered(r, faction)?;
            registration::check_capacity(r, side, &self.config)?;
            registration::check_alliance(r, side, &allies, owner)?;
            r.add(faction, role)
        })?;
        Ok(role)
    }

    pub fn withdraw(&self, faction: FactionId) -> Result<()> {
        let removed = {
            let state = self.state.read();
            registration::check_window(state.registration_closed, state.in_progress)
                .and_then(|_| self.roster.try_update(|r| r.remove(faction).ok_or(Rejection::NotRegistered)))
        };
        let removed = removed.map_err(|rejection| self.reject(faction, rejection))?;

        for banner in removed.banners {
            self.services.spawner.despawn(banner);
        }
        self.delete_rows(std::iter::once(faction));
        tracing::info!(stronghold = %self.stronghold.name(), %faction, "Faction withdrew");
        Ok(())
    }

    pub fn approve_defender(&self, faction: FactionId) -> Result<()> {
        let approved = {
            let state = self.state.read();
            registration::check_window(state.registration_closed, state.in_progress)
                .and_then(|_| self.roster.try_update(|r| r.approve(faction)))
        };
        approved.map_err(|rejection| self.reject(faction, rejection))?;

        self.persist_role(faction, Role::Defender);
        tracing::info!(stronghold = %self.stronghold.name(), %faction, "Defender approved");
        Ok(())
    }

    pub fn reject_defender(&self, faction: FactionId) -> Result<()> {
        let rejected = {
            let state = self.state.read();
            registration::check_window(state.registration_closed, state.in_progress).and_then(|_| {
                self.roster.try_update(|r| match r.role(faction) {
                    Some(Role::PendingDefender) => {
                        r.remove(faction);
                        Ok(())
                    }
                    _ => Err(Rejection::NotPending),
                })
            })
        };
        rejected.map_err(|rejection| self.reject(faction, rejection))?;

        self.delete_rows(std::iter::once(faction));
        tracing::info!(stronghold = %self.stronghold.name(), %faction, "Defender rejected");
        Ok(())
    }

    fn reject(&self, faction: FactionId, rejection: Rejection) -> SiegeError {
        tracing::debug!(stronghold = %self.stronghold.name(), %faction, %rejection, "Request rejected");
        SiegeError::Rejected(rejection)
    }

    // === BATTLE EVENTS ===

    /// `faction` captured the stronghold's seal while the battle runs
    pub fn seize(&self, faction: FactionId) -> Result<()> {
        let allies = self.services.factions.allies_of(faction);
        let swapped = {
            let mut state = self.state.write();
            if !state.in_progress {
                return Err(self.reject(faction, Rejection::BattleNotInProgress));
            }
            let swapped = self
                .roster
                .try_update(|r| {
                    if r.role(faction) != Some(Role::Attacker) {
                        return Err(Rejection::NotAttacker);
                    }
                    let attackers = r.attackers();
                    let unopposed = r.defenders().is_empty()
                        && (attackers.len() == 1
                            || attackers.iter().all(|a| *a == faction || allies.contains(a)));
                    if unopposed {
                        r.set_owner(faction);
                        Ok(None)
                    } else {
                        Ok(Some(r.swap_for_seizure(faction, &allies)))
                    }
                })
                .map_err(|rejection| self.reject(faction, rejection))?;
            if swapped.is_some() {
                state.weakened_gates = true;
            }
            swapped
        };

        let name = self.stronghold.name().to_string();
        let previous = self.stronghold.set_owner(Some(faction));
        if let Err(e) = self.stronghold.persist(self.services.store.as_ref()) {
            tracing::error!(stronghold = %name, error = %e, "Failed to persist ownership");
        }
        tracing::info!(stronghold = %name, %faction, ?previous, "Ownership seized");

        let Some(removed_banners) = swapped else {
            tracing::info!(stronghold = %name, "No opposition left; ending battle");
            self.advance_to(Phase::Cooldown);
            return Ok(());
        };

        for banner in removed_banners {
            self.services.spawner.despawn(banner);
        }
        let id = self.stronghold.id();
        for (member, role) in self.roster.snapshot().rows() {
            if let Err(e) = self.services.store.upsert_membership(id, member, role) {
                tracing::error!(stronghold = %name, faction = %member, error = %e, "Failed to persist membership");
            }
        }
        if let Err(e) = self.services.store.delete_all_tower_upgrades(id) {
            tracing::error!(stronghold = %name, error = %e, "Failed to reset tower upgrades");
        }
        self.spawn_installations(true);

        let gates = self
            .stronghold
            .respawn_gates(false, self.config.weakened_gate_ratio);
        if let Err(e) = self.stronghold.persist_gates(self.services.store.as_ref(), &gates) {
            tracing::error!(stronghold = %name, error = %e, "Failed to persist gates");
        }

        self.notify_participants(&Announcement::OwnershipSeized {
            stronghold: name,
            faction,
        });
        Ok(())
    }

    /// Plant a banner for `faction` at `location`
    pub fn plant_banner(&self, faction: FactionId, location: Location) -> Result<EntityId> {
        if !self.state.read().in_progress {
            return Err(self.reject(faction, Rejection::BattleNotInProgress));
        }
        let limit = self.config.max_banners_per_faction;
        if let Err(rejection) = self.roster.snapshot().can_plant_banner(faction, limit) {
            return Err(self.reject(faction, rejection));
        }

        let banner = self
            .services
            .spawner
            .spawn(self.config.banner_template_id, location);
        let planted = {
            let state = self.state.read();
            if state.in_progress {
                self.roster.try_update(|r| r.plant_banner(faction, banner, limit))
            } else {
                Err(Rejection::BattleNotInProgress)
            }
        };
        if let Err(rejection) = planted {
            self.services.spawner.despawn(banner);
            return Err(self.reject(faction, rejection));
        }
        tracing::debug!(stronghold = %self.stronghold.name(), %faction, "Banner planted");
        Ok(banner)
    }

    /// Returns the faction that lost the banner
    pub fn on_banner_destroyed(&self, banner: EntityId) -> Option<FactionId> {
        self.roster.update(|r| r.remove_banner(banner))
    }

    /// Returns whether `entity` was one of this battle's installations
    pub fn on_installation_destroyed(&self, entity: EntityId) -> bool {
        let destroyed = self.installations.lock().on_destroyed(entity);
        match destroyed {
            Some(Installation::ControlTower { index, guards, .. }) => {
                for detachment in guards {
                    self.guards.halt(detachment);
                }
                tracing::info!(
                    stronghold = %self.stronghold.name(),
                    tower = index,
                    remaining = self.control_tower_count(),
                    "Control tower destroyed"
                );
                true
            }
            Some(Installation::FlameTower { index, .. }) => {
                tracing::info!(stronghold = %self.stronghold.name(), tower = index, "Flame tower destroyed");
                true
            }
            None => false,
        }
    }

    pub fn on_guard_killed(&self, entity: EntityId) -> bool {
        self.guards.on_guard_killed(entity)
    }

    // === ADMIN ===

    /// Move the battle to now
    pub fn start_now(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            if state.in_progress {
                return Err(SiegeError::Rejected(Rejection::BattleInProgress));
            }
            state.contest_date = self.services.clock.now();
        }
        tracing::info!(stronghold = %self.stronghold.name(), "Battle started by administrator");
        self.advance_to(Phase::Battle);
        Ok(())
    }

    /// End the running battle now with normal resolution
    pub fn force_end(&self) -> Result<()> {
        if !self.state.read().in_progress {
            return Err(SiegeError::Rejected(Rejection::BattleNotInProgress));
        }
        tracing::info!(stronghold = %self.stronghold.name(), "Battle ended by administrator");
        self.advance_to(Phase::Cooldown);
        Ok(())
    }

    /// Cancel every timer and remove everything spawned
    pub fn shutdown(&self) {
        self.transition.cancel();
        self.countdown.cancel();
        let spawner = self.services.spawner.as_ref();
        self.installations.lock().despawn_all(spawner);
        for banner in self.roster.snapshot().all_banners() {
            spawner.despawn(banner);
        }
        self.guards.despawn();
    }

    // === QUERIES ===

    pub fn id(&self) -> StrongholdId {
        self.stronghold.id()
    }

    pub fn stronghold(&self) -> &Arc<Stronghold> {
        &self.stronghold
    }

    pub fn phase(&self) -> Phase {
        self.state.read().phase
    }

    pub fn contest_date(&self) -> DateTime<Utc> {
        self.state.read().contest_date
    }

    pub fn timeline(&self) -> Timeline {
        Timeline::new(self.contest_date(), &self.config)
    }

    pub fn is_in_progress(&self) -> bool {
        self.state.read().in_progress
    }

    pub fn is_registration_closed(&self) -> bool {
        self.state.read().registration_closed
    }

    pub fn battle_end(&self) -> Option<DateTime<Utc>> {
        self.state.read().battle_end
    }

    pub fn roster(&self) -> Arc<Roster> {
        self.roster.snapshot()
    }

    pub fn guards(&self) -> &GuardDetachmentManager {
        &self.guards
    }

    pub fn installations(&self) -> Vec<Installation> {
        self.installations.lock().iter().cloned().collect()
    }

    pub fn control_tower_count(&self) -> usize {
        self.installations.lock().control_tower_count()
    }

    pub fn is_transition_armed(&self) -> bool {
        self.transition.is_armed()
    }

    pub fn is_countdown_armed(&self) -> bool {
        self.countdown.is_armed()
    }

    /// Time until the current phase hands over
    pub fn time_remaining(&self) -> Duration {
        let state = self.state.read();
        let timeline = Timeline::new(state.contest_date, &self.config);
        let end = match state.battle_end {
            Some(end) if state.in_progress => end,
            _ => timeline.phase_end(state.phase),
        };
        (end - self.services.clock.now()).max(Duration::zero())
    }

    pub fn status(&self) -> ContestStatus {
        let time_remaining_secs = self.time_remaining().num_seconds();
        let state = self.state.read().clone();
        let roster = self.roster.snapshot();
        let (installations, control_towers) = {
            let installations = self.installations.lock();
            (installations.len(), installations.control_tower_count())
        };
        ContestStatus {
            stronghold: self.stronghold.id(),
            name: self.stronghold.name().to_string(),
            phase: state.phase,
            owner: self.stronghold.owner(),
            contest_date: state.contest_date,
            registration_deadline: state.contest_date - self.config.registration_close_lead(),
            registration_closed: state.registration_closed,
            in_progress: state.in_progress,
            battle_end: state.battle_end,
            time_remaining_secs,
            attackers: roster.attackers(),
            defenders: roster.defenders(),
            pending_defenders: roster.pending_defenders(),
            installations,
            control_towers,
            active_guards: self.guards.active_count(),
        }
    }

    // === HELPERS ===

    fn notify_participants(&self, message: &Announcement) {
        let recipients = self.roster.snapshot().recipients(true);
        self.services
            .broadcaster
            .notify_participants(self.stronghold.id(), &recipients, message);
    }

    fn persist_role(&self, faction: FactionId, role: Role) {
        if let Err(e) = self
            .services
            .store
            .upsert_membership(self.stronghold.id(), faction, role)
        {
            tracing::error!(stronghold = %self.stronghold.name(), %faction, error = %e, "Failed to persist membership");
        }
    }

    fn delete_rows(&self, factions: impl Iterator<Item = FactionId>) {
        for faction in factions {
            if let Err(e) = self
                .services
                .store
                .delete_membership(self.stronghold.id(), Some(faction))
            {
                tracing::error!(stronghold = %self.stronghold.name(), %faction, error = %e, "Failed to delete membership");
            }
        }
    }

    fn persist_schedule(&self) {
        let schedule = {
            let state = self.state.read();
            ContestSchedule {
                contest_date: Some(state.contest_date),
                registration_deadline: Some(state.contest_date - self.config.registration_close_lead()),
                registration_closed: state.registration_closed,
            }
        };
        if let Err(e) = self
            .services
            .store
            .save_contest_schedule(self.stronghold.id(), &schedule)
        {
            tracing::error!(stronghold = %self.stronghold.name(), error = %e, "Failed to persist schedule");
        }
    }
}
