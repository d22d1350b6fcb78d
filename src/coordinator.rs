//! Process-wide entry point of the siege subsystem
//!
//! The coordinator owns one contest per stronghold, created on first access
//! and cached. Player commands are authorized here (leadership, ownership)
//! and facts spanning several contests are gathered here before the
//! contest applies its own rules.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::core::config::SiegeConfig;
use crate::core::error::{Result, SiegeError};
use crate::core::types::{ActorId, FactionId, Role, StrongholdId};
use crate::guards::GuardSpawn;
use crate::layout::TowerLayouts;
use crate::services::Services;
use crate::siege::{Contest, ContestStatus, Rejection, Side, Standing, TaskScheduler};
use crate::stronghold::{Stronghold, StrongholdRegistry};

pub struct Coordinator {
    services: Services,
    config: Arc<SiegeConfig>,
    layouts: Arc<TowerLayouts>,
    registry: StrongholdRegistry,
    scheduler: TaskScheduler,
    contests: DashMap<StrongholdId, Arc<Contest>>,
    /// Serializes one faction's registrations so the same-day check and the
    /// roster insert see the same view of every contest
    faction_locks: DashMap<FactionId, Arc<Mutex<()>>>,
}

impl Coordinator {
    pub fn new(
        services: Services,
        config: SiegeConfig,
        layouts: TowerLayouts,
        scheduler: TaskScheduler,
    ) -> Result<Self> {
        config.validate()?;
        let registry = StrongholdRegistry::load(services.store.as_ref())?;
        Ok(Self {
            services,
            config: Arc::new(config),
            layouts: Arc::new(layouts),
            registry,
            scheduler,
            contests: DashMap::new(),
            faction_locks: DashMap::new(),
        })
    }

    /// Resume every stronghold's contest from its stored schedule
    pub fn start(&self) -> Result<()> {
        for stronghold in self.registry.iter() {
            self.contest(stronghold.id())?.start()?;
        }
        tracing::info!(strongholds = self.registry.len(), "Siege coordinator started");
        Ok(())
    }

    /// The contest of `id`, created on first access
    pub fn contest(&self, id: StrongholdId) -> Result<Arc<Contest>> {
        if let Some(contest) = self.contests.get(&id) {
            return Ok(contest.clone());
        }
        let stronghold = self.stronghold(id)?;
        let contest = Contest::new(
            stronghold,
            self.services.clone(),
            self.config.clone(),
            self.layouts.clone(),
            self.scheduler.clone(),
        )?;
        Ok(self.contests.entry(id).or_insert(contest).clone())
    }

    pub fn registry(&self) -> &StrongholdRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SiegeConfig {
        &self.config
    }

    fn stronghold(&self, id: StrongholdId) -> Result<Arc<Stronghold>> {
        self.registry.get(id).ok_or(SiegeError::StrongholdNotFound(id))
    }

    // === PLAYER COMMANDS ===

    /// `actor` registers `faction` for the contest of `stronghold`
    pub fn register(&self, actor: ActorId, faction: FactionId, stronghold: StrongholdId, side: Side) -> Result<Role> {
        let contest = self.contest(stronghold)?;
        self.require_leader(actor, faction)?;
        let lock = self.faction_lock(faction);
        let _registering = lock.lock();
        let standing = self.standing(faction, &contest);
        contest.admit(faction, side, &standing)
    }

    pub fn withdraw(&self, actor: ActorId, faction: FactionId, stronghold: StrongholdId) -> Result<()> {
        let contest = self.contest(stronghold)?;
        self.require_leader(actor, faction)?;
        let lock = self.faction_lock(faction);
        let _registering = lock.lock();
        contest.withdraw(faction)
    }

    /// The owner's leader accepts a pending defender
    pub fn approve_defender(&self, actor: ActorId, stronghold: StrongholdId, faction: FactionId) -> Result<()> {
        let contest = self.contest(stronghold)?;
        self.require_owner(actor, contest.stronghold())?;
        contest.approve_defender(faction)
    }

    pub fn reject_defender(&self, actor: ActorId, stronghold: StrongholdId, faction: FactionId) -> Result<()> {
        let contest = self.contest(stronghold)?;
        self.require_owner(actor, contest.stronghold())?;
        contest.reject_defender(faction)
    }

    /// The owner pays for a mercenary guard fielded in later battles
    ///
    /// Returns the treasury balance after payment.
    pub fn hire_guard(&self, actor: ActorId, stronghold: StrongholdId, spawn: GuardSpawn) -> Result<u64> {
        let contest = self.contest(stronghold)?;
        let stronghold = contest.stronghold();
        self.require_owner(actor, stronghold)?;
        if contest.is_in_progress() {
            return Err(Rejection::BattleInProgress.into());
        }

        let cost = self.config.guard_hire_cost;
        let balance = stronghold.withdraw(cost)?;
        if let Err(e) = contest.guards().hire(spawn) {
            stronghold.deposit(cost);
            return Err(e);
        }
        if let Err(e) = stronghold.persist(self.services.store.as_ref()) {
            tracing::error!(stronghold = %stronghold.name(), error = %e, "Failed to persist treasury");
        }
        Ok(balance)
    }

    fn require_leader(&self, actor: ActorId, faction: FactionId) -> Result<()> {
        // Unknown factions are reported by the registration checks
        let known = self.services.factions.faction(faction).is_some();
        if known && !self.services.factions.is_leader(faction, actor) {
            tracing::debug!(%faction, "Request by non-leader rejected");
            return Err(Rejection::NotLeader.into());
        }
        Ok(())
    }

    fn require_owner(&self, actor: ActorId, stronghold: &Stronghold) -> Result<()> {
        match stronghold.owner() {
            Some(owner) if self.services.factions.is_leader(owner, actor) => Ok(()),
            _ => {
                tracing::debug!(stronghold = %stronghold.name(), "Request by non-owner rejected");
                Err(Rejection::NotOwner.into())
            }
        }
    }

    fn faction_lock(&self, faction: FactionId) -> Arc<Mutex<()>> {
        self.faction_locks.entry(faction).or_default().clone()
    }

    /// Ownership and same-day registrations of `faction` outside `contest`
    fn standing(&self, faction: FactionId, contest: &Contest) -> Standing {
        let day = contest.contest_date().date_naive();
        let others: Vec<Arc<Contest>> = self
            .contests
            .iter()
            .filter(|entry| *entry.key() != contest.id())
            .map(|entry| entry.value().clone())
            .collect();

        Standing {
            owns: self.registry.owned_by(faction).map(|s| s.id()),
            same_day: others
                .iter()
                .find(|other| other.contest_date().date_naive() == day && other.roster().contains(faction))
                .map(|other| other.id()),
        }
    }

    // === ADMIN ===

    pub fn start_contest_now(&self, stronghold: StrongholdId) -> Result<()> {
        self.contest(stronghold)?.start_now()
    }

    pub fn force_end(&self, stronghold: StrongholdId) -> Result<()> {
        self.contest(stronghold)?.force_end()
    }

    /// Status of every contest in stronghold order
    pub fn status(&self) -> Result<Vec<ContestStatus>> {
        self.registry
            .iter()
            .map(|s| self.contest(s.id()).map(|c| c.status()))
            .collect()
    }

    pub fn shutdown(&self) {
        for entry in self.contests.iter() {
            entry.value().shutdown();
        }
        tracing::info!("Siege coordinator stopped");
    }
}
