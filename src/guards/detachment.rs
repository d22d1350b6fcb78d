//! Guard detachment lifecycle for one stronghold

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::error::Result;
use crate::core::types::{EntityId, Location, StrongholdId};
use crate::guards::GuardSpawn;
use crate::services::spawner::EntitySpawner;
use crate::services::store::SiegeStore;
use crate::siege::registration::Rejection;
use crate::siege::scheduler::{TaskHandle, TaskScheduler};

#[derive(Debug)]
struct Detachment {
    spawn: GuardSpawn,
    entity: Option<EntityId>,
    respawn: Option<TaskHandle>,
    halted: bool,
}

#[derive(Debug, Default)]
struct Garrison {
    detachments: Vec<Detachment>,
    respawn_enabled: bool,
    /// Bumped on every spawn and despawn; pending respawns from an older
    /// generation do nothing
    generation: u64,
}

impl Garrison {
    fn kill_all(&mut self, spawner: &dyn EntitySpawner) {
        for detachment in self.detachments.drain(..) {
            if let Some(handle) = detachment.respawn {
                handle.cancel();
            }
            if let Some(entity) = detachment.entity {
                spawner.despawn(entity);
            }
        }
        self.generation += 1;
    }
}

/// Spawns, respawns and removes the guards of one stronghold
///
/// Independent of the contest phase machine: the contest only tells it when
/// a battle starts or ends and which detachments lost their control tower.
pub struct GuardDetachmentManager {
    stronghold: StrongholdId,
    store: Arc<dyn SiegeStore>,
    spawner: Arc<dyn EntitySpawner>,
    scheduler: TaskScheduler,
    hired_cap: usize,
    garrison: Arc<Mutex<Garrison>>,
    /// Held across the cap check and the insert of a hired guard row
    hire_lock: Mutex<()>,
}

impl GuardDetachmentManager {
    pub fn new(
        stronghold: StrongholdId,
        store: Arc<dyn SiegeStore>,
        spawner: Arc<dyn EntitySpawner>,
        scheduler: TaskScheduler,
        hired_cap: usize,
    ) -> Self {
        Self {
            stronghold,
            store,
            spawner,
            scheduler,
            hired_cap,
            garrison: Arc::new(Mutex::new(Garrison::default())),
            hire_lock: Mutex::new(()),
        }
    }

    /// Load and spawn the garrison, replacing any live one
    ///
    /// An owned stronghold fields its hired guards, capped and without
    /// respawn. Otherwise the default garrison respawns after each death.
    /// Returns the number of guards spawned.
    pub fn spawn(&self, owned: bool) -> Result<usize> {
        let mut rows = self.store.load_guard_spawns(self.stronghold, owned)?;
        if owned {
            rows.truncate(self.hired_cap);
        }

        let mut garrison = self.garrison.lock();
        garrison.kill_all(self.spawner.as_ref());
        garrison.respawn_enabled = !owned;
        for spawn in rows {
            let entity = self.spawner.spawn(spawn.template_id, spawn.location);
            garrison.detachments.push(Detachment {
                spawn,
                entity: Some(entity),
                respawn: None,
                halted: false,
            });
        }

        let count = garrison.detachments.len();
        tracing::debug!(stronghold = %self.stronghold, count, owned, "Spawned garrison");
        Ok(count)
    }

    /// Kill every guard and cancel pending respawns; safe to call at any time
    pub fn despawn(&self) {
        self.garrison.lock().kill_all(self.spawner.as_ref());
    }

    /// Schedule a respawn for the killed guard; returns whether it was ours
    pub fn on_guard_killed(&self, entity: EntityId) -> bool {
        let mut garrison = self.garrison.lock();
        let generation = garrison.generation;
        let respawn_enabled = garrison.respawn_enabled;
        let Some(index) = garrison
            .detachments
            .iter()
            .position(|d| d.entity == Some(entity))
        else {
            return false;
        };

        let detachment = &mut garrison.detachments[index];
        detachment.entity = None;
        if !respawn_enabled || detachment.halted {
            return true;
        }

        let state = self.garrison.clone();
        let spawner = self.spawner.clone();
        let stronghold = self.stronghold;
        let handle = self.scheduler.schedule(detachment.spawn.respawn_delay(), move || {
            let mut garrison = state.lock();
            if garrison.generation != generation {
                return;
            }
            if let Some(detachment) = garrison.detachments.get_mut(index) {
                detachment.respawn = None;
                if detachment.halted || detachment.entity.is_some() {
                    return;
                }
                let entity = spawner.spawn(detachment.spawn.template_id, detachment.spawn.location);
                detachment.entity = Some(entity);
                tracing::debug!(stronghold = %stronghold, index, "Guard respawned");
            }
        });
        detachment.respawn = Some(handle);
        true
    }

    /// Kill one detachment and keep it down for the rest of the battle
    pub fn halt(&self, index: usize) {
        let mut garrison = self.garrison.lock();
        if let Some(detachment) = garrison.detachments.get_mut(index) {
            detachment.halted = true;
            if let Some(handle) = detachment.respawn.take() {
                handle.cancel();
            }
            if let Some(entity) = detachment.entity.take() {
                self.spawner.despawn(entity);
            }
            tracing::debug!(stronghold = %self.stronghold, index, "Guard detachment halted");
        }
    }

    pub fn is_halted(&self, index: usize) -> bool {
        self.garrison
            .lock()
            .detachments
            .get(index)
            .map(|d| d.halted)
            .unwrap_or(false)
    }

    pub fn spawn_points(&self) -> Vec<Location> {
        self.garrison
            .lock()
            .detachments
            .iter()
            .map(|d| d.spawn.location)
            .collect()
    }

    pub fn entity(&self, index: usize) -> Option<EntityId> {
        self.garrison
            .lock()
            .detachments
            .get(index)
            .and_then(|d| d.entity)
    }

    pub fn active_count(&self) -> usize {
        self.garrison
            .lock()
            .detachments
            .iter()
            .filter(|d| d.entity.is_some())
            .count()
    }

    /// Store a hired guard row for the next battle
    pub fn hire(&self, spawn: GuardSpawn) -> Result<()> {
        let _hiring = self.hire_lock.lock();
        let hired = self.store.load_guard_spawns(self.stronghold, true)?;
        if hired.len() >= self.hired_cap {
            return Err(Rejection::HireCapReached(self.hired_cap).into());
        }
        let spawn = GuardSpawn { hired: true, ..spawn };
        self.store.save_hired_guard(self.stronghold, &spawn)?;
        tracing::info!(stronghold = %self.stronghold, template = spawn.template_id, "Guard hired");
        Ok(())
    }

    pub fn hired_count(&self) -> Result<usize> {
        Ok(self.store.load_guard_spawns(self.stronghold, true)?.len())
    }

    /// Remove every hired guard row
    pub fn dismiss_hired(&self) -> Result<()> {
        self.store.delete_hired_guards(self.stronghold)?;
        Ok(())
    }
}
