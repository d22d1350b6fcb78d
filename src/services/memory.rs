//! In-memory implementations of the collaborator traits
//!
//! These are suitable for development and testing. They record what the
//! siege subsystem asked of them so tests can assert on it. Production
//! deployments plug in persistent and networked backends.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::core::clock::Clock;
use crate::core::config::ConfigError;
use crate::core::types::{ActorId, AllianceId, EntityId, FactionId, Location, Role, StrongholdId};
use crate::guards::GuardSpawn;
use crate::services::broadcast::{Announcement, Broadcaster};
use crate::services::faction::{FactionInfo, FactionRegistry};
use crate::services::spawner::EntitySpawner;
use crate::services::store::{ContestSchedule, SiegeStore, StoreError};
use crate::services::zone::ZoneService;
use crate::services::Services;
use crate::stronghold::{Gate, StrongholdRecord};

// === STORE ===

/// In-memory siege store
#[derive(Default)]
pub struct InMemoryStore {
    strongholds: DashMap<StrongholdId, StrongholdRecord>,
    schedules: DashMap<StrongholdId, ContestSchedule>,
    membership: DashMap<StrongholdId, Vec<(FactionId, Role)>>,
    tower_upgrades: DashMap<(StrongholdId, u32), u32>,
    guard_spawns: DashMap<(StrongholdId, bool), Vec<GuardSpawn>>,
    /// When set, every write fails with `StoreError::Unavailable`
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_stronghold(&self, record: StrongholdRecord) {
        self.strongholds.insert(record.id, record);
    }

    pub fn stronghold(&self, id: StrongholdId) -> Option<StrongholdRecord> {
        self.strongholds.get(&id).map(|r| r.clone())
    }

    pub fn set_default_guards(&self, stronghold: StrongholdId, spawns: Vec<GuardSpawn>) {
        self.guard_spawns.insert((stronghold, false), spawns);
    }

    pub fn hired_guards(&self, stronghold: StrongholdId) -> Vec<GuardSpawn> {
        self.guard_spawns
            .get(&(stronghold, true))
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }

    pub fn schedule(&self, stronghold: StrongholdId) -> ContestSchedule {
        self.schedules.get(&stronghold).map(|s| *s).unwrap_or_default()
    }

    pub fn membership(&self, stronghold: StrongholdId) -> Vec<(FactionId, Role)> {
        self.membership
            .get(&stronghold)
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }

    pub fn tower_upgrade(&self, stronghold: StrongholdId, tower_index: u32) -> u32 {
        self.tower_upgrades
            .get(&(stronghold, tower_index))
            .map(|level| *level)
            .unwrap_or(0)
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("writes disabled".into()))
        } else {
            Ok(())
        }
    }
}

impl SiegeStore for InMemoryStore {
    fn load_strongholds(&self) -> Result<Vec<StrongholdRecord>, StoreError> {
        let mut records: Vec<StrongholdRecord> =
            self.strongholds.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    fn save_stronghold(&self, record: &StrongholdRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut stored = self
            .strongholds
            .get_mut(&record.id)
            .ok_or_else(|| StoreError::NotFound(format!("stronghold {}", record.id)))?;
        stored.owner = record.owner;
        stored.treasury = record.treasury;
        stored.tax_rate = record.tax_rate;
        Ok(())
    }

    fn save_gate(&self, stronghold: StrongholdId, gate: &Gate) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut stored = self
            .strongholds
            .get_mut(&stronghold)
            .ok_or_else(|| StoreError::NotFound(format!("stronghold {}", stronghold)))?;
        match stored.gates.iter_mut().find(|g| g.id == gate.id) {
            Some(existing) => *existing = gate.clone(),
            None => stored.gates.push(gate.clone()),
        }
        Ok(())
    }

    fn load_contest_schedule(&self, stronghold: StrongholdId) -> Result<ContestSchedule, StoreError> {
        Ok(self.schedule(stronghold))
    }

    fn save_contest_schedule(
        &self,
        stronghold: StrongholdId,
        schedule: &ContestSchedule,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        self.schedules.insert(stronghold, *schedule);
        Ok(())
    }

    fn load_membership(&self, stronghold: StrongholdId) -> Result<Vec<(FactionId, Role)>, StoreError> {
        Ok(self.membership(stronghold))
    }

    fn upsert_membership(
        &self,
        stronghold: StrongholdId,
        faction: FactionId,
        role: Role,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut rows = self.membership.entry(stronghold).or_default();
        match rows.iter_mut().find(|(f, _)| *f == faction) {
            Some(row) => row.1 = role,
            None => rows.push((faction, role)),
        }
        Ok(())
    }

    fn delete_membership(
        &self,
        stronghold: StrongholdId,
        faction: Option<FactionId>,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        match faction {
            Some(faction) => {
                if let Some(mut rows) = self.membership.get_mut(&stronghold) {
                    rows.retain(|(f, _)| *f != faction);
                }
            }
            None => {
                self.membership.remove(&stronghold);
            }
        }
        Ok(())
    }

    fn load_tower_upgrade(&self, stronghold: StrongholdId, tower_index: u32) -> Result<u32, StoreError> {
        Ok(self.tower_upgrade(stronghold, tower_index))
    }

    fn save_tower_upgrade(
        &self,
        stronghold: StrongholdId,
        tower_index: u32,
        level: u32,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        self.tower_upgrades.insert((stronghold, tower_index), level);
        Ok(())
    }

    fn delete_all_tower_upgrades(&self, stronghold: StrongholdId) -> Result<(), StoreError> {
        self.check_writable()?;
        self.tower_upgrades.retain(|(id, _), _| *id != stronghold);
        Ok(())
    }

    fn load_guard_spawns(&self, stronghold: StrongholdId, hired: bool) -> Result<Vec<GuardSpawn>, StoreError> {
        Ok(self
            .guard_spawns
            .get(&(stronghold, hired))
            .map(|rows| rows.clone())
            .unwrap_or_default())
    }

    fn save_hired_guard(&self, stronghold: StrongholdId, spawn: &GuardSpawn) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut spawn = spawn.clone();
        spawn.hired = true;
        self.guard_spawns
            .entry((stronghold, true))
            .or_default()
            .push(spawn);
        Ok(())
    }

    fn delete_hired_guards(&self, stronghold: StrongholdId) -> Result<(), StoreError> {
        self.check_writable()?;
        self.guard_spawns.remove(&(stronghold, true));
        Ok(())
    }
}

// === FACTIONS ===

/// In-memory faction registry with mutable reputation
#[derive(Default)]
pub struct InMemoryFactions {
    factions: DashMap<FactionId, FactionInfo>,
    reputation: DashMap<FactionId, i64>,
}

impl InMemoryFactions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, info: FactionInfo, reputation: i64) {
        self.reputation.insert(info.id, reputation);
        self.factions.insert(info.id, info);
    }
}

impl FactionRegistry for InMemoryFactions {
    fn faction(&self, id: FactionId) -> Option<FactionInfo> {
        self.factions.get(&id).map(|f| f.clone())
    }

    fn alliance_of(&self, id: FactionId) -> Option<AllianceId> {
        self.factions.get(&id).and_then(|f| f.alliance)
    }

    fn alliance_members(&self, alliance: AllianceId) -> Vec<FactionId> {
        let mut members: Vec<FactionId> = self
            .factions
            .iter()
            .filter(|f| f.alliance == Some(alliance))
            .map(|f| f.id)
            .collect();
        members.sort();
        members
    }

    fn reputation(&self, id: FactionId) -> i64 {
        self.reputation.get(&id).map(|r| *r).unwrap_or(0)
    }

    fn add_reputation(&self, id: FactionId, amount: u32) {
        *self.reputation.entry(id).or_insert(0) += i64::from(amount);
    }

    fn take_reputation(&self, id: FactionId, amount: u32) {
        *self.reputation.entry(id).or_insert(0) -= i64::from(amount);
    }

    fn is_leader(&self, faction: FactionId, actor: ActorId) -> bool {
        self.factions
            .get(&faction)
            .map(|f| f.leader == actor)
            .unwrap_or(false)
    }
}

// === ZONES ===

/// Tracks which contest zones are active
#[derive(Default)]
pub struct RecordingZones {
    active: DashMap<StrongholdId, bool>,
    evictions: DashMap<StrongholdId, usize>,
}

impl RecordingZones {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, stronghold: StrongholdId) -> bool {
        self.active.get(&stronghold).map(|a| *a).unwrap_or(false)
    }

    pub fn evictions(&self, stronghold: StrongholdId) -> usize {
        self.evictions.get(&stronghold).map(|e| *e).unwrap_or(0)
    }
}

impl ZoneService for RecordingZones {
    fn enable_contest_zone(&self, stronghold: StrongholdId) {
        self.active.insert(stronghold, true);
    }

    fn disable_contest_zone(&self, stronghold: StrongholdId) {
        self.active.insert(stronghold, false);
    }

    fn evict_non_participants(&self, stronghold: StrongholdId) {
        *self.evictions.entry(stronghold).or_insert(0) += 1;
    }
}

// === BROADCAST ===

/// One delivered message; `recipients` is `None` for server-wide messages
#[derive(Debug, Clone)]
pub struct Delivery {
    pub stronghold: Option<StrongholdId>,
    pub recipients: Option<Vec<FactionId>>,
    pub message: Announcement,
}

/// Keeps every announcement in order; also logs them
#[derive(Default)]
pub struct RecordingBroadcaster {
    log: Mutex<Vec<Delivery>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.log.lock().clone()
    }

    pub fn messages(&self) -> Vec<Announcement> {
        self.log.lock().iter().map(|d| d.message.clone()).collect()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn notify_participants(
        &self,
        stronghold: StrongholdId,
        factions: &[FactionId],
        message: &Announcement,
    ) {
        tracing::debug!(stronghold = %stronghold, recipients = factions.len(), "{}", message);
        self.log.lock().push(Delivery {
            stronghold: Some(stronghold),
            recipients: Some(factions.to_vec()),
            message: message.clone(),
        });
    }

    fn notify_all(&self, message: &Announcement) {
        tracing::debug!("{}", message);
        self.log.lock().push(Delivery {
            stronghold: None,
            recipients: None,
            message: message.clone(),
        });
    }
}

// === SPAWNER ===

/// Keeps the set of live entities
#[derive(Default)]
pub struct RecordingSpawner {
    live: DashMap<EntityId, (u32, Location)>,
    spawned_total: AtomicUsize,
}

impl RecordingSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.live.contains_key(&entity)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live_with_template(&self, template_id: u32) -> usize {
        self.live.iter().filter(|e| e.value().0 == template_id).count()
    }

    pub fn spawned_total(&self) -> usize {
        self.spawned_total.load(Ordering::SeqCst)
    }
}

impl EntitySpawner for RecordingSpawner {
    fn spawn(&self, template_id: u32, location: Location) -> EntityId {
        let entity = EntityId::new();
        self.live.insert(entity, (template_id, location));
        self.spawned_total.fetch_add(1, Ordering::SeqCst);
        entity
    }

    fn despawn(&self, entity: EntityId) {
        self.live.remove(&entity);
    }
}

// === SEEDING ===

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default, rename = "stronghold")]
    strongholds: Vec<StrongholdRecord>,
    #[serde(default, rename = "guard")]
    guards: Vec<GuardSeed>,
    #[serde(default, rename = "faction")]
    factions: Vec<FactionSeed>,
}

#[derive(Debug, Deserialize)]
struct GuardSeed {
    stronghold: StrongholdId,
    #[serde(flatten)]
    spawn: GuardSpawn,
}

#[derive(Debug, Deserialize)]
struct FactionSeed {
    #[serde(flatten)]
    info: FactionInfo,
    #[serde(default)]
    reputation: i64,
}

/// Fully wired in-memory services, keeping typed handles for inspection
pub struct MemoryServices {
    pub store: Arc<InMemoryStore>,
    pub zones: Arc<RecordingZones>,
    pub broadcaster: Arc<RecordingBroadcaster>,
    pub factions: Arc<InMemoryFactions>,
    pub spawner: Arc<RecordingSpawner>,
}

impl MemoryServices {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            zones: Arc::new(RecordingZones::new()),
            broadcaster: Arc::new(RecordingBroadcaster::new()),
            factions: Arc::new(InMemoryFactions::new()),
            spawner: Arc::new(RecordingSpawner::new()),
        }
    }

    /// Populate strongholds, default garrisons and factions from TOML
    pub fn from_seed_toml(content: &str) -> Result<Self, ConfigError> {
        let seed: SeedFile = toml::from_str(content)?;
        let services = Self::new();

        for record in seed.strongholds {
            services.store.insert_stronghold(record);
        }
        for guard in seed.guards {
            let mut spawns = services
                .store
                .load_guard_spawns(guard.stronghold, false)
                .unwrap_or_default();
            let mut spawn = guard.spawn;
            spawn.hired = false;
            spawns.push(spawn);
            services.store.set_default_guards(guard.stronghold, spawns);
        }
        for faction in seed.factions {
            services.factions.insert(faction.info, faction.reputation);
        }

        Ok(services)
    }

    /// Erase the concrete types for the siege subsystem
    pub fn services(&self, clock: Arc<dyn Clock>) -> Services {
        Services {
            store: self.store.clone(),
            zones: self.zones.clone(),
            broadcaster: self.broadcaster.clone(),
            factions: self.factions.clone(),
            spawner: self.spawner.clone(),
            clock,
        }
    }
}

impl Default for MemoryServices {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_keeps_one_row_per_faction() {
        let store = InMemoryStore::new();
        let id = StrongholdId(1);
        store.upsert_membership(id, FactionId(7), Role::PendingDefender).unwrap();
        store.upsert_membership(id, FactionId(7), Role::Defender).unwrap();
        store.upsert_membership(id, FactionId(8), Role::Attacker).unwrap();

        let rows = store.membership(id);
        assert_eq!(rows.len(), 2);
        assert!(rows.contains(&(FactionId(7), Role::Defender)));
    }

    #[test]
    fn test_delete_all_membership() {
        let store = InMemoryStore::new();
        let id = StrongholdId(1);
        store.upsert_membership(id, FactionId(7), Role::Attacker).unwrap();
        store.delete_membership(id, None).unwrap();
        assert!(store.membership(id).is_empty());
    }

    #[test]
    fn test_failing_writes_leave_reads_working() {
        let store = InMemoryStore::new();
        let id = StrongholdId(1);
        store.save_tower_upgrade(id, 0, 3).unwrap();
        store.set_fail_writes(true);

        assert!(matches!(
            store.save_tower_upgrade(id, 0, 1),
            Err(StoreError::Unavailable(_))
        ));
        assert_eq!(store.load_tower_upgrade(id, 0).unwrap(), 3);
    }

    #[test]
    fn test_tower_upgrades_are_per_stronghold() {
        let store = InMemoryStore::new();
        store.save_tower_upgrade(StrongholdId(1), 0, 2).unwrap();
        store.save_tower_upgrade(StrongholdId(2), 0, 5).unwrap();
        store.delete_all_tower_upgrades(StrongholdId(1)).unwrap();

        assert_eq!(store.tower_upgrade(StrongholdId(1), 0), 0);
        assert_eq!(store.tower_upgrade(StrongholdId(2), 0), 5);
    }

    #[test]
    fn test_reputation_can_go_negative() {
        let factions = InMemoryFactions::new();
        factions.insert(
            FactionInfo {
                id: FactionId(1),
                name: "Wolves".into(),
                level: 5,
                member_count: 10,
                alliance: None,
                leader: ActorId(100),
            },
            200,
        );
        factions.take_reputation(FactionId(1), 500);
        assert_eq!(factions.reputation(FactionId(1)), -300);
        assert!(factions.is_leader(FactionId(1), ActorId(100)));
        assert!(!factions.is_leader(FactionId(1), ActorId(101)));
    }

    #[test]
    fn test_seed_file_populates_everything() {
        let seed = r#"
[[stronghold]]
id = 1
name = "Giran"
siege_day = "Sun"
siege_hour = 20
bounds = { min = [0.0, 0.0, -100.0], max = [1000.0, 1000.0, 100.0] }
gates = [{ id = 1, open = true, integrity = 1000, max_integrity = 1000 }]

[[guard]]
stronghold = 1
template_id = 35100
location = [10.0, 10.0, 0.0]
respawn_delay_secs = 60

[[faction]]
id = 10
name = "Wolves"
level = 5
member_count = 20
leader = 1000
reputation = 2000
"#;
        let services = MemoryServices::from_seed_toml(seed).expect("valid seed");
        let records = services.store.load_strongholds().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].gates.len(), 1);
        assert_eq!(services.store.load_guard_spawns(StrongholdId(1), false).unwrap().len(), 1);
        assert_eq!(services.factions.reputation(FactionId(10)), 2000);
    }
}
