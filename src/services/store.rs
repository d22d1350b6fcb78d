//! Persistence contract consumed by the siege subsystem
//!
//! All calls are synchronous from the caller's point of view. Callers never
//! hold a contest lock while calling into the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{FactionId, Role, StrongholdId};
use crate::guards::GuardSpawn;
use crate::stronghold::{Gate, StrongholdRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

/// Persisted schedule of one stronghold's next contest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestSchedule {
    pub contest_date: Option<DateTime<Utc>>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub registration_closed: bool,
}

pub trait SiegeStore: Send + Sync {
    fn load_strongholds(&self) -> Result<Vec<StrongholdRecord>, StoreError>;

    /// Owner, treasury and tax rate
    fn save_stronghold(&self, record: &StrongholdRecord) -> Result<(), StoreError>;

    fn save_gate(&self, stronghold: StrongholdId, gate: &Gate) -> Result<(), StoreError>;

    fn load_contest_schedule(&self, stronghold: StrongholdId) -> Result<ContestSchedule, StoreError>;

    fn save_contest_schedule(
        &self,
        stronghold: StrongholdId,
        schedule: &ContestSchedule,
    ) -> Result<(), StoreError>;

    fn load_membership(&self, stronghold: StrongholdId) -> Result<Vec<(FactionId, Role)>, StoreError>;

    /// Insert or replace the single row keyed by `faction`
    fn upsert_membership(
        &self,
        stronghold: StrongholdId,
        faction: FactionId,
        role: Role,
    ) -> Result<(), StoreError>;

    /// Delete one faction's row, or every row when `faction` is `None`
    fn delete_membership(
        &self,
        stronghold: StrongholdId,
        faction: Option<FactionId>,
    ) -> Result<(), StoreError>;

    /// Upgrade level of a tower; 0 when never upgraded
    fn load_tower_upgrade(&self, stronghold: StrongholdId, tower_index: u32) -> Result<u32, StoreError>;

    fn save_tower_upgrade(
        &self,
        stronghold: StrongholdId,
        tower_index: u32,
        level: u32,
    ) -> Result<(), StoreError>;

    fn delete_all_tower_upgrades(&self, stronghold: StrongholdId) -> Result<(), StoreError>;

    /// Default garrison rows (`hired == false`) or hired mercenary rows
    fn load_guard_spawns(&self, stronghold: StrongholdId, hired: bool) -> Result<Vec<GuardSpawn>, StoreError>;

    fn save_hired_guard(&self, stronghold: StrongholdId, spawn: &GuardSpawn) -> Result<(), StoreError>;

    fn delete_hired_guards(&self, stronghold: StrongholdId) -> Result<(), StoreError>;
}
