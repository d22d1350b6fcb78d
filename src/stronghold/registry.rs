//! Stronghold registry: lookup by id, name and position

use std::sync::Arc;

use ahash::AHashMap;

use crate::core::error::Result;
use crate::core::types::{FactionId, Location, StrongholdId};
use crate::services::store::SiegeStore;
use crate::stronghold::{Stronghold, StrongholdRecord};

/// Read-mostly index of every stronghold in the world
///
/// The set of strongholds is fixed after construction; each stronghold is
/// internally synchronized, so the registry itself needs no lock.
pub struct StrongholdRegistry {
    /// Strongholds indexed by ID
    by_id: AHashMap<StrongholdId, Arc<Stronghold>>,
    /// Lowercased name to ID
    by_name: AHashMap<String, StrongholdId>,
    /// IDs in ascending order for deterministic iteration
    order: Vec<StrongholdId>,
}

impl StrongholdRegistry {
    pub fn from_records(records: Vec<StrongholdRecord>) -> Result<Self> {
        let mut by_id = AHashMap::new();
        let mut by_name = AHashMap::new();
        let mut order = Vec::with_capacity(records.len());

        for record in records {
            let stronghold = Stronghold::from_record(record)?;
            by_name.insert(stronghold.name().to_lowercase(), stronghold.id());
            order.push(stronghold.id());
            by_id.insert(stronghold.id(), Arc::new(stronghold));
        }
        order.sort();
        order.dedup();

        Ok(Self { by_id, by_name, order })
    }

    /// Load every stronghold from storage
    pub fn load(store: &dyn SiegeStore) -> Result<Self> {
        let records = store.load_strongholds()?;
        tracing::info!(count = records.len(), "Loaded strongholds");
        Self::from_records(records)
    }

    pub fn get(&self, id: StrongholdId) -> Option<Arc<Stronghold>> {
        self.by_id.get(&id).cloned()
    }

    /// Case-insensitive name lookup
    pub fn by_name(&self, name: &str) -> Option<Arc<Stronghold>> {
        self.by_name
            .get(&name.to_lowercase())
            .and_then(|id| self.get(*id))
    }

    /// Stronghold whose territory contains `point`
    pub fn by_position(&self, point: Location) -> Option<Arc<Stronghold>> {
        self.iter().find(|s| s.bounds().contains(point))
    }

    /// Stronghold currently owned by `faction`
    pub fn owned_by(&self, faction: FactionId) -> Option<Arc<Stronghold>> {
        self.iter().find(|s| s.owner() == Some(faction))
    }

    pub fn iter(&self) -> impl Iterator<Item = Arc<Stronghold>> + '_ {
        self.order.iter().filter_map(|id| self.get(*id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
