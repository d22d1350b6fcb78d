//! World entity spawning for towers, guards and banners

use crate::core::types::{EntityId, Location};

pub trait EntitySpawner: Send + Sync {
    fn spawn(&self, template_id: u32, location: Location) -> EntityId;

    /// Removing an entity that no longer exists is a no-op
    fn despawn(&self, entity: EntityId);
}
