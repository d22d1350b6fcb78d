//! External collaborators of the siege subsystem
//!
//! Storage, zones, broadcasts, factions and entity spawning live outside this
//! crate. Each is a trait here; `memory` provides in-process implementations
//! used by the demo binary and the tests.

pub mod broadcast;
pub mod faction;
pub mod memory;
pub mod spawner;
pub mod store;
pub mod zone;

use std::sync::Arc;

use crate::core::clock::Clock;

pub use broadcast::{Announcement, Broadcaster};
pub use faction::{FactionInfo, FactionRegistry};
pub use spawner::EntitySpawner;
pub use store::{ContestSchedule, SiegeStore, StoreError};
pub use zone::ZoneService;

/// Handles to every collaborator, passed explicitly to whoever needs them
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn SiegeStore>,
    pub zones: Arc<dyn ZoneService>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub factions: Arc<dyn FactionRegistry>,
    pub spawner: Arc<dyn EntitySpawner>,
    pub clock: Arc<dyn Clock>,
}
