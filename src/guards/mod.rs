//! Passive stronghold defenders
//!
//! A stronghold is defended either by its default garrison or, once owned,
//! by mercenaries its owner hired. Both are described by [`GuardSpawn`] rows
//! in storage and brought to life by the [`GuardDetachmentManager`] only
//! while a battle is running.

pub mod detachment;

use serde::{Deserialize, Serialize};

use crate::core::types::Location;

pub use detachment::GuardDetachmentManager;

/// Stored descriptor of one guard detachment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardSpawn {
    pub template_id: u32,
    pub location: Location,
    /// Seconds before a killed guard returns; ignored for hired guards
    pub respawn_delay_secs: u64,
    #[serde(default)]
    pub hired: bool,
}

impl GuardSpawn {
    pub fn new(template_id: u32, location: Location, respawn_delay_secs: u64) -> Self {
        Self {
            template_id,
            location,
            respawn_delay_secs,
            hired: false,
        }
    }

    pub fn respawn_delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.respawn_delay_secs)
    }
}
