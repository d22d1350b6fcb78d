//! Stronghold gates
//!
//! Gates are closed for the battle and reopened afterwards. Their integrity
//! is tracked here; the damage itself comes from the combat pipeline.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    pub id: u32,
    pub open: bool,
    pub integrity: u32,
    pub max_integrity: u32,
}

impl Gate {
    pub fn new(id: u32, max_integrity: u32) -> Self {
        Self {
            id,
            open: true,
            integrity: max_integrity,
            max_integrity,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.integrity == 0
    }

    /// Apply damage, returning the remaining integrity
    pub fn damage(&mut self, amount: u32) -> u32 {
        self.integrity = self.integrity.saturating_sub(amount);
        self.integrity
    }

    /// Restore to a fraction of full integrity and set the open state
    pub fn respawn(&mut self, open: bool, integrity_ratio: f32) {
        let ratio = integrity_ratio.clamp(0.0, 1.0);
        self.integrity = ((self.max_integrity as f32) * ratio).round() as u32;
        self.open = open;
    }
}
