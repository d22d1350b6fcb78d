//! Static tower layouts per stronghold
//!
//! Loaded once at startup and read-only afterwards, so contests share the
//! layouts through an `Arc` without any locking.

mod loader;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{Location, StrongholdId};

pub use loader::{load_layouts, parse_layouts};

/// Errors that can occur when loading layouts
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Stronghold {0} has more than one layout")]
    DuplicateStronghold(StrongholdId),

    #[error("Stronghold {stronghold} reuses tower index {index}")]
    DuplicateTowerIndex { stronghold: StrongholdId, index: u32 },
}

/// One tower spawn point
///
/// `index` keys the tower's persisted upgrade level and is unique across
/// both tower kinds of a stronghold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerTemplate {
    pub index: u32,
    pub template_id: u32,
    pub location: Location,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrongholdLayout {
    #[serde(default, rename = "control_tower")]
    pub control_towers: Vec<TowerTemplate>,
    #[serde(default, rename = "flame_tower")]
    pub flame_towers: Vec<TowerTemplate>,
}

#[derive(Debug, Clone, Default)]
pub struct TowerLayouts {
    layouts: AHashMap<StrongholdId, StrongholdLayout>,
}

impl TowerLayouts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, stronghold: StrongholdId, layout: StrongholdLayout) -> Result<(), LayoutError> {
        let mut seen = ahash::AHashSet::new();
        for tower in layout.control_towers.iter().chain(layout.flame_towers.iter()) {
            if !seen.insert(tower.index) {
                return Err(LayoutError::DuplicateTowerIndex {
                    stronghold,
                    index: tower.index,
                });
            }
        }
        if self.layouts.contains_key(&stronghold) {
            return Err(LayoutError::DuplicateStronghold(stronghold));
        }
        self.layouts.insert(stronghold, layout);
        Ok(())
    }

    pub fn get(&self, stronghold: StrongholdId) -> Option<&StrongholdLayout> {
        self.layouts.get(&stronghold)
    }

    pub fn control_towers(&self, stronghold: StrongholdId) -> &[TowerTemplate] {
        self.get(stronghold)
            .map(|l| l.control_towers.as_slice())
            .unwrap_or(&[])
    }

    pub fn flame_towers(&self, stronghold: StrongholdId) -> &[TowerTemplate] {
        self.get(stronghold)
            .map(|l| l.flame_towers.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}
