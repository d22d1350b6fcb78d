//! Towers that exist only while a battle runs

use serde::Serialize;

use crate::core::types::{EntityId, Location};
use crate::layout::TowerTemplate;
use crate::services::spawner::EntitySpawner;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Installation {
    /// Keeps its bound guard detachments alive
    ControlTower {
        index: u32,
        template_id: u32,
        location: Location,
        entity: EntityId,
        upgrade_level: u32,
        guards: Vec<usize>,
    },
    FlameTower {
        index: u32,
        template_id: u32,
        location: Location,
        entity: EntityId,
        upgrade_level: u32,
    },
}

impl Installation {
    pub fn entity(&self) -> EntityId {
        match self {
            Installation::ControlTower { entity, .. } | Installation::FlameTower { entity, .. } => *entity,
        }
    }

    pub fn index(&self) -> u32 {
        match self {
            Installation::ControlTower { index, .. } | Installation::FlameTower { index, .. } => *index,
        }
    }

    pub fn upgrade_level(&self) -> u32 {
        match self {
            Installation::ControlTower { upgrade_level, .. }
            | Installation::FlameTower { upgrade_level, .. } => *upgrade_level,
        }
    }

    pub fn is_control_tower(&self) -> bool {
        matches!(self, Installation::ControlTower { .. })
    }
}

/// Tower template paired with its stored upgrade level
#[derive(Debug, Clone)]
pub struct TowerPlan<'a> {
    pub template: &'a TowerTemplate,
    pub upgrade_level: u32,
    /// Detachments bound to a control tower
    pub guards: Vec<usize>,
}

/// Assign every detachment to its closest control tower
///
/// Returns one list of detachment indexes per tower, in tower order. With no
/// towers nothing is bound.
pub fn bind_detachments(towers: &[Location], detachments: &[Location]) -> Vec<Vec<usize>> {
    let mut bound = vec![Vec::new(); towers.len()];
    for (index, point) in detachments.iter().enumerate() {
        let nearest = towers
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.distance_squared(*point).total_cmp(&b.distance_squared(*point)))
            .map(|(tower, _)| tower);
        if let Some(tower) = nearest {
            bound[tower].push(index);
        }
    }
    bound
}

/// Live installations of one battle
#[derive(Debug, Default)]
pub struct Installations {
    items: Vec<Installation>,
    control_tower_count: usize,
}

impl Installations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn every tower; the caller despawns any previous set first
    pub fn spawn(
        spawner: &dyn EntitySpawner,
        control_towers: Vec<TowerPlan<'_>>,
        flame_towers: Vec<TowerPlan<'_>>,
    ) -> Self {
        let mut items = Vec::with_capacity(control_towers.len() + flame_towers.len());
        for plan in control_towers {
            items.push(Installation::ControlTower {
                index: plan.template.index,
                template_id: plan.template.template_id,
                location: plan.template.location,
                entity: spawner.spawn(plan.template.template_id, plan.template.location),
                upgrade_level: plan.upgrade_level,
                guards: plan.guards,
            });
        }
        let control_tower_count = items.len();
        for plan in flame_towers {
            items.push(Installation::FlameTower {
                index: plan.template.index,
                template_id: plan.template.template_id,
                location: plan.template.location,
                entity: spawner.spawn(plan.template.template_id, plan.template.location),
                upgrade_level: plan.upgrade_level,
            });
        }
        Self {
            items,
            control_tower_count,
        }
    }

    pub fn despawn_all(&mut self, spawner: &dyn EntitySpawner) -> usize {
        let count = self.items.len();
        for item in self.items.drain(..) {
            spawner.despawn(item.entity());
        }
        self.control_tower_count = 0;
        count
    }

    /// Forget a destroyed installation and return it
    pub fn on_destroyed(&mut self, entity: EntityId) -> Option<Installation> {
        let position = self.items.iter().position(|i| i.entity() == entity)?;
        let item = self.items.remove(position);
        if item.is_control_tower() {
            self.control_tower_count = self.control_tower_count.saturating_sub(1);
        }
        Some(item)
    }

    /// Live control towers
    pub fn control_tower_count(&self) -> usize {
        self.control_tower_count
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Installation> {
        self.items.iter()
    }
}
