//! Capturable strongholds
//!
//! A `Stronghold` is the durable asset a contest is fought over: its owner,
//! treasury, tax rate, weekly siege slot, territory and gates. It is loaded
//! once from storage and lives for the whole process.

pub mod gate;
pub mod registry;

use chrono::{NaiveTime, Timelike, Weekday};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::config::ConfigError;
use crate::core::error::{Result, SiegeError};
use crate::core::types::{Bounds, FactionId, StrongholdId};
use crate::services::store::{SiegeStore, StoreError};

pub use gate::Gate;
pub use registry::StrongholdRegistry;

/// Upper bound of any tax rate, whatever the external seal rule allows
pub const MAX_TAX_RATE: u8 = 25;

/// Persisted shape of a stronghold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrongholdRecord {
    pub id: StrongholdId,
    pub name: String,
    #[serde(default)]
    pub owner: Option<FactionId>,
    #[serde(default)]
    pub treasury: u64,
    #[serde(default)]
    pub tax_rate: u8,
    pub siege_day: Weekday,
    pub siege_hour: u32,
    pub bounds: Bounds,
    #[serde(default)]
    pub gates: Vec<Gate>,
}

/// Weekly time slot every battle of a stronghold starts at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiegeSlot {
    pub day: Weekday,
    pub time: NaiveTime,
}

impl SiegeSlot {
    /// `None` when `hour` is not a valid hour of day
    pub fn new(day: Weekday, hour: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, 0, 0).map(|time| Self { day, time })
    }
}

#[derive(Debug, Clone)]
struct Holdings {
    owner: Option<FactionId>,
    treasury: u64,
    tax_rate: u8,
}

pub struct Stronghold {
    id: StrongholdId,
    name: String,
    slot: SiegeSlot,
    bounds: Bounds,
    holdings: RwLock<Holdings>,
    gates: RwLock<Vec<Gate>>,
}

impl Stronghold {
    pub fn from_record(record: StrongholdRecord) -> Result<Self> {
        let slot = SiegeSlot::new(record.siege_day, record.siege_hour).ok_or_else(|| {
            SiegeError::Config(ConfigError::Invalid(format!(
                "stronghold {} has invalid siege hour {}",
                record.name, record.siege_hour
            )))
        })?;

        Ok(Self {
            id: record.id,
            name: record.name,
            slot,
            bounds: record.bounds,
            holdings: RwLock::new(Holdings {
                owner: record.owner,
                treasury: record.treasury,
                tax_rate: record.tax_rate.min(MAX_TAX_RATE),
            }),
            gates: RwLock::new(record.gates),
        })
    }

    /// Snapshot in the persisted shape
    pub fn record(&self) -> StrongholdRecord {
        let holdings = self.holdings.read().clone();
        StrongholdRecord {
            id: self.id,
            name: self.name.clone(),
            owner: holdings.owner,
            treasury: holdings.treasury,
            tax_rate: holdings.tax_rate,
            siege_day: self.slot.day,
            siege_hour: self.slot.time.hour(),
            bounds: self.bounds,
            gates: self.gates(),
        }
    }

    pub fn id(&self) -> StrongholdId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slot(&self) -> SiegeSlot {
        self.slot
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn owner(&self) -> Option<FactionId> {
        self.holdings.read().owner
    }

    /// Returns the previous owner
    pub fn set_owner(&self, owner: Option<FactionId>) -> Option<FactionId> {
        std::mem::replace(&mut self.holdings.write().owner, owner)
    }

    pub fn treasury(&self) -> u64 {
        self.holdings.read().treasury
    }

    /// Saturating deposit; returns the new balance
    pub fn deposit(&self, amount: u64) -> u64 {
        let mut holdings = self.holdings.write();
        holdings.treasury = holdings.treasury.saturating_add(amount);
        holdings.treasury
    }

    /// Checked withdrawal; returns the new balance
    pub fn withdraw(&self, amount: u64) -> Result<u64> {
        let mut holdings = self.holdings.write();
        let available = holdings.treasury;
        holdings.treasury = available
            .checked_sub(amount)
            .ok_or(SiegeError::InsufficientFunds { requested: amount, available })?;
        Ok(holdings.treasury)
    }

    pub fn tax_rate(&self) -> u8 {
        self.holdings.read().tax_rate
    }

    /// `cap` comes from the external seal rule and is itself clamped to 25%
    pub fn set_tax_rate(&self, rate: u8, cap: u8) -> Result<()> {
        let cap = cap.min(MAX_TAX_RATE);
        if rate > cap {
            return Err(SiegeError::TaxRateOutOfRange { rate, cap });
        }
        self.holdings.write().tax_rate = rate;
        Ok(())
    }

    pub fn gates(&self) -> Vec<Gate> {
        self.gates.read().clone()
    }

    /// Reset every gate and return the new states for persistence
    pub fn respawn_gates(&self, open: bool, integrity_ratio: f32) -> Vec<Gate> {
        let mut gates = self.gates.write();
        for gate in gates.iter_mut() {
            gate.respawn(open, integrity_ratio);
        }
        gates.clone()
    }

    pub fn damage_gate(&self, gate_id: u32, amount: u32) -> Option<Gate> {
        let mut gates = self.gates.write();
        let gate = gates.iter_mut().find(|g| g.id == gate_id)?;
        gate.damage(amount);
        Some(gate.clone())
    }

    pub fn set_gate_open(&self, gate_id: u32, open: bool) -> Option<Gate> {
        let mut gates = self.gates.write();
        let gate = gates.iter_mut().find(|g| g.id == gate_id)?;
        gate.open = open;
        Some(gate.clone())
    }

    /// Persist owner, treasury and tax rate
    pub fn persist(&self, store: &dyn SiegeStore) -> std::result::Result<(), StoreError> {
        store.save_stronghold(&self.record())
    }

    pub fn persist_gates(
        &self,
        store: &dyn SiegeStore,
        gates: &[Gate],
    ) -> std::result::Result<(), StoreError> {
        for gate in gates {
            store.save_gate(self.id, gate)?;
        }
        Ok(())
    }
}
