//! Siege configuration with documented constants
//!
//! All tunable numbers of the siege cycle are collected here. Durations are
//! stored as plain integers with their unit in the field name so the TOML
//! file stays readable.

use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the siege cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiegeConfig {
    // === CYCLE ===
    /// Days between two battles of the same stronghold
    ///
    /// The next date is always snapped back onto the stronghold's weekly
    /// slot, so this should be a multiple of 7.
    pub cycle_days: i64,

    /// Length of the battle phase in minutes
    pub battle_length_minutes: i64,

    /// How long before the battle registration opens (hours)
    ///
    /// Everything between the end of the previous battle and this point is
    /// the cooldown phase.
    pub registration_open_lead_hours: i64,

    /// How long before the battle registration closes (hours)
    pub registration_close_lead_hours: i64,

    // === REGISTRATION ===
    /// Maximum number of attacking factions per contest
    pub attacker_cap: usize,

    /// Maximum number of defending plus pending-defending factions
    pub defender_cap: usize,

    /// Minimum faction level required to register
    pub min_faction_level: u32,

    /// Minimum faction member count required to register
    pub min_faction_members: u32,

    // === GARRISON ===
    /// Maximum number of hired guards activated for an owned stronghold
    pub hired_guard_cap: usize,

    /// Treasury cost of hiring one guard
    pub guard_hire_cost: u64,

    // === OUTCOME ===
    /// Reputation lost by a defeated owner, and the most a new owner can gain
    pub reputation_transfer: u32,

    /// Reputation awarded to an owner who holds the stronghold
    pub reputation_defended: u32,

    /// Gate integrity ratio after the ownership changed mid-battle
    pub weakened_gate_ratio: f32,

    // === BATTLE ===
    /// Remaining-time checkpoints announced during battle (seconds)
    ///
    /// Must be strictly descending.
    pub countdown_checkpoints_secs: Vec<i64>,

    /// How many banners one faction may plant in a single battle
    pub max_banners_per_faction: usize,

    /// Spawn template used for planted banners
    pub banner_template_id: u32,
}

impl Default for SiegeConfig {
    fn default() -> Self {
        Self {
            // Two weeks, two hours of fighting
            cycle_days: 14,
            battle_length_minutes: 120,
            registration_open_lead_hours: 12 * 24,
            registration_close_lead_hours: 24,

            // Registration
            attacker_cap: 500,
            defender_cap: 500,
            min_faction_level: 4,
            min_faction_members: 5,

            // Garrison
            hired_guard_cap: 20,
            guard_hire_cost: 50_000,

            // Outcome
            reputation_transfer: 1500,
            reputation_defended: 750,
            weakened_gate_ratio: 0.5,

            // Battle
            countdown_checkpoints_secs: vec![7200, 3600, 600, 300, 10],
            max_banners_per_faction: 1,
            banner_template_id: 35062,
        }
    }
}

impl SiegeConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SiegeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn cycle(&self) -> Duration {
        Duration::days(self.cycle_days)
    }

    pub fn battle_length(&self) -> Duration {
        Duration::minutes(self.battle_length_minutes)
    }

    pub fn registration_open_lead(&self) -> Duration {
        Duration::hours(self.registration_open_lead_hours)
    }

    pub fn registration_close_lead(&self) -> Duration {
        Duration::hours(self.registration_close_lead_hours)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_days <= 0 || self.battle_length_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "cycle_days and battle_length_minutes must be positive".into(),
            ));
        }

        if self.registration_close_lead_hours <= 0
            || self.registration_close_lead_hours >= self.registration_open_lead_hours
        {
            return Err(ConfigError::Invalid(format!(
                "registration_close_lead_hours ({}) must be positive and below registration_open_lead_hours ({})",
                self.registration_close_lead_hours, self.registration_open_lead_hours
            )));
        }

        // Registration must open after the previous battle is over
        if self.registration_open_lead() + self.battle_length() >= self.cycle() {
            return Err(ConfigError::Invalid(format!(
                "registration_open_lead_hours ({}) leaves no cooldown inside a {}-day cycle",
                self.registration_open_lead_hours, self.cycle_days
            )));
        }

        if self
            .countdown_checkpoints_secs
            .windows(2)
            .any(|pair| pair[0] <= pair[1])
            || self.countdown_checkpoints_secs.iter().any(|secs| *secs <= 0)
        {
            return Err(ConfigError::Invalid(
                "countdown_checkpoints_secs must be positive and strictly descending".into(),
            ));
        }

        if !(self.weakened_gate_ratio > 0.0 && self.weakened_gate_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "weakened_gate_ratio ({}) must be in (0, 1]",
                self.weakened_gate_ratio
            )));
        }

        Ok(())
    }
}
