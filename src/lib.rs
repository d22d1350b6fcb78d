//! Stronghold Siege - capturable castle contests
//!
//! Drives each stronghold through registration, battle and cooldown,
//! keeps the contest rosters, spawns and removes the battle installations
//! and guards, and settles ownership when the fighting stops.

pub mod coordinator;
pub mod core;
pub mod guards;
pub mod layout;
pub mod services;
pub mod siege;
pub mod stronghold;

pub use coordinator::Coordinator;
