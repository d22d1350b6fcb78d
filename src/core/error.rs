use thiserror::Error;

use crate::core::config::ConfigError;
use crate::core::types::StrongholdId;
use crate::layout::LayoutError;
use crate::services::store::StoreError;
use crate::siege::registration::Rejection;

#[derive(Error, Debug)]
pub enum SiegeError {
    #[error("Stronghold not found: {0}")]
    StrongholdNotFound(StrongholdId),

    #[error("Rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Insufficient treasury funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: u64, available: u64 },

    #[error("Tax rate {rate}% exceeds the allowed maximum of {cap}%")]
    TaxRateOutOfRange { rate: u8, cap: u8 },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("No async runtime available: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SiegeError>;
