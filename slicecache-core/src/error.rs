//! Error types for slice cache operations

use thiserror::Error;

/// Ledger contract violations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("New item {id} for {key} is not newer than known top {top}")]
    NonMonotonicNew { key: String, id: String, top: String },

    #[error("Item {id} for {key} is a boundary sentinel, not a real identifier")]
    SentinelId { key: String, id: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Backing store fetch errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Fetch for {key} failed: {reason}")]
    Failed { key: String, reason: String },

    #[error("Backing store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Master error type for all slice cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
}

/// Result type alias for slice cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
