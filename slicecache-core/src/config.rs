//! Configuration types

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult, ConfigError};

/// Runtime settings for a slice cache component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Events buffered per channel before slow subscribers start lagging.
    pub event_capacity: usize,
    /// Upper bound applied to `limit_before` and `limit_after` of a query.
    pub max_query_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
            max_query_limit: 1000,
        }
    }
}

impl CacheConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `SLICECACHE_EVENT_CAPACITY`: Events buffered per channel (default: 1024)
    /// - `SLICECACHE_MAX_QUERY_LIMIT`: Largest per-side query limit (default: 1000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            event_capacity: std::env::var("SLICECACHE_EVENT_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.event_capacity),
            max_query_limit: std::env::var("SLICECACHE_MAX_QUERY_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_query_limit),
        }
    }

    /// Set the per-channel event capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Set the query limit cap.
    pub fn with_max_query_limit(mut self, limit: usize) -> Self {
        self.max_query_limit = limit;
        self
    }

    /// Validate the configuration.
    ///
    /// Both values must be positive; a zero-capacity broadcast channel
    /// cannot be created.
    pub fn validate(&self) -> CacheResult<()> {
        if self.event_capacity == 0 {
            return Err(CacheError::Config(ConfigError::InvalidValue {
                field: "event_capacity".to_string(),
                value: self.event_capacity.to_string(),
                reason: "event_capacity must be greater than 0".to_string(),
            }));
        }

        if self.max_query_limit == 0 {
            return Err(CacheError::Config(ConfigError::InvalidValue {
                field: "max_query_limit".to_string(),
                value: self.max_query_limit.to_string(),
                reason: "max_query_limit must be greater than 0".to_string(),
            }));
        }

        Ok(())
    }
}
