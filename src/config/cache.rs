use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Authorization cache configuration, shared by every caching realm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationCacheConfig {
    /// Master switch. Realms may still opt out individually.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds an entry stays valid. `0` disables expiry.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of entries per realm.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Entries evicted at once when a realm's cache is full.
    #[serde(default = "default_eviction_batch_size")]
    pub eviction_batch_size: usize,
}

impl Default for AuthorizationCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
            eviction_batch_size: default_eviction_batch_size(),
        }
    }
}

impl AuthorizationCacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::Validation(
                "cache.max_entries must be greater than 0".into(),
            ));
        }
        if self.eviction_batch_size == 0 {
            return Err(ConfigError::Validation(
                "cache.eviction_batch_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_max_entries() -> usize {
    10_000
}

fn default_eviction_batch_size() -> usize {
    100
}
