//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;

use serde::Deserialize;

use crate::error::{CacheError, Result};

/// Default TTL in seconds applied when a caller omits one
pub const DEFAULT_TTL_SECONDS: u64 = 1800;

/// Default namespace prefix prepended to every logical key
pub const DEFAULT_KEY_PREFIX: &str = "cache_";

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Default TTL in seconds for entries without explicit TTL
    pub default_ttl_seconds: u64,
    /// Prefix separating this cache's keys from other users of the store
    pub key_prefix: String,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 1800)
    /// - `CACHE_KEY_PREFIX` - Key namespace prefix (default: "cache_")
    pub fn from_env() -> Self {
        Self {
            default_ttl_seconds: env::var("CACHE_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|ttl| *ttl > 0)
                .unwrap_or(DEFAULT_TTL_SECONDS),
            key_prefix: env::var("CACHE_KEY_PREFIX")
                .ok()
                .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
        }
    }

    /// Rejects settings that would let a non-positive TTL reach the store.
    pub fn validate(&self) -> Result<()> {
        if self.default_ttl_seconds == 0 {
            return Err(CacheError::Validation(
                "Default TTL must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.default_ttl_seconds, 1800);
        assert_eq!(config.key_prefix, "cache_");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_env() {
        // Single test touches the env so parallel tests don't race on it
        env::remove_var("CACHE_DEFAULT_TTL");
        env::remove_var("CACHE_KEY_PREFIX");

        let config = CacheConfig::from_env();
        assert_eq!(config, CacheConfig::default());

        env::set_var("CACHE_DEFAULT_TTL", "60");
        env::set_var("CACHE_KEY_PREFIX", "app_");
        let config = CacheConfig::from_env();
        assert_eq!(config.default_ttl_seconds, 60);
        assert_eq!(config.key_prefix, "app_");

        env::set_var("CACHE_DEFAULT_TTL", "0");
        assert_eq!(CacheConfig::from_env().default_ttl_seconds, 1800);

        env::remove_var("CACHE_DEFAULT_TTL");
        env::remove_var("CACHE_KEY_PREFIX");
    }

    #[test]
    fn test_config_deserialize_partial() {
        let config: CacheConfig = serde_json::from_str(r#"{"defaultTtlSeconds": 90}"#).unwrap();
        assert_eq!(config.default_ttl_seconds, 90);
        assert_eq!(config.key_prefix, "cache_");
    }

    #[test]
    fn test_validate_zero_ttl() {
        let config = CacheConfig {
            default_ttl_seconds: 0,
            ..CacheConfig::default()
        };
        assert!(matches!(config.validate(), Err(CacheError::Validation(_))));
    }
}
