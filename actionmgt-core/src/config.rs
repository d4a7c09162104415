//! Deployment configuration injected into the management services
//!
//! Nothing here is read from ambient global state by the services; a value
//! is built once (defaults, environment or a TOML file) and handed to the
//! service constructor.

use crate::error::{ActionMgtResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_MAX_ACTIONS_PER_TYPE: usize = 1;
pub const DEFAULT_MAX_ENTRIES_PER_TENANT: usize = 1000;
pub const DEFAULT_MAX_TENANTS: usize = 10_000;

/// Cache settings for the cache-backed stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// When false the cache-backed stores pass every call straight through.
    pub enabled: bool,
    /// LRU capacity of each tenant's partition, per cache.
    pub max_entries_per_tenant: usize,
    /// Tenants holding cached entries at once, per cache. Past this the
    /// least recently used tenant's entries are dropped.
    pub max_tenants: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries_per_tenant: DEFAULT_MAX_ENTRIES_PER_TENANT,
            max_tenants: DEFAULT_MAX_TENANTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActionMgtConfig {
    /// Quota of actions per (tenant, type).
    pub max_actions_per_type: usize,
    /// Accept plain `http://` endpoint URIs.
    pub allow_insecure_endpoints: bool,
    pub cache: CacheConfig,
}

impl Default for ActionMgtConfig {
    fn default() -> Self {
        Self {
            max_actions_per_type: DEFAULT_MAX_ACTIONS_PER_TYPE,
            allow_insecure_endpoints: false,
            cache: CacheConfig::default(),
        }
    }
}

impl ActionMgtConfig {
    pub fn with_max_actions_per_type(mut self, max: usize) -> Self {
        self.max_actions_per_type = max;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_allow_insecure_endpoints(mut self, allow: bool) -> Self {
        self.allow_insecure_endpoints = allow;
        self
    }

    /// Read configuration from `ACTIONMGT_*` environment variables.
    ///
    /// Unset or unparseable variables fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_actions_per_type = lookup("ACTIONMGT_MAX_ACTIONS_PER_TYPE")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.max_actions_per_type);

        let allow_insecure_endpoints = lookup("ACTIONMGT_ALLOW_INSECURE_ENDPOINTS")
            .map(|s| s.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(defaults.allow_insecure_endpoints);

        let enabled = lookup("ACTIONMGT_CACHE_ENABLED")
            .map(|s| !s.trim().eq_ignore_ascii_case("false"))
            .unwrap_or(defaults.cache.enabled);

        let max_entries_per_tenant = lookup("ACTIONMGT_CACHE_MAX_ENTRIES_PER_TENANT")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.cache.max_entries_per_tenant);

        let max_tenants = lookup("ACTIONMGT_CACHE_MAX_TENANTS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.cache.max_tenants);

        Self {
            max_actions_per_type,
            allow_insecure_endpoints,
            cache: CacheConfig {
                enabled,
                max_entries_per_tenant,
                max_tenants,
            },
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> ActionMgtResult<Self> {
        let config: ActionMgtConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> ActionMgtResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject values no deployment can work with. The service constructors
    /// call this.
    pub fn validate(&self) -> ActionMgtResult<()> {
        if self.max_actions_per_type == 0 {
            return Err(zero_value("max_actions_per_type", "must be positive"));
        }
        if self.cache.enabled {
            if self.cache.max_entries_per_tenant == 0 {
                return Err(zero_value(
                    "cache.max_entries_per_tenant",
                    "must be positive when the cache is enabled",
                ));
            }
            if self.cache.max_tenants == 0 {
                return Err(zero_value(
                    "cache.max_tenants",
                    "must be positive when the cache is enabled",
                ));
            }
        }
        Ok(())
    }
}

fn zero_value(field: &str, reason: &str) -> crate::error::ActionMgtError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: "0".to_string(),
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionMgtError;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ActionMgtConfig::default();
        assert_eq!(config.max_actions_per_type, 1);
        assert!(!config.allow_insecure_endpoints);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_entries_per_tenant, 1000);
        assert_eq!(config.cache.max_tenants, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_reads_and_falls_back() {
        let vars: HashMap<&str, &str> = [
            ("ACTIONMGT_MAX_ACTIONS_PER_TYPE", "5"),
            ("ACTIONMGT_ALLOW_INSECURE_ENDPOINTS", "TRUE"),
            ("ACTIONMGT_CACHE_ENABLED", "false"),
            ("ACTIONMGT_CACHE_MAX_ENTRIES_PER_TENANT", "not-a-number"),
            ("ACTIONMGT_CACHE_MAX_TENANTS", "64"),
        ]
        .into_iter()
        .collect();
        let config = ActionMgtConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.max_actions_per_type, 5);
        assert!(config.allow_insecure_endpoints);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.max_entries_per_tenant, 1000);
        assert_eq!(config.cache.max_tenants, 64);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = ActionMgtConfig::from_toml_str(
            "max_actions_per_type = 3\n[cache]\nmax_entries_per_tenant = 16\n",
        )
        .unwrap();
        assert_eq!(config.max_actions_per_type, 3);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_entries_per_tenant, 16);
    }

    #[test]
    fn test_from_toml_rejects_unknown_and_zero_capacity() {
        assert!(matches!(
            ActionMgtConfig::from_toml_str("max_action = 3"),
            Err(ActionMgtError::Config(ConfigError::Parse { .. }))
        ));
        assert!(matches!(
            ActionMgtConfig::from_toml_str("[cache]\nmax_entries_per_tenant = 0"),
            Err(ActionMgtError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_zero_capacity_allowed_when_disabled() {
        let config = ActionMgtConfig::default().with_cache(CacheConfig {
            enabled: false,
            max_entries_per_tenant: 0,
            max_tenants: 0,
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_quota_is_rejected() {
        let err = ActionMgtConfig::default()
            .with_max_actions_per_type(0)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ActionMgtError::Config(ConfigError::InvalidValue { ref field, .. })
                if field == "max_actions_per_type"
        ));
        assert!(matches!(
            ActionMgtConfig::from_toml_str("max_actions_per_type = 0"),
            Err(ActionMgtError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_zero_tenant_limit_is_rejected() {
        let config = ActionMgtConfig::default().with_cache(CacheConfig {
            max_tenants: 0,
            ..CacheConfig::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = ActionMgtConfig::from_path(Path::new("/nonexistent/actionmgt.toml")).unwrap_err();
        assert!(matches!(err, ActionMgtError::Config(ConfigError::Io { .. })));
    }
}
