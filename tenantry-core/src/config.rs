//! # Tenantry Configuration
//!
//! A minimal, framework-agnostic configuration store based on string
//! key/value pairs, read through an immutable snapshot.
//!
//! ## Setting and reading values
//! ```rust
//! use tenantry_core::TenantryConfig;
//! let mut config = TenantryConfig::new();
//!
//! config.set("http.port", "3000");
//! config.set("tenancy.query_fallback", "true");
//!
//! let snapshot = config.snapshot();
//! assert_eq!(snapshot.get_usize("http.port"), Some(3000));
//! assert_eq!(snapshot.get_bool("tenancy.query_fallback"), Some(true));
//! ```
//!
//! ## Environment overrides
//! `load_env` maps `TENANTRY__TENANCY__QUERY_FALLBACK=true` to
//! `tenancy.query_fallback = "true"`.

use std::collections::HashMap;

pub const HTTP_HOST: &str = "http.host";
pub const HTTP_PORT: &str = "http.port";
/// Enables `?tenant=<id>` resolution when no host matches. Off unless set.
pub const TENANCY_QUERY_FALLBACK: &str = "tenancy.query_fallback";
pub const TENANCY_SEED_FILE: &str = "tenancy.seed_file";

#[derive(Debug, Default, Clone)]
pub struct TenantryConfig {
    values: HashMap<String, String>,
}

impl TenantryConfig {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a configuration key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Get a configuration value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Overlay every `PREFIX...` variable from the process environment.
    pub fn load_env(&mut self, prefix: &str) {
        self.load_vars(prefix, std::env::vars());
    }

    /// Same as [`load_env`](Self::load_env) over an explicit variable list.
    pub fn load_vars<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                if !normalized.is_empty() {
                    self.set(normalized, value);
                }
            }
        }
    }

    pub fn snapshot(&self) -> TenantryConfigSnapshot {
        TenantryConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TenantryConfigSnapshot {
    map: HashMap<String, String>,
}

impl TenantryConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse::<usize>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().to_lowercase().parse::<bool>().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_are_normalized() {
        let mut config = TenantryConfig::new();
        config.load_vars(
            "TENANTRY__",
            vec![
                ("TENANTRY__HTTP__PORT".to_string(), "8080".to_string()),
                ("TENANTRY__TENANCY__QUERY_FALLBACK".to_string(), "TRUE".to_string()),
                ("OTHER__HTTP__PORT".to_string(), "1".to_string()),
            ],
        );

        let snapshot = config.snapshot();
        assert_eq!(snapshot.get_usize(HTTP_PORT), Some(8080));
        assert_eq!(snapshot.get_bool(TENANCY_QUERY_FALLBACK), Some(true));
        assert!(!config.has("other.http.port"));
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let mut config = TenantryConfig::new();
        config.set(HTTP_HOST, "0.0.0.0");
        let snapshot = config.snapshot();
        config.set(HTTP_HOST, "127.0.0.1");
        assert_eq!(snapshot.get(HTTP_HOST), Some("0.0.0.0"));
        assert_eq!(snapshot.get_bool(HTTP_HOST), None);
    }
}
