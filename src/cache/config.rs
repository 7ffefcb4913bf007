//! Data source configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration of one logical spreadsheet database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Remote spreadsheet identifier
    pub source_id: String,

    /// Time-to-live of cached pages in seconds (default: 300)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Time-to-live of the name→identifier map (default: cache_ttl_secs)
    #[serde(default)]
    pub name_map_ttl_secs: Option<u64>,

    /// Prefix for every cache key (default: "sheets_db_")
    #[serde(default = "default_key_prefix")]
    pub cache_key_prefix: String,
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_key_prefix() -> String {
    "sheets_db_".to_string()
}

impl SourceConfig {
    /// Creates a config with default ttls
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            cache_ttl_secs: default_cache_ttl(),
            name_map_ttl_secs: None,
            cache_key_prefix: default_key_prefix(),
        }
    }

    /// Sets the page ttl
    pub fn with_cache_ttl(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = secs;
        self
    }

    /// Page ttl
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Name map ttl
    pub fn name_map_ttl(&self) -> Duration {
        Duration::from_secs(self.name_map_ttl_secs.unwrap_or(self.cache_ttl_secs))
    }

    /// Cache key of the name→identifier map
    pub fn name_map_key(&self) -> String {
        format!("{}{}", self.cache_key_prefix, self.source_id)
    }

    /// Cache key of one page
    pub fn page_key(&self, identifier: &str) -> String {
        format!("{}{}_{}", self.cache_key_prefix, self.source_id, identifier)
    }

    /// Checks the config is usable
    pub fn validate(&self) -> Result<(), String> {
        if self.source_id.trim().is_empty() {
            return Err("source_id must not be empty".into());
        }
        if self.cache_ttl_secs == 0 || self.name_map_ttl_secs == Some(0) {
            return Err("cache ttl must be > 0".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let config: SourceConfig = serde_json::from_str(r#"{"source_id": "abc"}"#).unwrap();
        assert_eq!(config.cache_ttl_secs, 300);
        assert_eq!(config.name_map_ttl(), Duration::from_secs(300));
        assert_eq!(config.cache_key_prefix, "sheets_db_");
    }

    #[test]
    fn test_keys() {
        let config = SourceConfig::new("abc");
        assert_eq!(config.name_map_key(), "sheets_db_abc");
        assert_eq!(config.page_key("7"), "sheets_db_abc_7");
    }

    #[test]
    fn test_validate() {
        assert!(SourceConfig::new("abc").validate().is_ok());
        assert!(SourceConfig::new(" ").validate().is_err());
        assert!(SourceConfig::new("abc").with_cache_ttl(0).validate().is_err());
    }
}
