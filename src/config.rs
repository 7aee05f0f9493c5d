// ⚙️ Application configuration
//
// Defaults → COLLECTORKING_* environment → CLI flags (applied by the binary).

use crate::catalog::DEFAULT_CATALOG_URL;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB: &str = "COLLECTORKING_DB";
pub const ENV_IMAGE_DIR: &str = "COLLECTORKING_IMAGE_DIR";
pub const ENV_CATALOG_URL: &str = "COLLECTORKING_CATALOG_URL";
pub const ENV_DEBUG: &str = "COLLECTORKING_DEBUG";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub image_dir: PathBuf,
    pub catalog_base_url: String,
    pub metadata_timeout: Duration,
    pub image_timeout: Duration,
    /// Pause between rows during import and refresh
    pub row_delay: Duration,
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            db_path: PathBuf::from("ygo_collection.db"),
            image_dir: PathBuf::from("images"),
            catalog_base_url: DEFAULT_CATALOG_URL.to_string(),
            metadata_timeout: Duration::from_secs(20),
            image_timeout: Duration::from_secs(30),
            row_delay: Duration::from_millis(10),
            debug: false,
        }
    }
}

impl AppConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns; blank values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = AppConfig::default();

        if let Some(db) = get(ENV_DB) {
            config.db_path = PathBuf::from(db);
        }
        if let Some(dir) = get(ENV_IMAGE_DIR) {
            config.image_dir = PathBuf::from(dir);
        }
        if let Some(url) = get(ENV_CATALOG_URL) {
            config.catalog_base_url = url;
        }
        if let Some(flag) = get(ENV_DEBUG) {
            config.debug = is_truthy(&flag);
        }

        config
    }

    /// Log filter the binary installs unless RUST_LOG says otherwise
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[]));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.db_path, PathBuf::from("ygo_collection.db"));
        assert_eq!(config.catalog_base_url, "https://db.ygoprodeck.com/api/v7");
        assert_eq!(config.metadata_timeout, Duration::from_secs(20));
        assert_eq!(config.image_timeout, Duration::from_secs(30));
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn test_environment_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_DB, "/tmp/cards.db"),
            (ENV_IMAGE_DIR, "/tmp/img"),
            (ENV_CATALOG_URL, "http://localhost:8080/api/v7"),
            (ENV_DEBUG, "1"),
        ]));

        assert_eq!(config.db_path, PathBuf::from("/tmp/cards.db"));
        assert_eq!(config.image_dir, PathBuf::from("/tmp/img"));
        assert_eq!(config.catalog_base_url, "http://localhost:8080/api/v7");
        assert!(config.debug);
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn test_blank_and_falsy_values() {
        let config = AppConfig::from_lookup(lookup(&[(ENV_DB, "  "), (ENV_DEBUG, "0")]));
        assert_eq!(config.db_path, PathBuf::from("ygo_collection.db"));
        assert!(!config.debug);
    }
}
