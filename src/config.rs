//! Configuration loading and persistence.
//!
//! Timeouts handed to tutors when queued operations are flushed, and the
//! default application id for devices. Stored as JSON; every field can be
//! overridden from the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{fs, path::Path};

use crate::constants::DEFAULT_CONTROL_TIMEOUT_MS;

/// Configuration for the push-notification control channel.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Retry interval hint for device registrations, in milliseconds.
    pub register_timeout_ms: u64,
    /// Retry interval hint for subscription activations, in milliseconds.
    pub subscribe_timeout_ms: u64,
    /// Retry interval hint for subscription deactivations, in milliseconds.
    pub unsubscribe_timeout_ms: u64,
    /// Retry interval hint for filtered deactivations, in milliseconds.
    pub filter_timeout_ms: u64,
    /// Application id used when building a device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            register_timeout_ms: DEFAULT_CONTROL_TIMEOUT_MS,
            subscribe_timeout_ms: DEFAULT_CONTROL_TIMEOUT_MS,
            unsubscribe_timeout_ms: DEFAULT_CONTROL_TIMEOUT_MS,
            filter_timeout_ms: DEFAULT_CONTROL_TIMEOUT_MS,
            application_id: None,
        }
    }
}

impl Config {
    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist, then applies environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid config {}", path.display()))?
        } else {
            log::debug!("[Config] {} not found, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies `MPN_*` environment variables. Unparseable numbers are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let timeouts = [
            ("MPN_REGISTER_TIMEOUT_MS", &mut self.register_timeout_ms),
            ("MPN_SUBSCRIBE_TIMEOUT_MS", &mut self.subscribe_timeout_ms),
            ("MPN_UNSUBSCRIBE_TIMEOUT_MS", &mut self.unsubscribe_timeout_ms),
            ("MPN_FILTER_TIMEOUT_MS", &mut self.filter_timeout_ms),
        ];
        for (name, slot) in timeouts {
            if let Some(raw) = lookup(name) {
                match raw.parse::<u64>() {
                    Ok(ms) => *slot = ms,
                    Err(_) => log::warn!("[Config] Ignoring {}={:?}: not a number", name, raw),
                }
            }
        }

        if let Some(app_id) = lookup("MPN_APP_ID") {
            self.application_id = Some(app_id);
        }
    }

    /// Persists the configuration to `path` as pretty JSON.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write config {}", path.display()))?;

        // Owner read/write only
        #[cfg(unix)]
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.register_timeout_ms, 4000);
        assert_eq!(config.subscribe_timeout_ms, 4000);
        assert_eq!(config.unsubscribe_timeout_ms, 4000);
        assert_eq!(config.filter_timeout_ms, 4000);
        assert!(config.application_id.is_none());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.subscribe_timeout_ms, Config::default().subscribe_timeout_ms);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");
        let config = Config {
            subscribe_timeout_ms: 2500,
            application_id: Some("com.example.app".to_string()),
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        let mut reloaded: Config =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        reloaded.apply_overrides(|_| None);
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"filter_timeout_ms": 9000}"#).unwrap();

        let config: Config = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(config.filter_timeout_ms, 9000);
        assert_eq!(config.register_timeout_ms, 4000);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[
            ("MPN_REGISTER_TIMEOUT_MS", "1500"),
            ("MPN_FILTER_TIMEOUT_MS", "soon"),
            ("MPN_APP_ID", "com.example.push"),
        ]));

        assert_eq!(config.register_timeout_ms, 1500);
        assert_eq!(config.filter_timeout_ms, 4000, "unparseable value ignored");
        assert_eq!(config.application_id.as_deref(), Some("com.example.push"));
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        Config::default().save_to(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
