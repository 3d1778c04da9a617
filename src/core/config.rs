use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::alerts::engine::TimerIntervals;
use super::error::ConfigError;

pub const CONFIG_DIR_ENV: &str = "ALERTDESK_CONFIG_DIR";

/// Runtime configuration for the engine host.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Where settings, notifications and the WhatsApp trail are stored
    pub data_dir: PathBuf,
    pub generation_interval_secs: u64,
    /// Chance that a generation tick produces an alert
    pub generation_probability: f64,
    pub auto_resolve_interval_secs: u64,
    /// Link appended to WhatsApp messages
    pub management_url: String,
    pub whatsapp_log_limit: usize,
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            generation_interval_secs: 30,
            generation_probability: 0.2,
            auto_resolve_interval_secs: 60,
            management_url: "http://localhost:3000/settings/notifications".to_string(),
            whatsapp_log_limit: 10,
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn timer_intervals(&self) -> TimerIntervals {
        TimerIntervals {
            generation: Duration::from_secs(self.generation_interval_secs),
            auto_resolve: Duration::from_secs(self.auto_resolve_interval_secs),
        }
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            config_path: config_dir.join("engine.json"),
        }
    }

    /// Config dir from `ALERTDESK_CONFIG_DIR`, or the working directory.
    pub fn from_env() -> Self {
        let dir = std::env::var_os(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir)
    }

    pub fn path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Missing or unreadable config falls back to defaults.
    pub fn load(&self) -> EngineConfig {
        if self.config_path.exists() {
            match fs::read_to_string(&self.config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => log::warn!(
                        "Ignoring invalid config {}: {}",
                        self.config_path.display(),
                        e
                    ),
                },
                Err(e) => log::warn!("Cannot read config {}: {}", self.config_path.display(), e),
            }
        }
        EngineConfig::default()
    }

    pub fn save(&self, config: &EngineConfig) -> Result<(), ConfigError> {
        // Ensure directory exists
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());

        let default = manager.load();
        assert_eq!(default.generation_interval_secs, 30);
        assert_eq!(default.whatsapp_log_limit, 10);

        let new_config = EngineConfig {
            data_dir: PathBuf::from("/tmp/alertdesk"),
            generation_interval_secs: 5,
            rng_seed: Some(7),
            ..EngineConfig::default()
        };

        manager.save(&new_config).unwrap();
        let loaded = manager.load();

        assert_eq!(loaded, new_config);
        assert_eq!(loaded.timer_intervals().generation, Duration::from_secs(5));
    }

    #[test]
    fn test_partial_and_corrupt_files() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());

        fs::write(manager.path(), r#"{"generation_probability": 0.9}"#).unwrap();
        let partial = manager.load();
        assert_eq!(partial.generation_probability, 0.9);
        assert_eq!(partial.auto_resolve_interval_secs, 60);

        fs::write(manager.path(), "not json").unwrap();
        assert_eq!(manager.load(), EngineConfig::default());
    }
}
