use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the orchestration service HTTP API.
    pub api_base_url: String,
    /// WebSocket endpoint for the event channel. Derived from
    /// `api_base_url` when not set explicitly.
    pub events_url: Option<String>,
    /// Seconds to wait before the event channel retries a lost connection.
    pub reconnect_delay_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".to_string(),
            events_url: None,
            reconnect_delay_secs: 3,
        }
    }
}

impl AppConfig {
    /// Resolve the event channel URL: explicit value if configured,
    /// otherwise the API base with the scheme swapped to ws(s) and
    /// `/events` appended.
    pub fn events_url(&self) -> String {
        if let Some(url) = &self.events_url {
            return url.clone();
        }
        let ws_base = if self.api_base_url.starts_with("https://") {
            self.api_base_url.replacen("https://", "wss://", 1)
        } else {
            self.api_base_url.replacen("http://", "ws://", 1)
        };
        format!("{}/events", ws_base.trim_end_matches('/'))
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    #[allow(dead_code)]
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("torrentsmith");

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        }

        let config_file = config_dir.join("torrentsmith.toml");

        Ok(Self {
            config_dir,
            config_file,
        })
    }

    pub fn load_config(&self) -> Result<AppConfig> {
        // First run: write a default config so the user has something to edit
        if !self.config_file.exists() {
            let default_config = AppConfig::default();
            self.save_config(&default_config)?;
        }

        let content: String =
            fs::read_to_string(&self.config_file).context("Failed to read config file")?;

        let config: AppConfig =
            toml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(config).context("Failed to serialize config")?;
        fs::write(&self.config_file, toml).context("Failed to write config file")?;
        Ok(())
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_url_is_derived_from_the_api_base() {
        let config = AppConfig {
            api_base_url: "http://box.local:8080/".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.events_url(), "ws://box.local:8080/events");

        let config = AppConfig {
            api_base_url: "https://box.local".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.events_url(), "wss://box.local/events");
    }

    #[test]
    fn explicit_events_url_wins() {
        let config = AppConfig {
            events_url: Some("ws://elsewhere:9000/stream".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(config.events_url(), "ws://elsewhere:9000/stream");
    }

    #[test]
    fn partial_config_files_fall_back_to_defaults() {
        let config: AppConfig = toml::from_str("api_base_url = \"http://seed:9090\"").unwrap();
        assert_eq!(config.api_base_url, "http://seed:9090");
        assert_eq!(config.reconnect_delay_secs, 3);
        assert!(config.events_url.is_none());
    }
}
