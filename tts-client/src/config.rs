use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, TtsError};
use crate::providers::ProviderKind;

/// Engine credentials, stored apart from the application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Engine used when no --engine flag is provided
    #[serde(default = "default_engine")]
    pub default_engine: String,

    /// Provider-specific configuration (engine name -> settings)
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_engine() -> String {
    "edge".to_string()
}

/// Provider-specific configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key (optional, can use env var instead)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Path to CLI binary (for the edge provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_path: Option<PathBuf>,

    /// Custom base URL (for API providers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model name (for API providers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home =
            std::env::var("HOME").map_err(|_| TtsError::ConfigError("HOME not set".into()))?;
        Ok(PathBuf::from(home).join(".config/conversor-tts/credentials.toml"))
    }

    pub fn default_kind(&self) -> Result<ProviderKind> {
        ProviderKind::from_str(&self.default_engine)
    }

    /// Get provider config by provider kind
    pub fn get_provider_config(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.providers.get(kind.as_str())
    }

    /// Store an API key for `kind`, keeping its other settings
    pub fn set_api_key(&mut self, kind: ProviderKind, key: &str) {
        self.providers
            .entry(kind.as_str().to_string())
            .or_default()
            .api_key = Some(key.trim().to_string());
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_engine: default_engine(),
            providers: HashMap::new(),
        }
    }
}
