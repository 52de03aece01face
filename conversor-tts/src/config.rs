//! conversor-tts application defaults.
//!
//! The default engine and its credentials live in the `tts-client`
//! credential file; this file only holds conversion defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::coordinator::scheduler::DEFAULT_CONCURRENCY;
use crate::text::DEFAULT_CHUNK_SIZE;
use tts_client::ProviderKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Default voice per engine name. Engines not listed use their own default.
    #[serde(default)]
    pub voices: BTreeMap<String, String>,

    /// Chunk limit in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Chunks converted concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Chunk files at or below this size are not audio
    #[serde(default = "default_min_audio_bytes")]
    pub min_audio_bytes: u64,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_min_audio_bytes() -> u64 {
    tts_client::MIN_AUDIO_BYTES
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            voices: BTreeMap::new(),
            chunk_size: default_chunk_size(),
            concurrency: default_concurrency(),
            min_audio_bytes: default_min_audio_bytes(),
        }
    }
}

impl AppConfig {
    /// Get the config file path: ~/.config/conversor-tts/config.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("conversor-tts").join("config.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Configured voice for `kind`, if any
    pub fn voice_for(&self, kind: ProviderKind) -> Option<&str> {
        self.voices.get(kind.as_str()).map(String::as_str)
    }

    pub fn set_voice(&mut self, kind: ProviderKind, voice: &str) {
        self.voices.insert(kind.as_str().to_string(), voice.trim().to_string());
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.chunk_size, 2000);
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.min_audio_bytes, 1024);
        assert!(config.voices.is_empty());
        assert_eq!(config.voice_for(ProviderKind::Edge), None);
    }

    #[test]
    fn test_config_path() {
        let path = AppConfig::config_path().unwrap();
        assert!(path.ends_with("conversor-tts/config.toml"));
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
chunk_size = 1500
concurrency = 3

[voices]
gemini = "Puck"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.voice_for(ProviderKind::Gemini), Some("Puck"));
        assert_eq!(config.voice_for(ProviderKind::Edge), None);
        assert_eq!(config.chunk_size, 1500);
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.min_audio_bytes, 1024);
    }

    #[test]
    fn test_parse_empty_config() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");
        assert_eq!(AppConfig::load_from(&path).unwrap(), AppConfig::default());

        let mut config = AppConfig::default();
        config.set_voice(ProviderKind::Edge, " pt-BR-AntonioNeural ");
        config.save_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.voice_for(ProviderKind::Edge), Some("pt-BR-AntonioNeural"));
    }
}
