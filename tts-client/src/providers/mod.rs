//! TTS provider implementations

mod edge;
mod gemini;
pub mod mock;

pub use edge::{DEFAULT_EDGE_VOICE, EdgeTtsProvider};
pub use gemini::{DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_VOICE, GeminiProvider};
pub use mock::MockProvider;

use std::fmt;

use crate::config::ProviderConfig;
use crate::error::{Result, TtsError};
use crate::provider::TtsProvider;

/// Supported provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Edge,
    Gemini,
}

/// A voice the user can pick from the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceInfo {
    pub id: &'static str,
    pub description: &'static str,
}

const EDGE_VOICES: &[VoiceInfo] = &[
    VoiceInfo {
        id: "pt-BR-ThalitaMultilingualNeural",
        description: "Thalita (feminina, multilíngue)",
    },
    VoiceInfo {
        id: "pt-BR-FranciscaNeural",
        description: "Francisca (feminina)",
    },
    VoiceInfo {
        id: "pt-BR-AntonioNeural",
        description: "Antônio (masculina)",
    },
];

const GEMINI_VOICES: &[VoiceInfo] = &[
    VoiceInfo {
        id: "Kore",
        description: "firme",
    },
    VoiceInfo {
        id: "Puck",
        description: "animada",
    },
    VoiceInfo {
        id: "Charon",
        description: "informativa",
    },
    VoiceInfo {
        id: "Aoede",
        description: "leve",
    },
    VoiceInfo {
        id: "Fenrir",
        description: "excitável",
    },
    VoiceInfo {
        id: "Leda",
        description: "jovem",
    },
];

impl ProviderKind {
    /// Parse provider kind from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "edge" | "edge-tts" | "edge_tts" => Ok(Self::Edge),
            "gemini" | "google" => Ok(Self::Gemini),
            _ => Err(TtsError::ConfigError(format!("Unknown engine: {}", s))),
        }
    }

    /// Key used in the credentials file
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edge => "edge",
            Self::Gemini => "gemini",
        }
    }

    /// Get the environment variable name for this provider's API key
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            Self::Edge => None,
            Self::Gemini => Some("GEMINI_API_KEY"),
        }
    }

    pub fn default_voice(&self) -> &'static str {
        match self {
            Self::Edge => DEFAULT_EDGE_VOICE,
            Self::Gemini => DEFAULT_GEMINI_VOICE,
        }
    }

    /// Voices offered for this engine
    pub fn voices(&self) -> &'static [VoiceInfo] {
        match self {
            Self::Edge => EDGE_VOICES,
            Self::Gemini => GEMINI_VOICES,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create a provider instance for `kind` with optional credentials
pub fn get_provider(
    kind: ProviderKind,
    voice: Option<String>,
    provider_config: Option<&ProviderConfig>,
) -> Result<Box<dyn TtsProvider>> {
    match kind {
        ProviderKind::Edge => {
            let cli_path = provider_config.and_then(|c| c.cli_path.clone());
            Ok(Box::new(EdgeTtsProvider::new(cli_path, voice)?))
        }
        ProviderKind::Gemini => {
            let api_key = get_api_key(provider_config, "GEMINI_API_KEY", "Gemini")?;
            let model = provider_config.and_then(|c| c.model.clone());
            let mut provider = GeminiProvider::new(api_key, model, voice)?;
            if let Some(base_url) = provider_config.and_then(|c| c.base_url.clone()) {
                provider = provider.with_base_url(base_url);
            }
            Ok(Box::new(provider))
        }
    }
}

/// Get API key from config or environment variable
fn get_api_key(
    config: Option<&ProviderConfig>,
    env_var: &str,
    provider_name: &str,
) -> Result<String> {
    // Check config first
    if let Some(key) = config
        .and_then(|c| c.api_key.clone())
        .filter(|k| !k.trim().is_empty())
    {
        return Ok(key);
    }

    // Fall back to environment variable
    std::env::var(env_var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| TtsError::MissingApiKey {
            provider: provider_name.to_string(),
            env_var: env_var.to_string(),
        })
}
