//! Text-to-speech client library for the conversor-tts workspace
//!
//! Provides a unified interface for speech engines:
//! - Edge TTS (edge-tts CLI subprocess, no key)
//! - Gemini (HTTP API, key-based, PCM encoded through ffmpeg)

pub mod config;
pub mod error;
pub mod process;
pub mod provider;
pub mod providers;

pub use config::{Config, ProviderConfig};
pub use error::{Disposition, Result, TtsError};
pub use provider::{MIN_AUDIO_BYTES, SynthesisOutput, SynthesisRequest, TtsProvider};
pub use providers::{MockProvider, ProviderKind, VoiceInfo, get_provider};
