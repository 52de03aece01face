//! Edge TTS provider
//!
//! Uses the installed `edge-tts` command-line client as a subprocess. The
//! service is free and keyless, so every failure is treated as transient.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

use crate::error::{Result, TtsError};
use crate::process::run_cancellable;
use crate::provider::{
    MIN_AUDIO_BYTES, SynthesisOutput, SynthesisRequest, TtsProvider, discard_partial,
    verify_output,
};

pub const DEFAULT_EDGE_VOICE: &str = "pt-BR-ThalitaMultilingualNeural";

/// Provider that drives the edge-tts CLI (subprocess)
pub struct EdgeTtsProvider {
    cli_path: PathBuf,
    voice: String,
    min_bytes: u64,
}

impl EdgeTtsProvider {
    /// Create a new Edge provider
    ///
    /// Returns an error if the edge-tts CLI is not found.
    pub fn new(cli_path: Option<PathBuf>, voice: Option<String>) -> Result<Self> {
        let cli_path = match cli_path {
            Some(path) => {
                if !path.exists() {
                    return Err(TtsError::ProviderUnavailable(format!(
                        "edge-tts not found at specified path: {}",
                        path.display()
                    )));
                }
                path
            }
            None => which::which("edge-tts").map_err(|_| {
                TtsError::ProviderUnavailable(
                    "edge-tts not found. Install it with `pip install edge-tts`".into(),
                )
            })?,
        };

        Ok(Self {
            cli_path,
            voice: voice.unwrap_or_else(|| DEFAULT_EDGE_VOICE.to_string()),
            min_bytes: MIN_AUDIO_BYTES,
        })
    }

    /// Override the minimum accepted output size
    pub fn with_min_bytes(mut self, min_bytes: u64) -> Self {
        self.min_bytes = min_bytes;
        self
    }

    fn command(&self, request: &SynthesisRequest) -> Command {
        let voice = if request.voice.is_empty() {
            &self.voice
        } else {
            &request.voice
        };
        let mut cmd = Command::new(&self.cli_path);
        cmd.arg("--voice")
            .arg(voice)
            .arg("--text")
            .arg(&request.text)
            .arg("--write-media")
            .arg(&request.output_path);
        cmd
    }
}

#[async_trait]
impl TtsProvider for EdgeTtsProvider {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisOutput> {
        if let Some(parent) = request.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let output = match run_cancellable(self.command(request), None, &request.cancel).await {
            Ok(output) => output,
            Err(e) => {
                discard_partial(&request.output_path);
                return Err(match e {
                    TtsError::Cancelled => TtsError::Cancelled,
                    other => TtsError::EdgeTtsError(format!("Failed to execute: {}", other)),
                });
            }
        };

        if !output.status.success() {
            discard_partial(&request.output_path);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TtsError::EdgeTtsError(format!(
                "Command failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        verify_output(&request.output_path, self.min_bytes)
    }

    fn name(&self) -> &'static str {
        "Edge TTS"
    }

    fn default_voice(&self) -> &str {
        &self.voice
    }

    fn is_available(&self) -> Result<()> {
        // Availability was checked in constructor
        Ok(())
    }
}
