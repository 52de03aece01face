use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TtsError};

/// Smallest audio file accepted as a real synthesis result.
///
/// Engines occasionally answer successfully with an empty or near-empty body.
pub const MIN_AUDIO_BYTES: u64 = 1024;

/// One chunk of text to be spoken into `output_path`.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    pub output_path: PathBuf,
    /// Run-wide cancellation; subprocess-backed providers terminate their child on it.
    pub cancel: CancellationToken,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, voice: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            output_path: output_path.into(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A finished audio file.
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Trait for text-to-speech engines
#[async_trait]
pub trait TtsProvider: Send + Sync {
    /// Synthesize `request.text` into `request.output_path`.
    ///
    /// On error no partial file is left behind.
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisOutput>;

    /// Get the provider name for display
    fn name(&self) -> &'static str;

    /// Voice used when the caller does not choose one
    fn default_voice(&self) -> &str;

    /// Check if the provider is available (API key set, CLI installed, etc.)
    fn is_available(&self) -> Result<()>;
}

/// Check that a synthesized file exists and is large enough to hold audio.
pub fn verify_output(path: &Path, min_bytes: u64) -> Result<SynthesisOutput> {
    let bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if bytes <= min_bytes {
        discard_partial(path);
        return Err(TtsError::EmptyAudio { bytes });
    }
    Ok(SynthesisOutput {
        path: path.to_path_buf(),
        bytes,
    })
}

/// Remove a partially written output file, ignoring a missing file.
pub fn discard_partial(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Failed to remove partial file {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_verify_output_rejects_small_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny.mp3");
        std::fs::write(&path, vec![0u8; 100]).unwrap();

        let result = verify_output(&path, MIN_AUDIO_BYTES);
        assert!(matches!(result, Err(TtsError::EmptyAudio { bytes: 100 })));
        assert!(!path.exists(), "partial file should be removed");
    }

    #[test]
    fn test_verify_output_accepts_large_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ok.mp3");
        std::fs::write(&path, vec![1u8; 4096]).unwrap();

        let output = verify_output(&path, MIN_AUDIO_BYTES).unwrap();
        assert_eq!(output.bytes, 4096);
        assert_eq!(output.path, path);
    }

    #[test]
    fn test_verify_output_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = verify_output(&dir.path().join("missing.mp3"), MIN_AUDIO_BYTES);
        assert!(matches!(result, Err(TtsError::EmptyAudio { bytes: 0 })));
    }
}
