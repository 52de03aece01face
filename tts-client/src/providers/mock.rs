//! Mock TTS provider for testing
//!
//! Provides a configurable mock provider that can simulate various behaviors
//! like failures, retries, slow chunks and successful synthesis.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{Result, TtsError};
use crate::provider::{
    MIN_AUDIO_BYTES, SynthesisOutput, SynthesisRequest, TtsProvider, verify_output,
};

/// Bytes written for a successful mock synthesis; above the size threshold.
pub const MOCK_AUDIO_BYTES: usize = 2048;

/// A mock provider for testing retry, resume and ordering behavior
pub struct MockProvider {
    /// Number of times to fail before succeeding (0 = always succeed)
    fail_count: AtomicUsize,
    /// Current call count
    call_count: AtomicUsize,
    /// Error to return on failure (None = always succeed)
    fail_with: Mutex<Option<TtsError>>,
    /// Errors returned on every call for specific texts
    fail_texts: Mutex<HashMap<String, TtsError>>,
    /// Artificial latency for specific texts
    delays: Mutex<HashMap<String, Duration>>,
    /// Calls per text
    calls: Mutex<HashMap<String, usize>>,
    /// Provider name for display
    name: &'static str,
}

impl MockProvider {
    fn with_failures(fail_count: usize, error: Option<TtsError>) -> Self {
        Self {
            fail_count: AtomicUsize::new(fail_count),
            call_count: AtomicUsize::new(0),
            fail_with: Mutex::new(error),
            fail_texts: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            name: "mock",
        }
    }

    /// Create a provider that fails `n` times with the given error, then succeeds
    pub fn fails_then_succeeds(n: usize, error: TtsError) -> Self {
        Self::with_failures(n, Some(error))
    }

    /// Create a provider that always fails with the given error
    pub fn always_fails(error: TtsError) -> Self {
        Self::with_failures(usize::MAX, Some(error))
    }

    /// Create a provider that always succeeds
    pub fn always_succeeds() -> Self {
        Self::with_failures(0, None)
    }

    /// Fail every request whose text equals `text`
    pub fn fail_text(self, text: &str, error: TtsError) -> Self {
        lock(&self.fail_texts).insert(text.to_string(), error);
        self
    }

    /// Sleep before answering requests whose text equals `text`
    pub fn delay_text(self, text: &str, delay: Duration) -> Self {
        lock(&self.delays).insert(text.to_string(), delay);
        self
    }

    /// Set a custom provider name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Get the number of times synthesize() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Number of synthesize() calls made for `text`
    pub fn calls_for(&self, text: &str) -> usize {
        lock(&self.calls).get(text).copied().unwrap_or(0)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl TtsProvider for MockProvider {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisOutput> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        *lock(&self.calls).entry(request.text.clone()).or_insert(0) += 1;

        let delay = lock(&self.delays).get(&request.text).copied();
        if let Some(delay) = delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = request.cancel.cancelled() => return Err(TtsError::Cancelled),
            }
        }

        if let Some(err) = lock(&self.fail_texts).get(&request.text) {
            return Err(clone_error(err));
        }

        if call_num < self.fail_count.load(Ordering::SeqCst) {
            if let Some(err) = lock(&self.fail_with).as_ref() {
                return Err(clone_error(err));
            }
        }

        if let Some(parent) = request.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&request.output_path, vec![0u8; MOCK_AUDIO_BYTES]).await?;
        verify_output(&request.output_path, MIN_AUDIO_BYTES)
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn default_voice(&self) -> &str {
        "mock-voice"
    }

    fn is_available(&self) -> Result<()> {
        Ok(())
    }
}

/// Clone a TtsError (needed because TtsError doesn't implement Clone)
pub fn clone_error(err: &TtsError) -> TtsError {
    match err {
        TtsError::MissingApiKey { provider, env_var } => TtsError::MissingApiKey {
            provider: provider.clone(),
            env_var: env_var.clone(),
        },
        TtsError::ProviderUnavailable(s) => TtsError::ProviderUnavailable(s.clone()),
        TtsError::RateLimited { retry_after } => TtsError::RateLimited {
            retry_after: *retry_after,
        },
        TtsError::BadRequest { message } => TtsError::BadRequest {
            message: message.clone(),
        },
        TtsError::InvalidCredential(s) => TtsError::InvalidCredential(s.clone()),
        TtsError::ApiError {
            message,
            status_code,
        } => TtsError::ApiError {
            message: message.clone(),
            status_code: *status_code,
        },
        TtsError::Timeout(d) => TtsError::Timeout(*d),
        TtsError::EmptyAudio { bytes } => TtsError::EmptyAudio { bytes: *bytes },
        TtsError::EdgeTtsError(s) => TtsError::EdgeTtsError(s.clone()),
        TtsError::Encoder(s) => TtsError::Encoder(s.clone()),
        TtsError::Cancelled => TtsError::Cancelled,
        TtsError::ConfigError(s) => TtsError::ConfigError(s.clone()),
        // For Io and Toml errors, we create a comparable error since they can't be cloned
        TtsError::Io(e) => TtsError::Io(std::io::Error::new(e.kind(), e.to_string())),
        TtsError::TomlParse(_) => TtsError::ConfigError("TOML parse error (mock)".to_string()),
        TtsError::TomlSerialize(_) => {
            TtsError::ConfigError("TOML serialize error (mock)".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Disposition;
    use tempfile::TempDir;

    fn request(dir: &TempDir, text: &str) -> SynthesisRequest {
        SynthesisRequest::new(text, "mock-voice", dir.path().join(format!("{text}.mp3")))
    }

    #[tokio::test]
    async fn test_always_succeeds() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::always_succeeds();

        let output = provider.synthesize(&request(&dir, "olá")).await.unwrap();
        assert_eq!(output.bytes, MOCK_AUDIO_BYTES as u64);
        assert!(output.path.exists());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_always_fails() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::always_fails(TtsError::EdgeTtsError("no audio".into()));

        for _ in 0..3 {
            let result = provider.synthesize(&request(&dir, "a")).await;
            assert!(result.is_err());
        }
        assert_eq!(provider.call_count(), 3);
        assert!(!dir.path().join("a.mp3").exists());
    }

    #[tokio::test]
    async fn test_fails_then_succeeds() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::fails_then_succeeds(
            2,
            TtsError::RateLimited {
                retry_after: Some(Duration::from_secs(3)),
            },
        );
        let req = request(&dir, "b");

        let err = provider.synthesize(&req).await.unwrap_err();
        assert_eq!(
            err.disposition(),
            Disposition::RetryAfter(Some(Duration::from_secs(3)))
        );
        assert!(provider.synthesize(&req).await.is_err());
        assert!(provider.synthesize(&req).await.is_ok());
        assert_eq!(provider.calls_for("b"), 3);
    }

    #[tokio::test]
    async fn test_fail_text_only_affects_that_text() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::always_succeeds().fail_text(
            "ruim",
            TtsError::BadRequest {
                message: "invalid".into(),
            },
        );

        assert!(provider.synthesize(&request(&dir, "bom")).await.is_ok());
        let err = provider.synthesize(&request(&dir, "ruim")).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_delay_observes_cancel() {
        let dir = TempDir::new().unwrap();
        let provider =
            MockProvider::always_succeeds().delay_text("lento", Duration::from_secs(30));
        let req = request(&dir, "lento");
        req.cancel.cancel();

        let err = provider.synthesize(&req).await.unwrap_err();
        assert!(matches!(err, TtsError::Cancelled));
    }
}
