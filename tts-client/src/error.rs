use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TtsError {
    #[error(
        "API key not found for {provider}. Set {env_var} environment variable or add to credentials."
    )]
    MissingApiKey { provider: String, env_var: String },

    #[error("Provider not available: {0}")]
    ProviderUnavailable(String),

    #[error("Rate limit exceeded{}", .retry_after.map(|d| format!(". Retry after {:.1} seconds", d.as_secs_f64())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    #[error("Request rejected (HTTP 400): {message}")]
    BadRequest { message: String },

    #[error("Invalid or expired credential: {0}")]
    InvalidCredential(String),

    #[error("API error{}: {message}", status_code.map(|c| format!(" (HTTP {})", c)).unwrap_or_default())]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Response carried no usable audio ({bytes} bytes)")]
    EmptyAudio { bytes: u64 },

    #[error("edge-tts error: {0}")]
    EdgeTtsError(String),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Synthesis cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// How a caller should react to a failed synthesis attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Transient; retry with backoff.
    Retryable,
    /// Rate limited; wait the server-mandated delay when present.
    RetryAfter(Option<Duration>),
    /// Retrying this chunk cannot succeed.
    Fatal,
    /// The run is shutting down.
    Cancelled,
}

impl TtsError {
    pub fn disposition(&self) -> Disposition {
        match self {
            TtsError::RateLimited { retry_after } => Disposition::RetryAfter(*retry_after),
            TtsError::BadRequest { .. }
            | TtsError::InvalidCredential(_)
            | TtsError::MissingApiKey { .. }
            | TtsError::ProviderUnavailable(_)
            | TtsError::ConfigError(_) => Disposition::Fatal,
            TtsError::Cancelled => Disposition::Cancelled,
            _ => Disposition::Retryable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.disposition() == Disposition::Fatal
    }
}

pub type Result<T> = std::result::Result<T, TtsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_retry_after() {
        let err = TtsError::RateLimited {
            retry_after: Some(Duration::from_secs(17)),
        };
        assert_eq!(
            err.disposition(),
            Disposition::RetryAfter(Some(Duration::from_secs(17)))
        );
        assert!(err.to_string().contains("Retry after 17.0 seconds"));
    }

    #[test]
    fn test_fatal_errors() {
        assert!(
            TtsError::BadRequest {
                message: "bad".into()
            }
            .is_fatal()
        );
        assert!(TtsError::InvalidCredential("API key expired".into()).is_fatal());
    }

    #[test]
    fn test_transient_errors_are_retryable() {
        let errors = [
            TtsError::Timeout(Duration::from_secs(60)),
            TtsError::EmptyAudio { bytes: 0 },
            TtsError::EdgeTtsError("No audio was received".into()),
            TtsError::ApiError {
                message: "internal".into(),
                status_code: Some(500),
            },
            TtsError::Encoder("ffmpeg exited with 1".into()),
        ];
        for err in errors {
            assert_eq!(err.disposition(), Disposition::Retryable, "{err}");
        }
    }
}
