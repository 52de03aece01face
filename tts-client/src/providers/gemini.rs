//! Gemini TTS provider
//!
//! Direct HTTP implementation for the Gemini `generateContent` speech models.
//! The API answers with raw PCM (24 kHz, mono, s16le) which is piped through
//! ffmpeg to produce MP3.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{Result, TtsError};
use crate::process::run_cancellable;
use crate::provider::{
    MIN_AUDIO_BYTES, SynthesisOutput, SynthesisRequest, TtsProvider, discard_partial,
    verify_output,
};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_GEMINI_VOICE: &str = "Kore";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const PCM_SAMPLE_RATE: &str = "24000";

/// Error markers Google uses for keys that will never work again.
const INVALID_KEY_MARKERS: &[&str] = &[
    "API_KEY_INVALID",
    "API key expired",
    "API key not valid",
    "API_KEY_EXPIRED",
];

/// Provider for direct Gemini API calls
pub struct GeminiProvider {
    model: String,
    api_key: String,
    base_url: String,
    voice: String,
    ffmpeg: PathBuf,
    client: Client,
    min_bytes: u64,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    ///
    /// ffmpeg must be installed since the API only returns raw PCM.
    pub fn new(api_key: String, model: Option<String>, voice: Option<String>) -> Result<Self> {
        let ffmpeg = which::which("ffmpeg").map_err(|_| {
            TtsError::ProviderUnavailable("ffmpeg not found; it is required to encode Gemini audio".into())
        })?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TtsError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            model: model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            api_key,
            base_url: GEMINI_API_URL.to_string(),
            voice: voice.unwrap_or_else(|| DEFAULT_GEMINI_VOICE.to_string()),
            ffmpeg,
            client,
            min_bytes: MIN_AUDIO_BYTES,
        })
    }

    /// Point the provider at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the minimum accepted output size
    pub fn with_min_bytes(mut self, min_bytes: u64) -> Self {
        self.min_bytes = min_bytes;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn request_pcm(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        let body = GenerateRequest::speech(text, voice);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TtsError::Timeout(REQUEST_TIMEOUT)
                } else {
                    TtsError::ApiError {
                        message: format!("Request failed: {}", e),
                        status_code: None,
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let header_delay = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(Duration::from_secs_f64);
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &error_text, header_delay));
        }

        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TtsError::Timeout(REQUEST_TIMEOUT)
            } else {
                TtsError::ApiError {
                    message: format!("Failed to read response: {}", e),
                    status_code: None,
                }
            }
        })?;
        extract_pcm(&text)
    }

    async fn encode_mp3(&self, pcm: Vec<u8>, request: &SynthesisRequest) -> Result<()> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-y", "-loglevel", "error"])
            .args(["-f", "s16le", "-ar", PCM_SAMPLE_RATE, "-ac", "1"])
            .args(["-i", "pipe:0"])
            .args(["-codec:a", "libmp3lame", "-b:a", "64k"])
            .arg(&request.output_path);

        let output = run_cancellable(cmd, Some(pcm), &request.cancel).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TtsError::Encoder(format!(
                "ffmpeg failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

// Gemini API request/response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

impl GenerateRequest {
    fn speech(text: &str, voice: &str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![TextPart {
                    text: text.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice.to_string(),
                        },
                    },
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<AudioPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioPart {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

/// Decode the PCM payload from a successful response body.
fn extract_pcm(body: &str) -> Result<Vec<u8>> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| TtsError::ApiError {
            message: format!("Failed to parse response: {}", e),
            status_code: None,
        })?;

    let data = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .and_then(|c| c.parts.first())
        .and_then(|p| p.inline_data.as_ref())
        .map(|d| d.data.as_str())
        .ok_or_else(|| TtsError::ApiError {
            message: "Response carried no inline audio".into(),
            status_code: None,
        })?;

    let pcm = BASE64.decode(data).map_err(|e| TtsError::ApiError {
        message: format!("Invalid base64 audio: {}", e),
        status_code: None,
    })?;
    if pcm.is_empty() {
        return Err(TtsError::EmptyAudio { bytes: 0 });
    }
    Ok(pcm)
}

/// Map a non-success HTTP answer onto the error taxonomy.
fn classify_error(status: u16, body: &str, header_delay: Option<Duration>) -> TtsError {
    let parsed = serde_json::from_str::<ErrorResponse>(body).ok();
    let message = parsed
        .as_ref()
        .map(|r| r.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    let details = parsed.map(|r| r.error.details).unwrap_or_default();

    if status == 429 {
        let retry_after = details
            .iter()
            .filter_map(|d| d.get("retryDelay").and_then(|v| v.as_str()))
            .find_map(parse_retry_delay)
            .or(header_delay);
        return TtsError::RateLimited { retry_after };
    }

    let key_rejected = INVALID_KEY_MARKERS.iter().any(|marker| {
        message.contains(marker)
            || details
                .iter()
                .any(|d| d.get("reason").and_then(|v| v.as_str()) == Some(marker))
    });
    if key_rejected {
        return TtsError::InvalidCredential(message);
    }

    if status == 400 {
        return TtsError::BadRequest { message };
    }

    TtsError::ApiError {
        message,
        status_code: Some(status),
    }
}

/// Parse protobuf duration strings such as `"17s"` or `"1.5s"`.
fn parse_retry_delay(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().strip_suffix('s')?.parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| Duration::from_secs_f64(seconds))
}

#[async_trait]
impl TtsProvider for GeminiProvider {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisOutput> {
        if request.cancel.is_cancelled() {
            return Err(TtsError::Cancelled);
        }
        let voice = if request.voice.is_empty() {
            &self.voice
        } else {
            &request.voice
        };

        let pcm = self.request_pcm(&request.text, voice).await?;
        log::debug!("Gemini returned {} PCM bytes for {}", pcm.len(), request.output_path.display());

        if let Some(parent) = request.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if let Err(e) = self.encode_mp3(pcm, request).await {
            discard_partial(&request.output_path);
            return Err(e);
        }

        verify_output(&request.output_path, self.min_bytes)
    }

    fn name(&self) -> &'static str {
        "Gemini"
    }

    fn default_voice(&self) -> &str {
        &self.voice
    }

    fn is_available(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(TtsError::MissingApiKey {
                provider: "Gemini".into(),
                env_var: "GEMINI_API_KEY".into(),
            });
        }
        Ok(())
    }
}
