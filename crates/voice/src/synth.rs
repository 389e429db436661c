use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use ttsrelay_protocol::{VoiceParams, SYNTHESIS_TIMEOUT_MS};

use crate::error::{Error, Result};

/// Result of a successful synthesis call (§6).
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub url: String,
    pub provider_id: String,
}

/// The per-channel engine's view of the TTS synthesizer (§4.1 step 5).
/// Implementations must be cancel-safe: when `cancel` fires mid-flight the
/// call returns `Error::AbortedByCaller`, distinguishable from
/// `UpstreamFailure` per §5.
#[async_trait]
pub trait TtsSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceParams,
        cancel: CancellationToken,
    ) -> Result<SynthesizedAudio>;
}

/// Output audio format and sync-mode knob, not part of [`VoiceParams`]
/// because they are provider-call concerns rather than per-viewer
/// preferences.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    pub format: String,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            format: "mp3".to_string(),
        }
    }
}

/// reqwest-based client for the external TTS synthesizer (§6).
pub struct HttpTtsSynthesizer {
    client: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
    options: SynthesisOptions,
}

impl std::fmt::Debug for HttpTtsSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTtsSynthesizer")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl HttpTtsSynthesizer {
    pub fn new(base_url: impl Into<String>, api_key: Secret<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            options: SynthesisOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SynthesisOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Serialize)]
struct SynthesizeBody<'a> {
    text: &'a str,
    voice_id: &'a str,
    speed: f32,
    volume: f32,
    pitch: i32,
    emotion: &'a str,
    language_boost: &'a str,
    english_normalization: bool,
    sample_rate: u32,
    bitrate: u32,
    channel: &'a str,
    format: &'a str,
    enable_sync_mode: bool,
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    data: Option<SynthesizeData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SynthesizeData {
    #[allow(dead_code)]
    status: String,
    outputs: Vec<String>,
    id: String,
}

#[async_trait]
impl TtsSynthesizer for HttpTtsSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceParams,
        cancel: CancellationToken,
    ) -> Result<SynthesizedAudio> {
        let body = SynthesizeBody {
            text,
            voice_id: &voice.voice_id,
            speed: voice.speed,
            volume: voice.volume,
            pitch: voice.pitch,
            emotion: &voice.emotion,
            language_boost: &voice.language_boost,
            english_normalization: voice.english_normalization,
            sample_rate: voice.sample_rate,
            bitrate: voice.bitrate,
            channel: voice.channel.as_wire(),
            format: &self.options.format,
            enable_sync_mode: true,
        };

        let request = self
            .client
            .post(format!("{}/synthesize", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::AbortedByCaller),
            result = tokio::time::timeout(
                std::time::Duration::from_millis(SYNTHESIS_TIMEOUT_MS),
                request,
            ) => result
                .map_err(|_| Error::UpstreamFailure("synthesis timed out".to_string()))??,
        };

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &body_text));
        }

        let parsed: SynthesizeResponse = response.json().await?;
        if let Some(err) = parsed.error {
            return Err(classify_failure(0, &err));
        }
        let data = parsed
            .data
            .ok_or_else(|| Error::UpstreamFailure("missing data in response".to_string()))?;
        let url = data
            .outputs
            .into_iter()
            .next()
            .ok_or_else(|| Error::UpstreamFailure("no output url returned".to_string()))?;

        Ok(SynthesizedAudio {
            url,
            provider_id: data.id,
        })
    }
}

/// Maps a failed response to `InvalidVoice` when the error text mentions
/// `voice_id`, else `UpstreamFailure` (§6).
fn classify_failure(status: u16, body: &str) -> Error {
    if body.contains("voice_id") {
        Error::InvalidVoice(body.to_string())
    } else {
        Error::UpstreamFailure(format!("status={status} body={body}"))
    }
}
