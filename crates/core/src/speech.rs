//! Speech Synthesis Gateway
//!
//! Converts reply text into an encoded audio clip. The Relay only depends on
//! the [`SpeechSynthesizer`] trait; [`ElevenLabsClient`] is the production
//! implementation.
//!
//! # API Reference
//!
//! - Endpoint: `POST https://api.elevenlabs.io/v1/text-to-speech/{voice_id}`
//! - Auth: `xi-api-key` header
//! - Output: selected by the `output_format` query parameter, e.g. `mp3_44100_128`

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io";
pub const DEFAULT_TTS_MODEL: &str = "eleven_turbo_v2_5";
/// MP3 at 44.1kHz / 128kbps, delivered to the client as `audio/mpeg`.
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp3_44100_128";

/// Errors surfaced by a [`SpeechSynthesizer`].
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("Speech synthesis request failed: {0}")]
    Request(String),
    #[error("Speech synthesis failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Speech synthesis returned no audio")]
    EmptyAudio,
    #[error("Speech synthesis timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for SynthesisError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// Text to speak, plus the voice and encoding to speak it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_id: String,
    pub output_format: String,
}

/// A client that renders text as a complete audio clip.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns the whole encoded clip once the provider has finished sending it.
    async fn synthesize(&self, request: SynthesisRequest) -> Result<Vec<u8>, SynthesisError>;
}

#[derive(Serialize)]
struct TextToSpeechBody<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// An implementation of `SpeechSynthesizer` for the ElevenLabs HTTP API.
pub struct ElevenLabsClient {
    http: reqwest::Client,
    api_key: String,
    model_id: String,
    base_url: String,
}

impl ElevenLabsClient {
    pub fn new(api_key: String, model_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model_id,
            base_url: ELEVENLABS_API_BASE.to_string(),
        }
    }

    /// Points the client at a different host, such as a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, voice_id: &str) -> String {
        format!("{}/v1/text-to-speech/{}", self.base_url, voice_id)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<Vec<u8>, SynthesisError> {
        let response = self
            .http
            .post(self.endpoint(&request.voice_id))
            .query(&[("output_format", request.output_format.as_str())])
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&TextToSpeechBody {
                text: &request.text,
                model_id: &self.model_id,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes().await?.to_vec();
        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }
        debug!(bytes = audio.len(), voice_id = %request.voice_id, "Synthesized speech");
        Ok(audio)
    }
}
