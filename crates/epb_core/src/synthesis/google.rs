//! Google Cloud Text-to-Speech REST client.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{SpeechRequest, SpeechSynthesizer, SynthesisError};
use crate::config::SynthesisSettings;

/// Maximum error body length kept in error messages.
const MAX_ERROR_BODY: usize = 300;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeBody<'a> {
    input: TextInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Serialize)]
struct TextInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    speaking_rate: f64,
    pitch: f64,
    sample_rate_hertz: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: Option<String>,
}

/// Synthesizer backed by the `text:synthesize` endpoint.
///
/// Requests MP3 at a fixed sample rate so synthesized speech and generated
/// silence can be concatenated without re-encoding.
pub struct GoogleSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    pitch: f64,
    sample_rate: u32,
    timeout: Duration,
}

impl GoogleSynthesizer {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        pitch: f64,
        sample_rate: u32,
        timeout: Duration,
    ) -> Result<Self, SynthesisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SynthesisError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            pitch,
            sample_rate,
            timeout,
        })
    }

    /// Build from settings, reading the API key from the configured
    /// environment variable.
    pub fn from_settings(
        settings: &SynthesisSettings,
        sample_rate: u32,
    ) -> Result<Self, SynthesisError> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SynthesisError::MissingApiKey(settings.api_key_env.clone()))?;

        Self::new(
            &settings.endpoint,
            api_key,
            settings.pitch,
            sample_rate,
            Duration::from_secs(settings.timeout_secs.max(1)),
        )
    }

    fn body<'a>(&self, request: &'a SpeechRequest) -> SynthesizeBody<'a> {
        SynthesizeBody {
            input: TextInput {
                text: &request.text,
            },
            voice: VoiceSelection {
                language_code: &request.voice.language_code,
                name: &request.voice.name,
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: request.rate,
                pitch: self.pitch,
                sample_rate_hertz: self.sample_rate,
            },
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> SynthesisError {
        if e.is_timeout() {
            SynthesisError::TimedOut {
                seconds: self.timeout.as_secs(),
            }
        } else {
            // Drop the URL: it carries the API key
            SynthesisError::Request(e.without_url().to_string())
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleSynthesizer {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SynthesisError> {
        request.validate()?;

        tracing::debug!(
            voice = %request.voice.name,
            rate = request.rate,
            chars = request.text.chars().count(),
            "Synthesizing segment"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", &self.api_key)])
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let parsed: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| self.map_send_error(e))?;

        decode_audio(parsed.audio_content.as_deref())
    }
}

/// Decode the base64 `audioContent` field.
fn decode_audio(content: Option<&str>) -> Result<Vec<u8>, SynthesisError> {
    let content = content
        .filter(|c| !c.is_empty())
        .ok_or(SynthesisError::EmptyAudio)?;
    base64::engine::general_purpose::STANDARD
        .decode(content)
        .map_err(|e| SynthesisError::Decode(e.to_string()))
}
