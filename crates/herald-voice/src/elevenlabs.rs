//! ElevenLabs TTS client.
//!
//! One HTTPS POST per request; the reqwest client's default timeout applies
//! and there are no retries.

use crate::error::VoiceError;
use herald_types::VoiceSettings;
use serde_json::json;

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
const MODEL_ID: &str = "eleven_turbo_v2_5";

#[derive(Debug, Clone)]
pub struct ElevenLabs {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ElevenLabs {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Overridable base URL, used by tests against a local stub.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Renders `text` with the given voice and prosody, returning MP3 bytes.
    pub async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        settings: &VoiceSettings,
    ) -> Result<Vec<u8>, VoiceError> {
        let url = format!("{}/v1/text-to-speech/{}", self.base_url, voice_id);
        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&json!({
                "text": text,
                "model_id": MODEL_ID,
                "voice_settings": settings,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Upstream {
                engine: "elevenlabs",
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
