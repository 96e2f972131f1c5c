//! Qwen3-TTS sidecar client.
//!
//! The sidecar only generates audio; playback stays in this daemon. Its API
//! is `POST /tts/generate` returning WAV bytes and `GET /health`.

use crate::error::VoiceError;
use serde_json::json;
use std::time::Duration;

/// Per-utterance latency runs to seconds on CPU-bound hosts.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(60);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Locked speaker identity used when a request names none.
pub const DEFAULT_SPEAKER: &str = "Ryan";

/// Style directive applied when the caller supplies none.
pub const DEFAULT_INSTRUCT: &str =
    "Stable, professional delivery. Read numbers and abbreviations naturally.";

#[derive(Debug, Clone)]
pub struct QwenSidecar {
    client: reqwest::Client,
    base_url: String,
}

impl QwenSidecar {
    pub fn new(port: u16) -> Self {
        Self::with_base_url(format!("http://127.0.0.1:{port}"))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Availability probe: `GET /health` within two seconds.
    pub async fn healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Generates WAV bytes for `text`.
    pub async fn generate(
        &self,
        text: &str,
        speaker: Option<&str>,
        instruct: Option<&str>,
    ) -> Result<Vec<u8>, VoiceError> {
        let url = format!("{}/tts/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(GENERATE_TIMEOUT)
            .json(&json!({
                "text": text,
                "speaker": speaker.unwrap_or(DEFAULT_SPEAKER),
                "instruct": instruct.unwrap_or(DEFAULT_INSTRUCT),
                "language": "en",
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VoiceError::Timeout {
                        engine: "qwen3",
                        seconds: GENERATE_TIMEOUT.as_secs(),
                    }
                } else {
                    VoiceError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Upstream {
                engine: "qwen3",
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_sidecar_is_unhealthy() {
        // Reserved TEST-NET-1 address: connection fails fast, nothing listens.
        let sidecar = QwenSidecar::with_base_url("http://192.0.2.1:1");
        assert!(!sidecar.healthy().await);
    }
}
