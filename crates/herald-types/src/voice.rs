//! Engine identity, audio formats and voice prosody.
//!
//! A `VoiceSettings` record always has every field populated; request-level
//! `VoiceOverrides` replace only the fields a caller actually supplied.

use serde::{Deserialize, Serialize};

/// The TTS back-ends the daemon knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsEngine {
    /// ElevenLabs HTTP API. Produces MP3.
    ElevenLabs,
    /// Piper CLI synthesiser running on the CPU. Produces WAV.
    Piper,
    /// Qwen3-TTS sidecar reached over loopback HTTP. Produces WAV.
    Qwen,
    /// Platform speech tool (`say`, `espeak-ng`, ...). Speaks directly,
    /// returns no buffer.
    System,
}

impl TtsEngine {
    /// Short machine name, matching the `PAI_TTS_ENGINE` config values.
    pub fn name(&self) -> &'static str {
        match self {
            TtsEngine::ElevenLabs => "elevenlabs",
            TtsEngine::Piper => "piper",
            TtsEngine::Qwen => "qwen3",
            TtsEngine::System => "system",
        }
    }

    /// Human description reported by `/health` and start-up logs.
    pub fn description(&self) -> &'static str {
        match self {
            TtsEngine::ElevenLabs => "ElevenLabs API",
            TtsEngine::Piper => "Piper (local neural TTS)",
            TtsEngine::Qwen => "Qwen3-TTS sidecar (local neural TTS)",
            TtsEngine::System => "System speech tool",
        }
    }

    /// Audio format this engine hands to the player, or `None` for engines
    /// that speak directly.
    pub fn output_format(&self) -> Option<AudioFormat> {
        match self {
            TtsEngine::ElevenLabs => Some(AudioFormat::Mp3),
            TtsEngine::Piper | TtsEngine::Qwen => Some(AudioFormat::Wav),
            TtsEngine::System => None,
        }
    }
}

/// The only distinction the audio player honours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// Compressed audio (MP3).
    Mp3,
    /// Uncompressed audio (WAV).
    Wav,
}

impl AudioFormat {
    /// Temp-file extension, with the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => ".mp3",
            AudioFormat::Wav => ".wav",
        }
    }
}

/// Local engines a user may request explicitly via `PAI_TTS_ENGINE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalEngine {
    Piper,
    Qwen,
}

impl LocalEngine {
    /// Parses the `PAI_TTS_ENGINE` config value. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "piper" => Some(LocalEngine::Piper),
            "qwen3" => Some(LocalEngine::Qwen),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LocalEngine::Piper => "piper",
            LocalEngine::Qwen => "qwen3",
        }
    }
}

/// A fully-populated prosody record.
///
/// Field names match the ElevenLabs `voice_settings` wire object exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub speed: f32,
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            speed: 1.0,
            use_speaker_boost: true,
        }
    }
}

impl VoiceSettings {
    /// Merges in the fields an override record actually carries.
    pub fn apply(&mut self, overrides: &VoiceOverrides) {
        if let Some(v) = overrides.stability {
            self.stability = v;
        }
        if let Some(v) = overrides.similarity_boost {
            self.similarity_boost = v;
        }
        if let Some(v) = overrides.style {
            self.style = v;
        }
        if let Some(v) = overrides.speed {
            self.speed = v;
        }
        if let Some(v) = overrides.use_speaker_boost {
            self.use_speaker_boost = v;
        }
    }
}

/// A partial prosody record, as supplied in a request's `voice_settings`
/// or a voice-personality entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceOverrides {
    pub stability: Option<f32>,
    pub similarity_boost: Option<f32>,
    pub style: Option<f32>,
    pub speed: Option<f32>,
    pub use_speaker_boost: Option<bool>,
}

impl VoiceOverrides {
    pub fn is_empty(&self) -> bool {
        self.stability.is_none()
            && self.similarity_boost.is_none()
            && self.style.is_none()
            && self.speed.is_none()
            && self.use_speaker_boost.is_none()
    }
}

/// One entry in the voice-personalities file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Upstream voice identifier, when the entry name is a human alias.
    pub voice_id: Option<String>,
    #[serde(flatten)]
    pub settings: VoiceOverrides,
    /// Playback volume in [0.0, 1.0].
    pub volume: Option<f32>,
    /// Free-text character description. Doubles as the style directive for
    /// engines that take one.
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prosody_is_fully_defined() {
        let s = VoiceSettings::default();
        assert_eq!(s.stability, 0.5);
        assert_eq!(s.similarity_boost, 0.75);
        assert_eq!(s.style, 0.0);
        assert_eq!(s.speed, 1.0);
        assert!(s.use_speaker_boost);
    }

    #[test]
    fn apply_replaces_only_supplied_fields() {
        let mut s = VoiceSettings::default();
        s.apply(&VoiceOverrides {
            stability: Some(0.9),
            speed: Some(1.2),
            ..VoiceOverrides::default()
        });
        assert_eq!(s.stability, 0.9);
        assert_eq!(s.speed, 1.2);
        assert_eq!(s.similarity_boost, 0.75);
        assert_eq!(s.style, 0.0);
        assert!(s.use_speaker_boost);
    }

    #[test]
    fn voice_config_deserializes_flattened_prosody() {
        let cfg: VoiceConfig = serde_json::from_str(
            r#"{"voice_id": "abc123", "stability": 0.3, "volume": 0.8, "description": "calm"}"#,
        )
        .unwrap();
        assert_eq!(cfg.voice_id.as_deref(), Some("abc123"));
        assert_eq!(cfg.settings.stability, Some(0.3));
        assert_eq!(cfg.settings.speed, None);
        assert_eq!(cfg.volume, Some(0.8));
    }

    #[test]
    fn engine_formats() {
        assert_eq!(TtsEngine::ElevenLabs.output_format(), Some(AudioFormat::Mp3));
        assert_eq!(TtsEngine::Piper.output_format(), Some(AudioFormat::Wav));
        assert_eq!(TtsEngine::Qwen.output_format(), Some(AudioFormat::Wav));
        assert_eq!(TtsEngine::System.output_format(), None);
    }

    #[test]
    fn local_engine_parse() {
        assert_eq!(LocalEngine::parse("piper"), Some(LocalEngine::Piper));
        assert_eq!(LocalEngine::parse("qwen3"), Some(LocalEngine::Qwen));
        assert_eq!(LocalEngine::parse("festival"), None);
    }
}
