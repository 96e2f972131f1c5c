//! Principal identity loaded from the user's structured settings file.

use crate::voice::VoiceOverrides;
use serde::Deserialize;

/// Display-name and voice-preference bundle (`daidentity` in the settings
/// file). Populates the default voice and notification titles.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Identity {
    /// Default voice identifier.
    #[serde(rename = "voiceId")]
    pub voice_id: Option<String>,
    /// Owner display name.
    pub name: Option<String>,
    /// Prosody overrides for the default voice.
    pub voice: Option<VoiceOverrides>,
}
