//! Shared types for the Herald voice-notification daemon.
//!
//! Defines the closed set of TTS engines, the audio formats the player must
//! distinguish, prosody records and their merge rules, and the principal
//! identity bundle loaded from the user's settings file.

pub mod identity;
pub mod voice;

pub use identity::Identity;
pub use voice::{
    AudioFormat, LocalEngine, TtsEngine, VoiceConfig, VoiceOverrides, VoiceSettings,
};
