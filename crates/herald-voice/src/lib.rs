//! TTS back-ends, playback and dispatch for the Herald daemon.
//!
//! Back-ends share one contract: render a text string into an in-memory
//! audio buffer of a known format (the system speech tool speaks directly
//! instead). Probing happens once at start-up, the engine selection is
//! cached for the daemon's lifetime, and the high-latency sidecar path runs
//! a progressive sentence pipeline so generation overlaps playback.

pub mod dispatch;
pub mod elevenlabs;
pub mod error;
pub mod pipeline;
pub mod piper;
pub mod player;
pub mod probe;
pub mod qwen;
pub mod system;
pub mod text;

pub use dispatch::{select_engine, EngineAvailability, SpeakRequest, Speaker, SpeakerConfig};
pub use error::VoiceError;
pub use player::AudioPlayer;
pub use probe::Probes;
