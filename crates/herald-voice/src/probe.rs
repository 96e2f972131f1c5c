//! Start-up probes for engines, players and speech tools.
//!
//! Every probe answers "is this usable right now?" exactly once; the results
//! are cached in [`Probes`] for the daemon's lifetime and never revised.

use herald_types::AudioFormat;
use std::path::Path;

/// How a speech tool receives its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextInput {
    /// Text appended to argv.
    Argv,
    /// Text written to stdin.
    Stdin,
}

/// A platform speech tool that both synthesises and plays.
#[derive(Debug)]
pub struct SpeechCandidate {
    pub binary: &'static str,
    pub args: &'static [&'static str],
    pub text_input: TextInput,
}

/// An external audio player probed per format.
#[derive(Debug)]
pub struct PlayerCandidate {
    pub binary: &'static str,
    pub args: &'static [&'static str],
    /// Maps a normalised volume in [0.0, 1.0] to extra argv, when the player
    /// exposes a volume control.
    pub volume_args: Option<fn(f32) -> Vec<String>>,
}

#[cfg(target_os = "macos")]
fn afplay_volume(v: f32) -> Vec<String> {
    vec!["-v".to_string(), format!("{v}")]
}

#[cfg(not(target_os = "macos"))]
fn mpv_volume(v: f32) -> Vec<String> {
    vec![format!("--volume={}", (v * 100.0).round() as u32)]
}

#[cfg(not(target_os = "macos"))]
fn paplay_volume(v: f32) -> Vec<String> {
    // PulseAudio volume scale: 65536 is 100%.
    vec![format!("--volume={}", (v * 65536.0).round() as u32)]
}

#[cfg(target_os = "macos")]
const WAV_PLAYERS: &[PlayerCandidate] = &[PlayerCandidate {
    binary: "afplay",
    args: &[],
    volume_args: Some(afplay_volume),
}];

#[cfg(target_os = "macos")]
const MP3_PLAYERS: &[PlayerCandidate] = &[PlayerCandidate {
    binary: "afplay",
    args: &[],
    volume_args: Some(afplay_volume),
}];

#[cfg(not(target_os = "macos"))]
const WAV_PLAYERS: &[PlayerCandidate] = &[
    PlayerCandidate {
        binary: "paplay",
        args: &[],
        volume_args: Some(paplay_volume),
    },
    PlayerCandidate {
        binary: "mpv",
        args: &["--no-terminal"],
        volume_args: Some(mpv_volume),
    },
    PlayerCandidate {
        binary: "aplay",
        args: &["-q"],
        volume_args: None,
    },
];

#[cfg(not(target_os = "macos"))]
const MP3_PLAYERS: &[PlayerCandidate] = &[
    PlayerCandidate {
        binary: "mpv",
        args: &["--no-terminal"],
        volume_args: Some(mpv_volume),
    },
    PlayerCandidate {
        binary: "mpg123",
        args: &["-q"],
        volume_args: None,
    },
    PlayerCandidate {
        binary: "paplay",
        args: &[],
        volume_args: Some(paplay_volume),
    },
];

#[cfg(target_os = "macos")]
const SPEECH_TOOLS: &[SpeechCandidate] = &[SpeechCandidate {
    binary: "say",
    args: &[],
    text_input: TextInput::Argv,
}];

#[cfg(not(target_os = "macos"))]
const SPEECH_TOOLS: &[SpeechCandidate] = &[
    SpeechCandidate {
        binary: "espeak-ng",
        args: &[],
        text_input: TextInput::Argv,
    },
    SpeechCandidate {
        binary: "espeak",
        args: &[],
        text_input: TextInput::Argv,
    },
    SpeechCandidate {
        binary: "festival",
        args: &["--tts"],
        text_input: TextInput::Stdin,
    },
];

fn on_path(binary: &str) -> bool {
    which::which(binary).is_ok()
}

/// First candidate whose binary is present, in table order.
fn first_present<'a, T, F>(candidates: &'a [T], binary: F) -> Option<&'a T>
where
    F: Fn(&T) -> &str,
{
    first_present_with(candidates, binary, on_path)
}

fn first_present_with<'a, T, F, P>(candidates: &'a [T], binary: F, present: P) -> Option<&'a T>
where
    F: Fn(&T) -> &str,
    P: Fn(&str) -> bool,
{
    candidates.iter().find(|c| present(binary(c)))
}

/// Cached probe outcomes. Built once at start-up, read-only thereafter.
#[derive(Debug)]
pub struct Probes {
    pub wav_player: Option<&'static PlayerCandidate>,
    pub mp3_player: Option<&'static PlayerCandidate>,
    pub speech_tool: Option<&'static SpeechCandidate>,
    pub piper: bool,
    pub pactl: bool,
}

impl Probes {
    /// Runs the synchronous probes. The Qwen sidecar probe is separate
    /// (it is an HTTP call; see [`crate::qwen::QwenSidecar::healthy`]).
    pub fn detect(piper_binary: &str, piper_model: &Path) -> Self {
        let probes = Self {
            wav_player: first_present(WAV_PLAYERS, |c| c.binary),
            mp3_player: first_present(MP3_PLAYERS, |c| c.binary),
            speech_tool: first_present(SPEECH_TOOLS, |c| c.binary),
            piper: piper_available(piper_binary, piper_model),
            pactl: on_path("pactl"),
        };

        tracing::info!(
            wav_player = probes.wav_player.map(|c| c.binary),
            mp3_player = probes.mp3_player.map(|c| c.binary),
            speech_tool = probes.speech_tool.map(|c| c.binary),
            piper = probes.piper,
            pactl = probes.pactl,
            "probed audio back-ends"
        );
        probes
    }

    pub fn player_for(&self, format: AudioFormat) -> Option<&'static PlayerCandidate> {
        match format {
            AudioFormat::Wav => self.wav_player,
            AudioFormat::Mp3 => self.mp3_player,
        }
    }
}

/// True iff the piper binary is discoverable AND the voice model exists.
/// Never runs the binary.
pub fn piper_available(binary: &str, model: &Path) -> bool {
    on_path(binary) && model.exists()
}

/// True iff an ElevenLabs credential is actually configured, as opposed to
/// empty or a placeholder left in a template dotenv.
pub fn elevenlabs_configured(api_key: Option<&str>) -> bool {
    match api_key {
        None => false,
        Some(key) => {
            let key = key.trim();
            !key.is_empty() && !key.starts_with("your_") && key != "changeme"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_present_respects_table_order() {
        let present = |b: &str| b == "mpg123" || b == "paplay";
        #[cfg(not(target_os = "macos"))]
        {
            let wav = first_present_with(WAV_PLAYERS, |c| c.binary, present).unwrap();
            assert_eq!(wav.binary, "paplay");
            let mp3 = first_present_with(MP3_PLAYERS, |c| c.binary, present).unwrap();
            assert_eq!(mp3.binary, "mpg123");
        }
        #[cfg(target_os = "macos")]
        {
            assert!(first_present_with(WAV_PLAYERS, |c| c.binary, present).is_none());
        }
    }

    #[test]
    fn first_present_none_when_nothing_installed() {
        assert!(first_present_with(WAV_PLAYERS, |c| c.binary, |_| false).is_none());
    }

    #[test]
    fn placeholder_credentials_are_not_configured() {
        assert!(!elevenlabs_configured(None));
        assert!(!elevenlabs_configured(Some("")));
        assert!(!elevenlabs_configured(Some("   ")));
        assert!(!elevenlabs_configured(Some("your_api_key_here")));
        assert!(!elevenlabs_configured(Some("changeme")));
        assert!(elevenlabs_configured(Some("sk-real-key")));
    }

    #[test]
    fn piper_needs_model_on_disk() {
        // A binary that certainly exists everywhere tests run would be
        // needed to assert the positive path; the model check alone is
        // deterministic.
        assert!(!piper_available(
            "definitely-not-a-binary",
            Path::new("/nonexistent/model.onnx")
        ));
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn volume_mappings() {
        assert_eq!(mpv_volume(0.5), vec!["--volume=50"]);
        assert_eq!(paplay_volume(1.0), vec!["--volume=65536"]);
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn volume_mappings() {
        assert_eq!(afplay_volume(0.25), vec!["-v", "0.25"]);
    }
}
