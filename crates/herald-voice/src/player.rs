//! External audio playback.
//!
//! Bytes are written to a uniquely named temp file and handed to the probed
//! player for the format. The `voice-` file prefix is load-bearing:
//! external-audio detection classifies our own streams by it.

use crate::error::VoiceError;
use crate::probe::{PlayerCandidate, Probes};
use herald_types::AudioFormat;
use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug)]
pub struct AudioPlayer {
    wav: Option<&'static PlayerCandidate>,
    mp3: Option<&'static PlayerCandidate>,
}

impl AudioPlayer {
    pub fn from_probes(probes: &Probes) -> Self {
        Self {
            wav: probes.wav_player,
            mp3: probes.mp3_player,
        }
    }

    pub fn candidate(&self, format: AudioFormat) -> Option<&'static PlayerCandidate> {
        match format {
            AudioFormat::Wav => self.wav,
            AudioFormat::Mp3 => self.mp3,
        }
    }

    /// Plays `bytes` and returns once the player exits. The temp file is
    /// removed on every exit path, including spawn failure.
    pub async fn play(
        &self,
        bytes: &[u8],
        format: AudioFormat,
        volume: f32,
    ) -> Result<(), VoiceError> {
        let candidate = self.candidate(format).ok_or_else(|| {
            VoiceError::Unavailable(format!("no player installed for {format:?}"))
        })?;

        // NamedTempFile removes the file when dropped, so cleanup holds for
        // success, non-zero exit and spawn errors alike.
        let mut tmp = tempfile::Builder::new()
            .prefix("voice-")
            .suffix(format.extension())
            .tempfile()?;
        tmp.write_all(bytes)?;
        tmp.flush()?;

        let status = Command::new(candidate.binary)
            .args(player_argv(candidate, volume, tmp.path()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        if !status.success() {
            return Err(VoiceError::Playback {
                player: candidate.binary.to_string(),
                code: status.code(),
            });
        }
        Ok(())
    }
}

/// Assembles the player's argv: candidate prefix, then volume args when the
/// candidate exposes them and the resolved volume is below full, then the
/// temp-file path. Full volume spawns the player with its own default.
fn player_argv(candidate: &PlayerCandidate, volume: f32, path: &Path) -> Vec<OsString> {
    let mut argv: Vec<OsString> = candidate.args.iter().map(OsString::from).collect();
    let volume = volume.clamp(0.0, 1.0);
    if let Some(volume_args) = candidate.volume_args {
        if (volume - 1.0).abs() > f32::EPSILON {
            argv.extend(volume_args(volume).into_iter().map(OsString::from));
        }
    }
    argv.push(path.into());
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume_flag(v: f32) -> Vec<String> {
        vec![format!("--vol={v}")]
    }

    static VOLUME_AWARE: PlayerCandidate = PlayerCandidate {
        binary: "fake-player",
        args: &["-q"],
        volume_args: Some(volume_flag),
    };

    #[test]
    fn full_volume_omits_the_volume_args() {
        let argv = player_argv(&VOLUME_AWARE, 1.0, Path::new("/tmp/voice-x.wav"));
        assert_eq!(argv, vec![OsString::from("-q"), OsString::from("/tmp/voice-x.wav")]);
    }

    #[test]
    fn reduced_volume_inserts_the_volume_args() {
        let argv = player_argv(&VOLUME_AWARE, 0.5, Path::new("/tmp/voice-x.wav"));
        assert_eq!(
            argv,
            vec![
                OsString::from("-q"),
                OsString::from("--vol=0.5"),
                OsString::from("/tmp/voice-x.wav"),
            ]
        );
    }

    #[test]
    fn out_of_range_volume_is_clamped_before_the_mapping() {
        let argv = player_argv(&VOLUME_AWARE, 1.7, Path::new("/tmp/voice-x.wav"));
        // Clamped to full volume, so the flag is omitted entirely.
        assert_eq!(argv, vec![OsString::from("-q"), OsString::from("/tmp/voice-x.wav")]);
    }

    #[tokio::test]
    async fn missing_player_reports_unavailable() {
        let player = AudioPlayer { wav: None, mp3: None };
        match player.play(b"RIFF", AudioFormat::Wav, 1.0).await {
            Err(VoiceError::Unavailable(_)) => {}
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn temp_file_is_removed_after_spawn_failure() {
        static MISSING: PlayerCandidate = PlayerCandidate {
            binary: "herald-test-no-such-player",
            args: &[],
            volume_args: None,
        };
        let player = AudioPlayer {
            wav: Some(&MISSING),
            mp3: None,
        };
        let before: Vec<_> = voice_temp_files();
        let result = player.play(b"RIFF", AudioFormat::Wav, 1.0).await;
        assert!(result.is_err());
        assert_eq!(voice_temp_files(), before);
    }

    fn voice_temp_files() -> Vec<std::path::PathBuf> {
        let mut files: Vec<_> = std::fs::read_dir(std::env::temp_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("voice-"))
            })
            .collect();
        files.sort();
        files
    }
}
