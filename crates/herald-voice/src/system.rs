//! Platform speech tool back-end (`say`, `espeak-ng`, `espeak`, `festival`).
//!
//! These tools synthesise and play in one step, so the audio player is not
//! involved and no buffer is produced.

use crate::error::VoiceError;
use crate::probe::{SpeechCandidate, TextInput};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug)]
pub struct SystemTts {
    candidate: &'static SpeechCandidate,
}

impl SystemTts {
    pub fn new(candidate: &'static SpeechCandidate) -> Self {
        Self { candidate }
    }

    pub fn binary(&self) -> &'static str {
        self.candidate.binary
    }

    /// Speaks `text` and returns when the tool exits.
    pub async fn speak(&self, text: &str) -> Result<(), VoiceError> {
        let mut cmd = Command::new(self.candidate.binary);
        cmd.args(self.candidate.args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let output = match self.candidate.text_input {
            TextInput::Argv => {
                cmd.arg(text).stdin(Stdio::null());
                cmd.spawn()?.wait_with_output().await?
            }
            TextInput::Stdin => {
                cmd.stdin(Stdio::piped());
                let mut child = cmd.spawn()?;
                if let Some(mut stdin) = child.stdin.take() {
                    stdin.write_all(text.as_bytes()).await?;
                }
                child.wait_with_output().await?
            }
        };

        if !output.status.success() {
            return Err(VoiceError::EngineExit {
                engine: "system",
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}
