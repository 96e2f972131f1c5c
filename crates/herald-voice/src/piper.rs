//! Piper CLI back-end: local neural synthesis on the CPU.

use crate::error::VoiceError;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Timeout for a single synthesis run.
const SYNTH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct Piper {
    binary: String,
    model: PathBuf,
}

impl Piper {
    pub fn new(binary: impl Into<String>, model: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            model: model.into(),
        }
    }

    /// Synthesises `text` to WAV bytes. Prosody does not apply to piper.
    ///
    /// Piper writes its output to a file; the file is unique per call and
    /// removed before this returns, on success and failure alike.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, VoiceError> {
        let out = tempfile::Builder::new()
            .prefix("piper-")
            .suffix(".wav")
            .tempfile()?;
        let out_path = out.path().to_path_buf();

        let mut child = Command::new(&self.binary)
            .arg("-m")
            .arg(&self.model)
            .arg("-f")
            .arg(&out_path)
            .arg("-q")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            VoiceError::Unavailable("piper stdin was not captured".to_string())
        })?;
        let text_owned = text.to_string();
        // Write on a separate task so a full pipe cannot deadlock the wait.
        let write_task =
            tokio::spawn(async move { stdin.write_all(text_owned.as_bytes()).await });

        let output = tokio::time::timeout(SYNTH_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| VoiceError::Timeout {
                engine: "piper",
                seconds: SYNTH_TIMEOUT.as_secs(),
            })??;

        match write_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(VoiceError::Io(e)),
            Err(e) => {
                return Err(VoiceError::Unavailable(format!(
                    "piper stdin writer failed: {e}"
                )))
            }
        }

        if !output.status.success() {
            return Err(VoiceError::EngineExit {
                engine: "piper",
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let bytes = tokio::fs::read(&out_path).await?;
        Ok(bytes)
    }
}
