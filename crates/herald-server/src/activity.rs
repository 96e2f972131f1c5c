//! External-audio coordination.
//!
//! Immediately before each queued item plays, the PulseAudio daemon is asked
//! for its active sink inputs. A stream counts as ours when its application
//! is the probed uncompressed-audio player and its media name matches the
//! daemon's `voice-*` temp-file pattern; anything else is foreign and the
//! queued item is dropped rather than talking over it. The query is
//! fail-open: no `pactl`, a timeout, or unparseable output all mean
//! "proceed".

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const QUERY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct AudioActivity {
    enabled: bool,
    own_player: Option<&'static str>,
}

impl AudioActivity {
    /// `pactl_present` comes from the start-up probes; `own_player` is the
    /// probed uncompressed-audio player's binary name.
    pub fn new(pactl_present: bool, own_player: Option<&'static str>) -> Self {
        Self {
            enabled: pactl_present,
            own_player,
        }
    }

    /// For platforms (and tests) without a stream-listing facility.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            own_player: None,
        }
    }

    /// True iff at least one active stream does not belong to this daemon.
    pub async fn foreign_stream_active(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let result = tokio::time::timeout(
            QUERY_TIMEOUT,
            Command::new("pactl")
                .args(["list", "sink-inputs"])
                .stdin(Stdio::null())
                .output(),
        )
        .await;

        let output = match result {
            Ok(Ok(output)) if output.status.success() => output,
            Ok(Ok(output)) => {
                tracing::debug!(code = output.status.code(), "pactl query failed, proceeding");
                return false;
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "pactl unavailable, proceeding");
                return false;
            }
            Err(_) => {
                tracing::debug!("pactl query timed out, proceeding");
                return false;
            }
        };

        let listing = String::from_utf8_lossy(&output.stdout);
        let streams = parse_sink_inputs(&listing);
        streams
            .iter()
            .any(|s| !is_daemon_stream(s, self.own_player))
    }
}

#[derive(Debug, Default, PartialEq)]
struct SinkInput {
    application: Option<String>,
    media: Option<String>,
}

/// Parses `pactl list sink-inputs` output: entries start with
/// `Sink Input #N`, properties look like `application.name = "mpv"`.
fn parse_sink_inputs(listing: &str) -> Vec<SinkInput> {
    let mut streams = Vec::new();
    let mut current: Option<SinkInput> = None;

    for line in listing.lines() {
        if line.starts_with("Sink Input #") {
            if let Some(done) = current.take() {
                streams.push(done);
            }
            current = Some(SinkInput::default());
            continue;
        }
        let Some(stream) = current.as_mut() else {
            continue;
        };
        let trimmed = line.trim();
        if let Some(value) = property_value(trimmed, "application.name") {
            stream.application = Some(value.to_string());
        } else if let Some(value) = property_value(trimmed, "media.name") {
            stream.media = Some(value.to_string());
        }
    }
    if let Some(done) = current {
        streams.push(done);
    }
    streams
}

fn property_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(key)?.trim_start().strip_prefix('=')?;
    Some(rest.trim().trim_matches('"'))
}

fn is_daemon_stream(stream: &SinkInput, own_player: Option<&str>) -> bool {
    let Some(player) = own_player else {
        return false;
    };
    if stream.application.as_deref() != Some(player) {
        return false;
    }
    stream
        .media
        .as_deref()
        .map(media_matches_temp_pattern)
        .unwrap_or(false)
}

/// Matches the player's media name against the daemon's temp-file pattern
/// (`voice-<unique>.wav`, possibly reported as a full path).
fn media_matches_temp_pattern(media: &str) -> bool {
    let name = media.rsplit('/').next().unwrap_or(media);
    name.starts_with("voice-") && name.ends_with(".wav")
}
