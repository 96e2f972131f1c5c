//! Progressive synthesis-and-playback pipeline.
//!
//! High-latency engines take seconds per utterance; splitting the message
//! into sentences and overlapping generation of sentence `i+1` with playback
//! of sentence `i` cuts the time to first audio. One generator, one player,
//! never two playbacks at once, single linear pipeline.
//!
//! The slot/event machine is realised with a channel: the generator fills
//! slots in index order (each message is a `SlotFilled` event), channel
//! close is `GenerationDone`, and the consumer's loop advances the cursor on
//! player exit. Zero-length slots mark failed generation and are skipped.

use crate::error::VoiceError;
use std::future::Future;
use tokio::sync::mpsc;

/// What a pipeline run accomplished.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub generated: usize,
    pub played: usize,
    pub first_error: Option<VoiceError>,
}

impl PipelineOutcome {
    /// The pipeline counts as failed only when nothing was spoken and at
    /// least one stage errored; partial playback is success.
    pub fn into_result(self) -> Result<(), VoiceError> {
        if self.played == 0 {
            if let Some(e) = self.first_error {
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Runs the pipeline over `sentences`.
///
/// `synth` produces the audio for one sentence; `play` plays one buffer and
/// returns when the player exits. Both futures run in the same task group:
/// generation of later sentences proceeds while the current buffer plays.
/// Playback of sentence `i` begins no earlier than the player for `i-1`
/// exits and no earlier than generation of `i` completes.
pub async fn run<S, SF, P, PF>(sentences: Vec<String>, synth: S, play: P) -> PipelineOutcome
where
    S: Fn(usize, String) -> SF,
    SF: Future<Output = Result<Vec<u8>, VoiceError>>,
    P: Fn(usize, Vec<u8>) -> PF,
    PF: Future<Output = Result<(), VoiceError>>,
{
    let total = sentences.len();
    let (slot_tx, mut slot_rx) = mpsc::unbounded_channel::<(usize, Vec<u8>)>();

    let generator = async move {
        let mut generated = 0usize;
        let mut first_error = None;
        for (index, sentence) in sentences.into_iter().enumerate() {
            let buffer = match synth(index, sentence).await {
                Ok(buffer) => {
                    generated += 1;
                    buffer
                }
                Err(e) => {
                    tracing::warn!(slot = index, error = %e, "sentence generation failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                    // An empty slot keeps the cursor moving.
                    Vec::new()
                }
            };
            if slot_tx.send((index, buffer)).is_err() {
                break;
            }
        }
        // slot_tx drops here: GenerationDone.
        (generated, first_error)
    };

    let playback = async {
        let mut played = 0usize;
        let mut first_error = None;
        while let Some((index, buffer)) = slot_rx.recv().await {
            if buffer.is_empty() {
                tracing::debug!(slot = index, "skipping empty slot");
                continue;
            }
            match play(index, buffer).await {
                Ok(()) => played += 1,
                Err(e) => {
                    tracing::warn!(slot = index, error = %e, "sentence playback failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        (played, first_error)
    };

    let ((generated, gen_error), (played, play_error)) = tokio::join!(generator, playback);

    tracing::debug!(total, generated, played, "progressive pipeline finished");
    PipelineOutcome {
        generated,
        played,
        first_error: gen_error.or(play_error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        SynthStart(usize),
        SynthDone(usize),
        PlayStart(usize),
        PlayDone(usize),
    }

    fn sentences(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Sentence {i}.")).collect()
    }

    #[tokio::test]
    async fn plays_every_sentence_in_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let log = events.clone();
        let log2 = events.clone();

        let outcome = run(
            sentences(3),
            move |i, _s| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(Event::SynthStart(i));
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    log.lock().unwrap().push(Event::SynthDone(i));
                    Ok(vec![i as u8 + 1])
                }
            },
            move |i, _b| {
                let log = log2.clone();
                async move {
                    log.lock().unwrap().push(Event::PlayStart(i));
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    log.lock().unwrap().push(Event::PlayDone(i));
                    Ok(())
                }
            },
        )
        .await;

        assert_eq!(outcome.generated, 3);
        assert_eq!(outcome.played, 3);
        assert!(outcome.first_error.is_none());

        let events = events.lock().unwrap().clone();
        let pos = |e: Event| events.iter().position(|&x| x == e).unwrap();

        // Playback of i starts only after its own generation finished and
        // after playback of i-1 finished.
        for i in 0..3 {
            assert!(pos(Event::PlayStart(i)) > pos(Event::SynthDone(i)));
        }
        for i in 1..3 {
            assert!(pos(Event::PlayStart(i)) > pos(Event::PlayDone(i - 1)));
        }
        // Generation overlaps playback: sentence 1 synthesis starts before
        // sentence 0 playback completes.
        assert!(pos(Event::SynthStart(1)) < pos(Event::PlayDone(0)));
    }

    #[tokio::test]
    async fn failed_slot_is_skipped_and_cursor_advances() {
        let played = Arc::new(Mutex::new(Vec::new()));
        let played_log = played.clone();

        let outcome = run(
            sentences(3),
            |i, _s| async move {
                if i == 1 {
                    Err(VoiceError::Unavailable("boom".into()))
                } else {
                    Ok(vec![i as u8 + 1])
                }
            },
            move |i, _b| {
                let played = played_log.clone();
                async move {
                    played.lock().unwrap().push(i);
                    Ok(())
                }
            },
        )
        .await;

        assert_eq!(outcome.generated, 2);
        assert_eq!(outcome.played, 2);
        assert_eq!(*played.lock().unwrap(), vec![0, 2]);
        // Some audio was spoken, so the run still counts as success.
        assert!(outcome.into_result().is_ok());
    }

    #[tokio::test]
    async fn total_generation_failure_is_an_error() {
        let outcome = run(
            sentences(2),
            |_i, _s| async { Err(VoiceError::Unavailable("sidecar down".into())) },
            |_i, _b| async { Ok(()) },
        )
        .await;
        assert_eq!(outcome.played, 0);
        assert!(outcome.into_result().is_err());
    }

    #[tokio::test]
    async fn playback_errors_do_not_stop_the_pipeline() {
        let played = Arc::new(Mutex::new(Vec::new()));
        let played_log = played.clone();

        let outcome = run(
            sentences(3),
            |i, _s| async move { Ok(vec![i as u8 + 1]) },
            move |i, _b| {
                let played = played_log.clone();
                async move {
                    played.lock().unwrap().push(i);
                    if i == 0 {
                        Err(VoiceError::Playback {
                            player: "paplay".into(),
                            code: Some(1),
                        })
                    } else {
                        Ok(())
                    }
                }
            },
        )
        .await;

        assert_eq!(*played.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(outcome.played, 2);
        assert!(outcome.into_result().is_ok());
    }
}
