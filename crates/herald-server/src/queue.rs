//! The serial audio queue.
//!
//! One bounded FIFO serves every request that wants voice output. A single
//! worker task dequeues strictly in order and does not pick the next item
//! until the previous item's synthesis-plus-playback has returned. The HTTP
//! handler enqueues and returns immediately; the per-item completion exists
//! for the worker's bookkeeping and for tests.

use herald_voice::{SpeakRequest, Speaker};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::activity::AudioActivity;

/// Queue depth. A voice notification stuck behind this many predecessors is
/// stale anyway, so the newest item is dropped when full.
pub const QUEUE_DEPTH: usize = 64;

/// What happened to a queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Synthesis and playback completed (possibly via a fallback engine).
    Spoken,
    /// Dropped because foreign audio was playing, or nothing to say.
    Skipped,
    /// Every engine path failed; logged and swallowed.
    Failed,
}

/// A queued item: the request plus its completion.
#[derive(Debug)]
pub struct QueuedNotification {
    pub request: SpeakRequest,
    pub done: oneshot::Sender<Outcome>,
}

/// Producer half of the queue, held by the HTTP handlers.
#[derive(Debug, Clone)]
pub struct AudioQueue {
    tx: mpsc::Sender<QueuedNotification>,
}

impl AudioQueue {
    pub fn new() -> (Self, mpsc::Receiver<QueuedNotification>) {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        (Self { tx }, rx)
    }

    /// Enqueues a request. Returns the completion receiver, or `None` when
    /// the queue is full or the worker is gone; the notification is dropped
    /// in both cases, and the caller has already been answered.
    pub fn enqueue(&self, request: SpeakRequest) -> Option<oneshot::Receiver<Outcome>> {
        let (done, completion) = oneshot::channel();
        match self.tx.try_send(QueuedNotification { request, done }) {
            Ok(()) => Some(completion),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("audio queue full, dropping newest notification");
                None
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("audio queue worker is gone, dropping notification");
                None
            }
        }
    }
}

/// Starts the single consumer. Runs until every `AudioQueue` handle drops.
pub fn spawn_worker(
    speaker: Arc<Speaker>,
    activity: AudioActivity,
    mut rx: mpsc::Receiver<QueuedNotification>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            let outcome = if activity.foreign_stream_active().await {
                tracing::info!("external audio playing, skipping voice notification");
                Outcome::Skipped
            } else {
                match speaker.speak(&item.request).await {
                    Ok(()) => Outcome::Spoken,
                    Err(e) => {
                        tracing::error!(error = %e, "voice notification failed on every engine");
                        Outcome::Failed
                    }
                }
            };
            // The handler may have dropped its receiver long ago.
            let _ = item.done.send(outcome);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_returns_completion() {
        let (queue, mut rx) = AudioQueue::new();
        let completion = queue.enqueue(SpeakRequest {
            message: "hello".to_string(),
            ..SpeakRequest::default()
        });
        assert!(completion.is_some());
        let item = rx.try_recv().unwrap();
        assert_eq!(item.request.message, "hello");
    }

    #[test]
    fn full_queue_drops_newest() {
        let (queue, _rx) = AudioQueue::new();
        for _ in 0..QUEUE_DEPTH {
            assert!(queue.enqueue(SpeakRequest::default()).is_some());
        }
        assert!(queue.enqueue(SpeakRequest::default()).is_none());
    }

    #[test]
    fn closed_queue_drops_item() {
        let (queue, rx) = AudioQueue::new();
        drop(rx);
        assert!(queue.enqueue(SpeakRequest::default()).is_none());
    }
}
