//! Fire-and-forget progress notifications for the consumer.
//!
//! Events go out on an unbounded [`tokio::sync::mpsc`] channel: sending
//! never waits, and a dropped receiver is silently ignored.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Outcome of one image as reported in progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    Analyzed,
    Skipped,
}

/// A single progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Image `index` (zero-based) of `total` has been processed.
    Image {
        index: usize,
        total: usize,
        fraction: f32,
        status: ImageStatus,
    },
    /// The analysis is complete.
    Finished { fallback: bool },
}

/// Sending half held by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

/// Create a connected reporter/receiver pair.
pub fn channel() -> (ProgressReporter, mpsc::UnboundedReceiver<ProgressEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressReporter { tx: Some(tx) }, rx)
}

impl ProgressReporter {
    /// A reporter that discards every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn image(&self, index: usize, total: usize, status: ImageStatus) {
        let fraction = if total == 0 {
            1.0
        } else {
            (index + 1) as f32 / total as f32
        };
        self.send(ProgressEvent::Image {
            index,
            total,
            fraction,
            status,
        });
    }

    pub fn finished(&self, fallback: bool) {
        self.send(ProgressEvent::Finished { fallback });
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
