//! Progress reporting for pipeline stages.
//!
//! Messages are fire-and-forget: a sink never blocks the pipeline and never
//! reports failure back to it.

use tokio::sync::broadcast;

use crate::constants::concurrency::PROGRESS_CHANNEL_CAPACITY;

/// Receives human-readable status lines.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str);
}

/// Forwards every message to `tracing::info!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _message: &str) {}
}

/// Fans messages out over a broadcast channel.
///
/// Slow receivers lag and lose the oldest messages instead of applying
/// backpressure.
#[derive(Debug, Clone)]
pub struct BroadcastProgress {
    sender: broadcast::Sender<String>,
}

impl BroadcastProgress {
    pub fn new() -> Self {
        Self::with_capacity(PROGRESS_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BroadcastProgress {
    fn report(&self, message: &str) {
        // No receivers is normal when nothing is watching.
        let _ = self.sender.send(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_without_receivers_is_silent() {
        let progress = BroadcastProgress::new();
        progress.report("nobody listening");
    }

    #[tokio::test]
    async fn test_broadcast_preserves_emission_order() {
        let progress = BroadcastProgress::new();
        let mut rx = progress.subscribe();

        progress.report("first");
        progress.report("second");

        assert_eq!(rx.recv().await.unwrap(), "first");
        assert_eq!(rx.recv().await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_lagging_receiver_drops_oldest() {
        let progress = BroadcastProgress::with_capacity(2);
        let mut rx = progress.subscribe();

        for i in 0..5 {
            progress.report(&format!("message {}", i));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(rx.recv().await.unwrap(), "message 3");
    }
}
