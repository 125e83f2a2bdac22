use crate::server::{EventHandler, EventSource, HandleOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sequential consume loop: one message is fully handled before the next
/// is fetched, and a message is acknowledged at most once.
pub struct UserEventListener {
    source: Arc<dyn EventSource>,
    handler: Arc<dyn EventHandler>,
    cancellation_token: CancellationToken,
}

impl UserEventListener {
    pub fn new(
        source: Arc<dyn EventSource>,
        handler: Arc<dyn EventHandler>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            source,
            handler,
            cancellation_token,
        }
    }

    /// Runs until cancelled or until the source is exhausted.
    pub async fn run(&self) {
        tracing::info!("listening for user events");

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("user event listener shutting down...");
                    break;
                }
                next = self.source.next() => next,
            };

            let Some(fetched) = next else {
                tracing::info!("user event source exhausted");
                break;
            };

            let delivery = match fetched {
                Ok(delivery) => delivery,
                Err(e) => {
                    // broker hiccup
                    tracing::warn!(error = ?e, "event fetch failed");
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    continue;
                }
            };

            match self.handler.handle(&delivery.payload).await {
                Ok(HandleOutcome::Commit | HandleOutcome::SkipCommit) => {
                    if let Err(e) = self.source.ack(&delivery).await {
                        tracing::warn!(error = ?e, offset = delivery.offset, "ack failed");
                    }
                }
                Ok(HandleOutcome::Retry) => {
                    tracing::warn!(
                        offset = delivery.offset,
                        "event left unacknowledged for redelivery"
                    );
                }
                Err(e) => {
                    tracing::error!(error = ?e, offset = delivery.offset, "event handler error");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::MemoryEventSource;
    use std::sync::Mutex;

    struct Scripted(Mutex<Vec<HandleOutcome>>);

    #[async_trait::async_trait]
    impl EventHandler for Scripted {
        async fn handle(&self, _payload: &[u8]) -> anyhow::Result<HandleOutcome> {
            Ok(self.0.lock().unwrap().remove(0))
        }
    }

    #[tokio::test]
    async fn acks_commit_and_skip_but_not_retry() {
        let source = Arc::new(MemoryEventSource::new());
        for _ in 0..3 {
            source.push("{}");
        }
        let handler = Arc::new(Scripted(Mutex::new(vec![
            HandleOutcome::Commit,
            HandleOutcome::Retry,
            HandleOutcome::SkipCommit,
        ])));

        UserEventListener::new(source.clone(), handler, CancellationToken::new())
            .run()
            .await;

        assert_eq!(source.acked_offsets(), vec![0, 2]);
        // the retried event pins the commit position
        assert_eq!(source.committed_offset(), Some(1));
    }

    #[tokio::test]
    async fn stops_when_cancelled() {
        let source = Arc::new(MemoryEventSource::new());
        source.push("{}");
        let handler = Arc::new(Scripted(Mutex::new(vec![HandleOutcome::Commit])));
        let token = CancellationToken::new();
        token.cancel();

        UserEventListener::new(source.clone(), handler, token)
            .run()
            .await;

        assert!(source.acked_offsets().is_empty());
        assert_eq!(source.committed_offset(), None);
    }
}
