/// One message fetched from the event stream, not yet acknowledged.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    /// Waits for the next message. `None` once the source is exhausted.
    async fn next(&self) -> Option<anyhow::Result<Delivery>>;

    /// Marks the message as processed. With cumulative commits the position
    /// only moves past it once every earlier message is acknowledged too, so
    /// an unacknowledged message is delivered again after a restart.
    async fn ack(&self, delivery: &Delivery) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Processed; acknowledge.
    Commit,
    /// Leave unacknowledged so the broker redelivers it.
    Retry,
    /// Unusable message; acknowledge without processing.
    SkipCommit,
}

#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<HandleOutcome>;
}
