use crate::server::{Delivery, EventSource, OffsetTracker};
use std::sync::{Mutex, MutexGuard};

const TOPIC: &str = "memory";

/// Log-backed single-partition source for local runs and tests. Exhausted
/// once the reader reaches the end of the log.
///
/// Commits are cumulative like a broker's: [`MemoryEventSource::restart`]
/// rewinds the reader to the committed position, so everything from the
/// first unacknowledged event onwards is delivered again.
#[derive(Default)]
pub struct MemoryEventSource {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    log: Vec<Vec<u8>>,
    cursor: usize,
    acked: Vec<i64>,
    offsets: OffsetTracker,
}

impl MemoryEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("memory source poisoned: {e}"))
    }

    /// Appends a payload and returns the offset it was assigned.
    pub fn push(&self, payload: impl Into<Vec<u8>>) -> i64 {
        let Ok(mut inner) = self.lock() else {
            return -1;
        };
        inner.log.push(payload.into());
        inner.log.len() as i64 - 1
    }

    /// Every acknowledgement received, in order, including ones the commit
    /// position has not caught up with.
    pub fn acked_offsets(&self) -> Vec<i64> {
        self.lock().map(|i| i.acked.clone()).unwrap_or_default()
    }

    /// Offset a restarted reader resumes from; `None` before the first
    /// commit.
    pub fn committed_offset(&self) -> Option<i64> {
        self.lock()
            .ok()
            .and_then(|i| i.offsets.committed(TOPIC, 0))
    }

    /// Simulates a consumer restart: reading resumes at the committed
    /// position.
    pub fn restart(&self) {
        if let Ok(mut inner) = self.lock() {
            let position = inner.offsets.committed(TOPIC, 0).unwrap_or(0).max(0);
            inner.cursor = position as usize;
            inner.offsets.restart();
        }
    }
}

#[async_trait::async_trait]
impl EventSource for MemoryEventSource {
    async fn next(&self) -> Option<anyhow::Result<Delivery>> {
        let mut inner = match self.lock() {
            Ok(inner) => inner,
            Err(e) => return Some(Err(e)),
        };

        let offset = inner.cursor;
        let payload = inner.log.get(offset)?.clone();
        inner.cursor += 1;
        inner.offsets.delivered(TOPIC, 0, offset as i64);

        Some(Ok(Delivery {
            topic: TOPIC.to_string(),
            partition: 0,
            offset: offset as i64,
            payload,
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        inner.acked.push(delivery.offset);
        inner
            .offsets
            .acked(&delivery.topic, delivery.partition, delivery.offset);
        Ok(())
    }
}
