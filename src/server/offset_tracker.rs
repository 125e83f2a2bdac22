use std::collections::{BTreeSet, HashMap};

/// Commit positions for brokers whose commits are cumulative.
///
/// Committing position `n` on a partition acknowledges every offset below
/// `n`, so the position may only advance up to the lowest delivered offset
/// that is still unacknowledged. Anything past a held-back offset is
/// delivered again after a restart.
#[derive(Debug, Default)]
pub struct OffsetTracker {
    partitions: HashMap<(String, i32), PartitionOffsets>,
}

#[derive(Debug, Default)]
struct PartitionOffsets {
    outstanding: BTreeSet<i64>,
    highest_acked: Option<i64>,
    committed: Option<i64>,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&mut self, topic: &str, partition: i32, offset: i64) {
        self.partition_mut(topic, partition).outstanding.insert(offset);
    }

    /// Records an acknowledgement and returns the new commit position when
    /// it moved forward.
    pub fn acked(&mut self, topic: &str, partition: i32, offset: i64) -> Option<i64> {
        let offsets = self.partition_mut(topic, partition);
        offsets.outstanding.remove(&offset);
        let highest = offsets.highest_acked.map_or(offset, |h| h.max(offset));
        offsets.highest_acked = Some(highest);

        let position = match offsets.outstanding.first() {
            Some(&lowest) => lowest.min(highest + 1),
            None => highest + 1,
        };
        if offsets.committed.is_some_and(|c| position <= c) {
            return None;
        }
        offsets.committed = Some(position);
        Some(position)
    }

    /// Next offset a fresh consumer of the partition would receive.
    pub fn committed(&self, topic: &str, partition: i32) -> Option<i64> {
        self.partitions
            .get(&(topic.to_owned(), partition))
            .and_then(|p| p.committed)
    }

    /// Starts a new session: outstanding offsets are forgotten, commit
    /// positions are kept.
    pub fn restart(&mut self) {
        for offsets in self.partitions.values_mut() {
            offsets.outstanding.clear();
            offsets.highest_acked = None;
        }
    }

    fn partition_mut(&mut self, topic: &str, partition: i32) -> &mut PartitionOffsets {
        self.partitions
            .entry((topic.to_owned(), partition))
            .or_default()
    }
}
