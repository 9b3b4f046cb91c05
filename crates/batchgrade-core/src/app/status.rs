//! Status - キューの状態スナップショットと累積カウンタ

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time view of the queue.
///
/// Callers use this to decide whether to fall back to a direct write path
/// under load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueStatus {
    pub queue_length: usize,

    /// A flush (scheduled or escalated) is running right now.
    pub processing: bool,

    /// Items with priority > 1.
    pub high_priority_count: usize,
}

/// Cumulative counters since the processor was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessorStats {
    pub enqueued: u64,
    pub rejected: u64,
    pub succeeded: u64,
    pub retried: u64,
    pub dropped: u64,
    pub flushes: u64,
    pub escalations: u64,
    pub expedited_ticks: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) enqueued: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) succeeded: AtomicU64,
    pub(crate) retried: AtomicU64,
    pub(crate) dropped: AtomicU64,
    pub(crate) flushes: AtomicU64,
    pub(crate) escalations: AtomicU64,
    pub(crate) expedited_ticks: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn bump(counter: &AtomicU64, by: usize) {
        counter.fetch_add(by as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ProcessorStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        ProcessorStats {
            enqueued: load(&self.enqueued),
            rejected: load(&self.rejected),
            succeeded: load(&self.succeeded),
            retried: load(&self.retried),
            dropped: load(&self.dropped),
            flushes: load(&self.flushes),
            escalations: load(&self.escalations),
            expedited_ticks: load(&self.expedited_ticks),
        }
    }
}
