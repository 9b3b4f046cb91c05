//! Queue item: id + payload + ordering/retry metadata.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ItemState;
use crate::domain::{DEFAULT_PRIORITY, QueueId, SubmissionPayload};

/// One pending unit of work.
///
/// Design:
/// - The queue owns these; flushes work on clones and reconcile by `id`.
/// - `sequence` breaks ties between items enqueued in the same millisecond.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: QueueId,
    pub payload: SubmissionPayload,
    pub enqueued_at: DateTime<Utc>,
    pub sequence: u64,
    pub priority: u32,

    /// Number of failed attempts so far.
    pub retry_count: u32,

    pub state: ItemState,

    /// Last processing error (if any).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueueItem {
    pub fn new(
        id: QueueId,
        payload: SubmissionPayload,
        priority: u32,
        enqueued_at: DateTime<Utc>,
        sequence: u64,
    ) -> Self {
        Self {
            id,
            payload,
            enqueued_at,
            sequence,
            priority: priority.max(DEFAULT_PRIORITY),
            retry_count: 0,
            state: ItemState::Queued,
            last_error: None,
        }
    }

    pub fn is_high_priority(&self) -> bool {
        self.priority > DEFAULT_PRIORITY
    }

    /// Dequeue order: priority desc, then oldest first.
    pub fn dequeue_order(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.enqueued_at.cmp(&other.enqueued_at))
            .then_with(|| self.sequence.cmp(&other.sequence))
    }

    pub fn start_attempt(&mut self) {
        self.state = ItemState::Processing;
    }

    /// Record a failed attempt and go back to `Queued`.
    pub fn record_failure(&mut self, error: String) {
        self.retry_count += 1;
        self.last_error = Some(error);
        self.state = ItemState::Queued;
    }

    pub fn mark_removed(&mut self) {
        self.state = ItemState::Removed;
    }

    pub fn mark_dropped(&mut self) {
        self.state = ItemState::Dropped;
    }
}
