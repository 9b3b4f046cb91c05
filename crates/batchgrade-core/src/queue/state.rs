//! Item state machine for the submission queue.

use serde::{Deserialize, Serialize};

/// Where a queued submission is in its life.
///
/// State transitions:
/// - Queued -> Processing -> Removed (grade stored)
/// - Queued -> Processing -> Queued (failed, retry_count + 1)
/// - Queued -> Processing -> Dropped (failed, retry_count == max_retries)
///
/// Only `Queued` and `Processing` items are physically in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Queued,

    /// Selected by a flush and handed to the worker.
    Processing,

    /// Graded successfully and removed from the queue.
    Removed,

    /// Retry budget exhausted; removed and reported as permanently failed.
    Dropped,
}

impl ItemState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Removed | ItemState::Dropped)
    }
}
