//! Retry policy: decides requeue vs. drop after a failed attempt.

/// What to do with an item whose attempt just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put it back for the next cycle.
    Requeue,
    /// Budget exhausted; remove it for good.
    Drop,
}

/// Retry budget for failed submissions.
///
/// There is no backoff: a requeued item is simply eligible again on the next
/// flush, and re-sorting puts it behind newer high-priority work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first one.
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// # Arguments
    /// * `retry_count` - failed attempts so far, already including the one that just failed.
    ///
    /// Example with max_retries=3:
    /// - retry_count 1: Requeue
    /// - retry_count 2: Requeue
    /// - retry_count 3: Drop (three attempts made)
    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count >= self.max_retries {
            RetryDecision::Drop
        } else {
            RetryDecision::Requeue
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
