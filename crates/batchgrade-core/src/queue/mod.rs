//! Queue module: bounded submission queue, item state, retry policy.
//!
//! `SubmissionQueue` is plain synchronous data. The service wraps it in a
//! mutex and never holds that lock across an `.await`.

mod record;
mod retry;
mod state;

pub use record::QueueItem;
pub use retry::{RetryDecision, RetryPolicy};
pub use state::ItemState;

use std::collections::HashSet;

use crate::domain::{QueueError, QueueId};

/// Result of reconciling one chunk of attempts back into the queue.
#[derive(Debug, Default)]
pub struct Reconciled {
    pub succeeded: Vec<QueueId>,
    pub requeued: Vec<QueueId>,

    /// Items removed for good, with their final retry_count / last_error.
    pub dropped: Vec<QueueItem>,
}

/// Bounded, ordered collection of pending submissions.
///
/// Invariants:
/// - ids are unique (`ids` mirrors `items`)
/// - `items.len() <= capacity`
/// - `high_priority` equals the number of items with priority > 1
#[derive(Debug)]
pub struct SubmissionQueue {
    items: Vec<QueueItem>,
    ids: HashSet<QueueId>,
    capacity: usize,
    high_priority: usize,
}

impl SubmissionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            ids: HashSet::new(),
            capacity,
            high_priority: 0,
        }
    }

    /// Add an item. Never blocks; rejects instead of growing past capacity.
    pub fn enqueue(&mut self, item: QueueItem) -> Result<QueueId, QueueError> {
        if self.items.len() >= self.capacity {
            return Err(QueueError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        if self.ids.contains(&item.id) {
            return Err(QueueError::DuplicateId(item.id));
        }
        let id = item.id;
        self.track(&item);
        self.ids.insert(id);
        self.items.push(item);
        Ok(id)
    }

    /// Sort the live queue and return up to `n` items in dequeue order.
    ///
    /// Nothing is removed: removal is decided after processing.
    pub fn dequeue_batch(&mut self, n: usize) -> Vec<QueueItem> {
        self.items.sort_by(|a, b| a.dequeue_order(b));
        self.items.iter().take(n).cloned().collect()
    }

    /// Same as `dequeue_batch`, restricted to items matching `pred`.
    ///
    /// Only the matching subset is sorted; the queue itself is left as is.
    pub fn dequeue_batch_where<F>(&self, n: usize, pred: F) -> Vec<QueueItem>
    where
        F: Fn(&QueueItem) -> bool,
    {
        let mut matching: Vec<&QueueItem> = self.items.iter().filter(|item| pred(item)).collect();
        matching.sort_by(|a, b| a.dequeue_order(b));
        matching.into_iter().take(n).cloned().collect()
    }

    /// Flag the given items as handed to the worker.
    pub fn mark_processing(&mut self, ids: &[QueueId]) {
        let wanted: HashSet<&QueueId> = ids.iter().collect();
        for item in self.items.iter_mut().filter(|i| wanted.contains(&i.id)) {
            item.start_attempt();
        }
    }

    /// Remove items by id, returning the ones that were present.
    pub fn remove(&mut self, ids: &[QueueId]) -> Vec<QueueItem> {
        let wanted: HashSet<&QueueId> = ids.iter().collect();
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            if wanted.contains(&item.id) {
                removed.push(item);
            } else {
                kept.push(item);
            }
        }
        self.items = kept;
        for item in &removed {
            self.ids.remove(&item.id);
            self.untrack(item);
        }
        removed
    }

    /// Put items back. An item whose id is still queued is replaced in place;
    /// otherwise it is appended if there is room.
    ///
    /// Returns the items that did not fit.
    pub fn reinsert(&mut self, items: Vec<QueueItem>) -> Vec<QueueItem> {
        let mut rejected = Vec::new();
        for item in items {
            if self.ids.contains(&item.id) {
                if let Some(pos) = self.items.iter().position(|i| i.id == item.id) {
                    self.track(&item);
                    let old = std::mem::replace(&mut self.items[pos], item);
                    self.untrack(&old);
                }
            } else if self.items.len() < self.capacity {
                self.track(&item);
                self.ids.insert(item.id);
                self.items.push(item);
            } else {
                rejected.push(item);
            }
        }
        rejected
    }

    /// Apply attempt results: success removes, failure requeues or drops.
    ///
    /// Items no longer in the queue (e.g. cleared mid-flush) are ignored.
    pub fn reconcile(
        &mut self,
        results: Vec<(QueueId, Result<(), String>)>,
        policy: RetryPolicy,
    ) -> Reconciled {
        let mut out = Reconciled::default();

        let (ok, failed): (Vec<_>, Vec<_>) = results.into_iter().partition(|(_, r)| r.is_ok());

        let ok_ids: Vec<QueueId> = ok.into_iter().map(|(id, _)| id).collect();
        for mut item in self.remove(&ok_ids) {
            item.mark_removed();
            out.succeeded.push(item.id);
        }

        let failed_ids: Vec<QueueId> = failed.iter().map(|(id, _)| *id).collect();
        let mut back = Vec::new();
        for mut item in self.remove(&failed_ids) {
            let error = failed
                .iter()
                .find(|(id, _)| *id == item.id)
                .and_then(|(_, r)| r.clone().err())
                .unwrap_or_default();
            item.record_failure(error);
            match policy.decide(item.retry_count) {
                RetryDecision::Requeue => {
                    out.requeued.push(item.id);
                    back.push(item);
                }
                RetryDecision::Drop => {
                    item.mark_dropped();
                    out.dropped.push(item);
                }
            }
        }
        // 直前に remove した分なので容量は足りる
        let rejected = self.reinsert(back);
        debug_assert!(rejected.is_empty());

        out
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, id: &QueueId) -> bool {
        self.ids.contains(id)
    }

    pub fn get(&self, id: &QueueId) -> Option<&QueueItem> {
        self.items.iter().find(|i| i.id == *id)
    }

    pub fn high_priority_count(&self) -> usize {
        self.high_priority
    }

    /// Drop everything, returning how many items were discarded.
    pub fn clear(&mut self) -> usize {
        let n = self.items.len();
        self.items.clear();
        self.ids.clear();
        self.high_priority = 0;
        n
    }

    fn track(&mut self, item: &QueueItem) {
        if item.is_high_priority() {
            self.high_priority += 1;
        }
    }

    fn untrack(&mut self, item: &QueueItem) {
        if item.is_high_priority() {
            self.high_priority -= 1;
        }
    }
}
