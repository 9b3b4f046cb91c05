//! ProcessingWorker - 1 件の submission を採点コラボレータに渡す
//!
//! - 採点呼び出しの成否だけが retry 判定に使われる
//! - 成功時の cache invalidation / downstream hook は detached task で投げっぱなし
//!   （失敗は warn ログのみ）

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use futures::future::join_all;
use tracing::{debug, error, warn};

use crate::domain::{GradeOutcome, ProcessingError, QueueId, SubmissionPayload};
use crate::ports::{CacheInvalidator, DownstreamHook, SubmissionProcessor};
use crate::queue::QueueItem;

/// Outcome of one attempt, keyed by the item it belongs to.
pub type Attempt = (QueueId, Result<GradeOutcome, ProcessingError>);

pub struct ProcessingWorker {
    processor: Arc<dyn SubmissionProcessor>,
    cache: Arc<dyn CacheInvalidator>,
    hooks: Arc<[Arc<dyn DownstreamHook>]>,
}

impl ProcessingWorker {
    pub fn new(
        processor: Arc<dyn SubmissionProcessor>,
        cache: Arc<dyn CacheInvalidator>,
        hooks: Vec<Arc<dyn DownstreamHook>>,
    ) -> Self {
        Self {
            processor,
            cache,
            hooks: hooks.into(),
        }
    }

    /// Run one item through the submission processor.
    ///
    /// A panic inside the processor is reported as `ProcessingError::Failed`
    /// so it goes through the same retry budget as any other failure.
    pub async fn process(&self, item: &QueueItem) -> Result<GradeOutcome, ProcessingError> {
        let started = Instant::now();
        let result = AssertUnwindSafe(self.processor.process(&item.payload))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panicked(item, panic)));
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(outcome) if outcome.success => {
                debug!(
                    queue_id = %item.id,
                    grade_id = %outcome.grade_id,
                    score = outcome.score,
                    elapsed_ms,
                    "submission graded"
                );
                self.spawn_side_effects(item.payload.clone(), outcome.clone());
                Ok(outcome)
            }
            Ok(outcome) => {
                warn!(
                    queue_id = %item.id,
                    grade_id = %outcome.grade_id,
                    elapsed_ms,
                    "grader returned an unsuccessful outcome"
                );
                Err(ProcessingError::Rejected(format!(
                    "grade {} was not stored",
                    outcome.grade_id
                )))
            }
            Err(err) => {
                warn!(
                    queue_id = %item.id,
                    attempt = item.retry_count + 1,
                    elapsed_ms,
                    error = %err,
                    "submission processing failed"
                );
                Err(err)
            }
        }
    }

    /// Settle-all over one chunk: every item runs concurrently and one
    /// failure never cancels its siblings. Results keep the input order.
    pub async fn process_chunk(&self, items: &[QueueItem]) -> Vec<Attempt> {
        let futures = items.iter().map(|item| async move {
            let result = self.process(item).await;
            (item.id, result)
        });
        join_all(futures).await
    }

    fn spawn_side_effects(&self, payload: SubmissionPayload, outcome: GradeOutcome) {
        let cache = Arc::clone(&self.cache);
        let invalidate_payload = payload.clone();
        let grade_id = outcome.grade_id.clone();
        tokio::spawn(async move {
            let p = &invalidate_payload;
            let results = [
                cache.invalidate_student_stats(&p.student_id).await,
                cache.invalidate_activity_stats(&p.activity_id).await,
                cache.invalidate_submission_details(&grade_id).await,
            ];
            for err in results.into_iter().filter_map(Result::err) {
                warn!(error = %err, student_id = %p.student_id, "cache invalidation failed");
            }
        });

        for hook in self.hooks.iter() {
            let hook = Arc::clone(hook);
            let payload = payload.clone();
            let outcome = outcome.clone();
            tokio::spawn(async move {
                if let Err(err) = hook.on_graded(&payload, &outcome).await {
                    warn!(
                        hook = hook.name(),
                        grade_id = %outcome.grade_id,
                        error = %err,
                        "downstream hook failed"
                    );
                }
            });
        }
    }
}

fn panicked(item: &QueueItem, panic: Box<dyn Any + Send>) -> ProcessingError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    error!(
        queue_id = %item.id,
        activity_id = %item.payload.activity_id,
        panic = %message,
        "submission processor panicked"
    );
    ProcessingError::failed(format!("processor panicked: {message}"))
}
