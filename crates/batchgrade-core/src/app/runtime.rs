//! Runtime - BatchProcessor（サービス本体）
//!
//! アプリケーションのルートで 1 つ build して、ハンドルを clone して配る。
//! グローバルな singleton は持たない。
//!
//! # 共有状態
//! - `SubmissionQueue` は `std::sync::Mutex` の中。`.await` を跨いでロックしない
//! - flush の排他は `FlushGate`（AtomicBool の CAS）
//! - ticker task は `Weak<Shared>` しか持たないので、最後のハンドルが drop されると止まる

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::escalator;
use super::flight::FlushGate;
use super::scheduler::{self, Ticker};
use super::status::{ProcessorStats, QueueStatus, StatsCounters};
use crate::config::ProcessorConfig;
use crate::domain::{FlushReport, QueueError, QueueId, SubmissionRequest};
use crate::ports::{Clock, DeadLetterSink, IdGenerator};
use crate::queue::{QueueItem, SubmissionQueue};
use crate::worker::ProcessingWorker;

pub(crate) struct Shared {
    pub(crate) config: ProcessorConfig,
    queue: Mutex<SubmissionQueue>,
    pub(crate) gate: FlushGate,
    pub(crate) worker: ProcessingWorker,
    pub(crate) ids: Box<dyn IdGenerator>,
    pub(crate) clock: Arc<dyn Clock>,
    sequence: AtomicU64,
    pub(crate) dead_letter: Option<Arc<dyn DeadLetterSink>>,
    pub(crate) stats: StatsCounters,
    ticker: Mutex<Option<Ticker>>,
}

impl Shared {
    pub(crate) fn new(
        config: ProcessorConfig,
        worker: ProcessingWorker,
        ids: Box<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        dead_letter: Option<Arc<dyn DeadLetterSink>>,
    ) -> Self {
        Self {
            queue: Mutex::new(SubmissionQueue::new(config.max_queue_size)),
            config,
            gate: FlushGate::default(),
            worker,
            ids,
            clock,
            sequence: AtomicU64::new(0),
            dead_letter,
            stats: StatsCounters::default(),
            ticker: Mutex::new(None),
        }
    }

    pub(crate) fn lock_queue(&self) -> MutexGuard<'_, SubmissionQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_ticker(&self) -> MutexGuard<'_, Option<Ticker>> {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask the running ticker to bring its next tick forward.
    /// No-op while the scheduler is stopped.
    pub(crate) fn request_expedite(&self) {
        if let Some(ticker) = self.lock_ticker().as_ref() {
            ticker.expedite();
        }
    }
}

/// Handle to the submission batch processor.
///
/// Cheap to clone; all clones share one queue and one scheduler.
/// Must be used from within a Tokio runtime.
#[derive(Clone)]
pub struct BatchProcessor {
    shared: Arc<Shared>,
}

impl BatchProcessor {
    pub(crate) fn from_shared(shared: Shared) -> Self {
        let processor = Self {
            shared: Arc::new(shared),
        };
        if processor.shared.config.autostart {
            processor.start_processing();
        }
        processor
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.shared.config
    }

    /// Buffer a submission for grading.
    ///
    /// Returns immediately. High-priority work, or an enqueue that pushes the
    /// queue past `priority_threshold`, also kicks off an escalation in the
    /// background.
    ///
    /// # Errors
    /// `QueueError::CapacityExceeded` when the queue is full. The caller has to
    /// fall back on its own (grade inline, or reject the request).
    pub fn queue_submission(&self, request: SubmissionRequest) -> Result<QueueId, QueueError> {
        let shared = &self.shared;
        let SubmissionRequest { payload, priority } = request;

        let id = shared.ids.generate_queue_id();
        let sequence = shared.sequence.fetch_add(1, Ordering::Relaxed);
        let item = QueueItem::new(id, payload, priority, shared.clock.now(), sequence);
        let activity_id = item.payload.activity_id.clone();

        let queue_length = {
            let mut queue = shared.lock_queue();
            if let Err(err) = queue.enqueue(item) {
                StatsCounters::bump(&shared.stats.rejected, 1);
                warn!(activity_id = %activity_id, error = %err, "submission rejected");
                return Err(err);
            }
            queue.len()
        };
        StatsCounters::bump(&shared.stats.enqueued, 1);
        debug!(queue_id = %id, priority, queue_length, "submission queued");

        if escalator::should_escalate(&shared.config, priority, queue_length) {
            StatsCounters::bump(&shared.stats.escalations, 1);
            let shared = Arc::clone(shared);
            tokio::spawn(async move {
                escalator::escalate(&shared).await;
            });
        }

        Ok(id)
    }

    pub fn queue_status(&self) -> QueueStatus {
        let queue = self.shared.lock_queue();
        QueueStatus {
            queue_length: queue.len(),
            processing: self.shared.gate.is_busy(),
            high_priority_count: queue.high_priority_count(),
        }
    }

    pub fn stats(&self) -> ProcessorStats {
        self.shared.stats.snapshot()
    }

    /// Discard every queued item. Returns how many were discarded.
    ///
    /// A flush already running still finishes its in-flight calls; their
    /// results are ignored because the items are gone.
    pub fn clear_queue(&self) -> usize {
        let removed = self.shared.lock_queue().clear();
        info!(removed, "submission queue cleared");
        removed
    }

    /// Start the periodic scheduler. No-op if it is already running.
    pub fn start_processing(&self) {
        let mut ticker = self.shared.lock_ticker();
        if ticker.as_ref().is_some_and(Ticker::is_running) {
            return;
        }
        *ticker = Some(scheduler::spawn_ticker(&self.shared));
    }

    /// Stop future ticks. In-flight work finishes and reconciles normally;
    /// queued items stay queued.
    pub fn stop_processing(&self) {
        if let Some(ticker) = self.shared.lock_ticker().take() {
            ticker.request_stop();
        }
    }

    /// `stop_processing` and wait until the scheduler task has exited.
    pub async fn shutdown(&self) {
        let ticker = self.shared.lock_ticker().take();
        if let Some(ticker) = ticker {
            ticker.stop_and_join().await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared
            .lock_ticker()
            .as_ref()
            .is_some_and(Ticker::is_running)
    }

    /// Run one scheduled flush right now.
    ///
    /// Returns `None` when another flush holds the gate or the queue is empty.
    pub async fn flush_now(&self) -> Option<FlushReport> {
        scheduler::run_scheduled_flush(&self.shared).await
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::BatchProcessorBuilder;
    use crate::impls::InMemoryDeadLetterSink;
    use crate::testing::{ScriptedProcessor, wait_until};
    use serde_json::json;
    use std::time::Duration;

    fn manual_config() -> ProcessorConfig {
        ProcessorConfig {
            autostart: false,
            ..Default::default()
        }
    }

    fn build(config: ProcessorConfig, processor: Arc<ScriptedProcessor>) -> BatchProcessor {
        BatchProcessorBuilder::new()
            .config(config)
            .processor(processor)
            .build()
            .unwrap()
    }

    fn request(activity: &str) -> SubmissionRequest {
        SubmissionRequest::new(activity, "stu-1", json!({"q1": "a"}))
    }

    #[tokio::test]
    async fn capacity_exceeded_leaves_length_unchanged() {
        let config = ProcessorConfig {
            max_queue_size: 2,
            ..manual_config()
        };
        let bp = build(config, Arc::new(ScriptedProcessor::always_ok()));

        bp.queue_submission(request("a")).unwrap();
        bp.queue_submission(request("b")).unwrap();
        let err = bp.queue_submission(request("c")).unwrap_err();

        assert_eq!(err, QueueError::CapacityExceeded { capacity: 2 });
        assert_eq!(bp.queue_status().queue_length, 2);
        assert_eq!(bp.stats().rejected, 1);
        assert_eq!(bp.stats().enqueued, 2);
    }

    #[tokio::test]
    async fn flush_selects_priority_then_enqueue_order() {
        let processor = Arc::new(ScriptedProcessor::always_ok());
        let config = ProcessorConfig {
            chunk_size: 1,
            ..manual_config()
        };
        let bp = build(config, processor.clone());

        let first = bp.queue_submission(request("first")).unwrap();
        let urgent = bp.queue_submission(request("urgent").priority(5)).unwrap();
        let third = bp.queue_submission(request("third")).unwrap();

        // spawn された escalation より先に、flush_now が同期的に gate を取る
        let report = bp.flush_now().await.unwrap();
        assert_eq!(report.selected, vec![urgent, first, third]);
        assert_eq!(processor.calls(), vec!["urgent", "first", "third"]);
    }

    #[tokio::test]
    async fn always_failing_item_is_attempted_max_retries_times() {
        let processor = Arc::new(ScriptedProcessor::always_ok().fail_always("doomed"));
        let sink = Arc::new(InMemoryDeadLetterSink::new());
        let bp = BatchProcessorBuilder::new()
            .config(manual_config())
            .processor(processor.clone())
            .dead_letter(sink.clone())
            .build()
            .unwrap();

        let id = bp.queue_submission(request("doomed")).unwrap();

        let r1 = bp.flush_now().await.unwrap();
        assert_eq!(r1.requeued, vec![id]);
        let r2 = bp.flush_now().await.unwrap();
        assert_eq!(r2.requeued, vec![id]);
        let r3 = bp.flush_now().await.unwrap();
        assert_eq!(r3.dropped, vec![id]);

        assert!(bp.flush_now().await.is_none());
        assert_eq!(processor.calls_for("doomed"), 3);
        assert_eq!(bp.queue_status().queue_length, 0);

        let letters = sink.letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].id, id);
        assert_eq!(letters[0].attempts, 3);
        assert!(letters[0].last_error.contains("doomed failed"));
        assert_eq!(bp.stats().dropped, 1);
        assert_eq!(bp.stats().retried, 2);
    }

    #[tokio::test]
    async fn success_on_kth_attempt_removes_exactly_once() {
        let processor = Arc::new(ScriptedProcessor::always_ok().fail_times("flaky", 1));
        let bp = build(manual_config(), processor.clone());

        let id = bp.queue_submission(request("flaky")).unwrap();

        let r1 = bp.flush_now().await.unwrap();
        assert_eq!(r1.requeued, vec![id]);
        let r2 = bp.flush_now().await.unwrap();
        assert_eq!(r2.succeeded, vec![id]);

        assert!(bp.flush_now().await.is_none());
        assert_eq!(processor.calls_for("flaky"), 2);
        assert_eq!(bp.stats().succeeded, 1);
    }

    #[tokio::test]
    async fn chunking_bounds_concurrency() {
        let processor =
            Arc::new(ScriptedProcessor::always_ok().with_delay(Duration::from_millis(5)));
        let config = ProcessorConfig {
            batch_size: 10,
            chunk_size: 3,
            ..manual_config()
        };
        let bp = build(config, processor.clone());
        for i in 0..12 {
            bp.queue_submission(request(&format!("act-{i}"))).unwrap();
        }

        let report = bp.flush_now().await.unwrap();
        assert_eq!(report.attempted(), 10);
        assert_eq!(report.succeeded.len(), 10);
        assert!(processor.max_in_flight() <= 3);
        assert_eq!(bp.queue_status().queue_length, 2);
    }

    #[tokio::test]
    async fn clear_queue_returns_count() {
        let bp = build(manual_config(), Arc::new(ScriptedProcessor::always_ok()));
        bp.queue_submission(request("a")).unwrap();
        bp.queue_submission(request("b").priority(3)).unwrap();

        // priority 3 の escalation が走り終わるのを待つ
        wait_until(|| !bp.queue_status().processing && bp.queue_status().high_priority_count == 0)
            .await;

        assert_eq!(bp.clear_queue(), 1);
        assert_eq!(bp.queue_status(), QueueStatus::default());
    }

    #[tokio::test]
    async fn status_reports_processing_while_flush_runs() {
        let processor = Arc::new(ScriptedProcessor::gated());
        let bp = build(manual_config(), processor.clone());
        bp.queue_submission(request("a")).unwrap();

        let flush = tokio::spawn({
            let bp = bp.clone();
            async move { bp.flush_now().await }
        });
        wait_until(|| processor.calls().len() == 1).await;

        let status = bp.queue_status();
        assert!(status.processing);
        assert_eq!(status.queue_length, 1);

        processor.release(1);
        let report = flush.await.unwrap().unwrap();
        assert_eq!(report.succeeded.len(), 1);
        assert!(!bp.queue_status().processing);
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent_and_keep_queue() {
        let bp = build(manual_config(), Arc::new(ScriptedProcessor::always_ok()));
        assert!(!bp.is_running());

        bp.start_processing();
        bp.start_processing();
        assert!(bp.is_running());

        bp.stop_processing();
        bp.stop_processing();
        assert!(!bp.is_running());

        bp.queue_submission(request("kept")).unwrap();
        assert_eq!(bp.queue_status().queue_length, 1);
    }
}
