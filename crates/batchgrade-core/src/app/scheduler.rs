//! BatchScheduler - 定期 flush と、flush 本体（chunk 単位の並列実行 + reconcile）
//!
//! # フロー（1 tick）
//! 1. gate が取れない / キューが空なら何もしない
//! 2. キューを並べ替えて先頭 `batch_size` 件を選ぶ（まだ remove しない）
//! 3. `chunk_size` ごとに順番に処理。chunk 内は並列（settle-all）
//! 4. chunk ごとに reconcile: 成功 → remove、失敗 → retry_count+1 で requeue か drop
//! 5. guard の drop で gate を解放
//!
//! escalation も 3〜5 は同じ `execute_flush` を通る。

use std::sync::{Arc, Weak};
use std::time::Instant;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::flight::FlushGuard;
use super::runtime::Shared;
use super::status::StatsCounters;
use crate::domain::{FlushReport, FlushTrigger, QueueId};
use crate::ports::DeadLetter;
use crate::queue::QueueItem;

/// Run one scheduled flush if nothing else is flushing and there is work.
pub(crate) async fn run_scheduled_flush(shared: &Shared) -> Option<FlushReport> {
    if shared.lock_queue().is_empty() {
        return None;
    }
    let Some(guard) = shared.gate.try_acquire() else {
        debug!("flush already in progress, skipping tick");
        return None;
    };
    let batch = shared.lock_queue().dequeue_batch(shared.config.batch_size);
    if batch.is_empty() {
        return None;
    }
    Some(execute_flush(shared, &guard, FlushTrigger::Scheduled, batch).await)
}

/// Process `batch` chunk by chunk and reconcile every outcome into the queue.
///
/// Taking the guard by reference ties the whole run to the single-flight gate.
pub(crate) async fn execute_flush(
    shared: &Shared,
    _guard: &FlushGuard<'_>,
    trigger: FlushTrigger,
    batch: Vec<QueueItem>,
) -> FlushReport {
    let flush_id = shared.ids.generate_flush_id();
    let started = Instant::now();
    info!(%flush_id, ?trigger, items = batch.len(), "flush started");

    let mut report = FlushReport {
        flush_id,
        trigger,
        selected: batch.iter().map(|i| i.id).collect(),
        succeeded: Vec::new(),
        requeued: Vec::new(),
        dropped: Vec::new(),
        elapsed: Default::default(),
    };

    for chunk in batch.chunks(shared.config.chunk_size) {
        let ids: Vec<QueueId> = chunk.iter().map(|i| i.id).collect();
        shared.lock_queue().mark_processing(&ids);

        let attempts = shared.worker.process_chunk(chunk).await;
        let results = attempts
            .into_iter()
            .map(|(id, result)| (id, result.map(|_| ()).map_err(|e| e.to_string())))
            .collect();

        let reconciled = shared
            .lock_queue()
            .reconcile(results, shared.config.retry_policy());

        let stats = &shared.stats;
        StatsCounters::bump(&stats.succeeded, reconciled.succeeded.len());
        StatsCounters::bump(&stats.retried, reconciled.requeued.len());
        StatsCounters::bump(&stats.dropped, reconciled.dropped.len());

        report.succeeded.extend(reconciled.succeeded);
        report.requeued.extend(reconciled.requeued);
        for item in reconciled.dropped {
            report.dropped.push(item.id);
            dead_letter(shared, item).await;
        }
    }

    StatsCounters::bump(&shared.stats.flushes, 1);
    report.elapsed = started.elapsed();
    info!(
        %flush_id,
        ?trigger,
        succeeded = report.succeeded.len(),
        requeued = report.requeued.len(),
        dropped = report.dropped.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "flush finished"
    );
    report
}

async fn dead_letter(shared: &Shared, item: QueueItem) {
    let last_error = item.last_error.clone().unwrap_or_default();
    error!(
        queue_id = %item.id,
        activity_id = %item.payload.activity_id,
        student_id = %item.payload.student_id,
        attempts = item.retry_count,
        last_error = %last_error,
        "submission dropped after exhausting retries"
    );

    if let Some(sink) = &shared.dead_letter {
        let letter = DeadLetter {
            id: item.id,
            priority: item.priority,
            attempts: item.retry_count,
            last_error,
            enqueued_at: item.enqueued_at,
            dropped_at: shared.clock.now(),
            payload: item.payload,
        };
        sink.record(letter).await;
    }
}

/// Handle to the periodic ticker task.
///
/// Each ticker owns its expedite `Notify`, so a request made before a restart
/// never carries over to the next ticker.
pub(crate) struct Ticker {
    shutdown_tx: watch::Sender<bool>,
    expedite: Arc<Notify>,
    join: JoinHandle<()>,
}

impl Ticker {
    pub(crate) fn is_running(&self) -> bool {
        !self.join.is_finished() && !*self.shutdown_tx.borrow()
    }

    /// 待っていなくても permit が 1 つ残るので、flush 中の要求は次の sleep で拾われる
    pub(crate) fn expedite(&self) {
        self.expedite.notify_one();
    }

    /// Stop taking new ticks. A flush already running is not cancelled.
    pub(crate) fn request_stop(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub(crate) async fn stop_and_join(self) {
        self.request_stop();
        let _ = self.join.await;
    }
}

pub(crate) fn spawn_ticker(shared: &Arc<Shared>) -> Ticker {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let weak = Arc::downgrade(shared);
    let expedite = Arc::new(Notify::new());
    let join = tokio::spawn(ticker_loop(weak, Arc::clone(&expedite), shutdown_rx));
    Ticker {
        shutdown_tx,
        expedite,
        join,
    }
}

async fn ticker_loop(
    shared: Weak<Shared>,
    expedite: Arc<Notify>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let Some((interval, expedited)) = shared.upgrade().map(|s| {
        (
            s.config.processing_interval(),
            s.config.expedited_interval(),
        )
    }) else {
        return;
    };
    info!(interval_ms = interval.as_millis() as u64, "batch scheduler started");

    loop {
        let sleep = tokio::time::sleep(interval);
        tokio::pin!(sleep);

        // sleep が終わるまで待つ。途中で expedite が来たら締め切りを前倒しする（1 回分だけ）
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("batch scheduler stopped");
                        return;
                    }
                }
                _ = expedite.notified() => {
                    let sooner = tokio::time::Instant::now() + expedited;
                    if sooner < sleep.deadline() {
                        sleep.as_mut().reset(sooner);
                        if let Some(s) = shared.upgrade() {
                            StatsCounters::bump(&s.stats.expedited_ticks, 1);
                        }
                        debug!(
                            expedited_ms = expedited.as_millis() as u64,
                            "next tick expedited"
                        );
                    }
                }
            }
        }

        if *shutdown_rx.borrow() {
            info!("batch scheduler stopped");
            return;
        }
        let Some(shared) = shared.upgrade() else {
            return;
        };
        // flush 中は shutdown を見ない（in-flight の処理は最後まで reconcile させる）
        let _ = run_scheduled_flush(&shared).await;
    }
}
