//! PriorityEscalator - enqueue 時の out-of-cycle flush
//!
//! 発火条件（同期的に判定）: `priority > 1` または `queue_length >= priority_threshold`
//!
//! - priority > 1 の item が 1 件も無ければ何もしない（gate も取らない）
//! - 他の flush が走っていれば 2 本目は始めない。代わりに scheduler の次の tick を
//!   `expedited_interval` まで前倒しさせる
//! - そうでなければ gate を取り、priority > 1 の item を最大 `escalation_batch_size`
//!   件だけ、scheduler と同じ chunk 経路で処理する

use tracing::debug;

use super::runtime::Shared;
use super::scheduler::execute_flush;
use crate::config::ProcessorConfig;
use crate::domain::{DEFAULT_PRIORITY, FlushReport, FlushTrigger};
use crate::queue::QueueItem;

/// What an escalation ended up doing.
#[derive(Debug)]
pub(crate) enum Escalation {
    /// Processed the high-priority backlog out of cycle.
    Ran(FlushReport),
    /// Another flush was running; the scheduler was asked to tick sooner.
    Expedited,
    /// Nothing with priority > 1 was waiting.
    Idle,
}

pub(crate) fn should_escalate(
    config: &ProcessorConfig,
    priority: u32,
    queue_length: usize,
) -> bool {
    priority > DEFAULT_PRIORITY || queue_length >= config.priority_threshold
}

pub(crate) async fn escalate(shared: &Shared) -> Escalation {
    // 圧力だけで発火した場合は gate も取らない（定期 tick を邪魔しない）
    if shared.lock_queue().high_priority_count() == 0 {
        return Escalation::Idle;
    }
    let Some(guard) = shared.gate.try_acquire() else {
        debug!("flush in progress, expediting next tick instead of escalating");
        shared.request_expedite();
        return Escalation::Expedited;
    };

    let batch = shared
        .lock_queue()
        .dequeue_batch_where(shared.config.escalation_batch_size, QueueItem::is_high_priority);
    if batch.is_empty() {
        return Escalation::Idle;
    }

    Escalation::Ran(execute_flush(shared, &guard, FlushTrigger::Escalation, batch).await)
}
