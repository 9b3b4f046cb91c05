//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: Clock の時刻 + 乱数で ULID を作る

use ulid::Ulid;

use crate::domain::ids::{FlushId, QueueId};
use crate::ports::Clock;

/// IdGenerator は queue item と flush の ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（enqueue は複数タスクから同時に呼ばれる）
pub trait IdGenerator: Send + Sync {
    fn generate_queue_id(&self) -> QueueId;

    fn generate_flush_id(&self) -> FlushId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使うので、FixedClock を渡せば timestamp 部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_queue_id(&self) -> QueueId {
        QueueId::from(self.next_ulid())
    }

    fn generate_flush_id(&self) -> FlushId {
        FlushId::from(self.next_ulid())
    }
}
