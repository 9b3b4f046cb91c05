//! App - アプリケーション層
//!
//! ports と queue を組み合わせて、サービス本体を組み立てます。
//!
//! # 主要コンポーネント
//! - **BatchProcessorBuilder**: 構築とワイヤリング（起動時検証）
//! - **BatchProcessor**: 公開 API（queue_submission / status / lifecycle）
//! - **scheduler**: 定期 flush と flush 本体
//! - **escalator**: enqueue 時の out-of-cycle flush
//! - **status**: QueueStatus / ProcessorStats

pub mod builder;
mod escalator;
mod flight;
pub mod runtime;
mod scheduler;
pub mod status;

pub use self::builder::{BatchProcessorBuilder, BuildError};
pub use self::runtime::BatchProcessor;
pub use self::status::{ProcessorStats, QueueStatus};
