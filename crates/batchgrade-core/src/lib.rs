//! batchgrade-core
//!
//! In-process, priority-aware batch processor for "grade this submission"
//! requests: a bounded queue flushed on a timer in chunked batches, with
//! priority escalation and a bounded retry budget.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, submission, outcome, errors）
//! - **ports**: 抽象化レイヤー（SubmissionProcessor, CacheInvalidator, DownstreamHook, DeadLetterSink, Clock, IdGenerator）
//! - **queue**: SubmissionQueue + QueueItem + RetryPolicy
//! - **worker**: ProcessingWorker（1 件の採点呼び出しと副作用）
//! - **app**: BatchProcessor（scheduler, escalator, status, builder）
//! - **impls**: 開発用の ports 実装
//!
//! # 使用例
//! ```ignore
//! let processor = BatchProcessorBuilder::new()
//!     .processor(Arc::new(MyGrader::new()))
//!     .build()?;
//!
//! let id = processor.queue_submission(
//!     SubmissionRequest::new("activity-1", "student-7", answers).priority(5),
//! )?;
//! println!("{:?}", processor.queue_status());
//! ```

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{BatchProcessor, BatchProcessorBuilder, BuildError, ProcessorStats, QueueStatus};
pub use config::{ConfigError, ProcessorConfig};
pub use domain::{
    FlushReport, FlushTrigger, GradeOutcome, ProcessingError, QueueError, QueueId,
    SubmissionPayload, SubmissionRequest,
};
