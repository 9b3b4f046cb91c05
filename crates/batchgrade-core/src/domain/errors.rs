//! Errors - エラー型と分類
//!
//! - `QueueError`: backpressure など enqueue 時点で呼び出し側に返すもの
//! - `ProcessingError`: grader の失敗（retry の対象）
//! - `SideEffectError`: cache invalidation / downstream hook の失敗（ログのみ）

use thiserror::Error;

use super::ids::QueueId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue is full. The caller must fall back (process inline, or reject).
    #[error("submission queue is full (capacity={capacity})")]
    CapacityExceeded { capacity: usize },

    #[error("queue id already present: {0}")]
    DuplicateId(QueueId),
}

/// Failure reported by the submission processor. Every variant is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessingError {
    #[error("submission processing failed: {0}")]
    Failed(String),

    /// The grader returned an outcome with `success == false`.
    #[error("grader rejected submission: {0}")]
    Rejected(String),
}

impl ProcessingError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{effect} failed: {message}")]
pub struct SideEffectError {
    pub effect: String,
    pub message: String,
}

impl SideEffectError {
    pub fn new(effect: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            effect: effect.into(),
            message: message.into(),
        }
    }
}
