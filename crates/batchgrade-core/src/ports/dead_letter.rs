//! DeadLetterSink port - retry を使い切った item の行き先
//!
//! 設定しなければ、drop された item は error ログに残るだけです。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{QueueId, SubmissionPayload};

/// A permanently failed submission, with enough context to replay it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub id: QueueId,
    pub payload: SubmissionPayload,
    pub priority: u32,
    pub attempts: u32,
    pub last_error: String,
    pub enqueued_at: DateTime<Utc>,
    pub dropped_at: DateTime<Utc>,
}

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn record(&self, letter: DeadLetter);
}
