//! Best-effort side effects fired after a successful grade.
//!
//! どちらの port も fire-and-forget で呼ばれます。失敗はログに残るだけで、
//! item の成功/失敗（retry 判定）には一切影響しません。

use async_trait::async_trait;

use crate::domain::{GradeOutcome, SideEffectError, SubmissionPayload};

/// Cache invalidation for derived read models (stats pages, submission details).
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate_student_stats(&self, student_id: &str) -> Result<(), SideEffectError>;

    async fn invalidate_activity_stats(&self, activity_id: &str) -> Result<(), SideEffectError>;

    async fn invalidate_submission_details(&self, grade_id: &str) -> Result<(), SideEffectError>;
}

/// Downstream enrichment (analytics, gradebook sync, rewards, topic mastery).
#[async_trait]
pub trait DownstreamHook: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    async fn on_graded(
        &self,
        payload: &SubmissionPayload,
        outcome: &GradeOutcome,
    ) -> Result<(), SideEffectError>;
}
