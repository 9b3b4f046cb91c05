use async_trait::async_trait;

use crate::domain::SideEffectError;
use crate::ports::CacheInvalidator;

/// Cache invalidator for deployments without a cache layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCacheInvalidator;

#[async_trait]
impl CacheInvalidator for NoopCacheInvalidator {
    async fn invalidate_student_stats(&self, _student_id: &str) -> Result<(), SideEffectError> {
        Ok(())
    }

    async fn invalidate_activity_stats(&self, _activity_id: &str) -> Result<(), SideEffectError> {
        Ok(())
    }

    async fn invalidate_submission_details(&self, _grade_id: &str) -> Result<(), SideEffectError> {
        Ok(())
    }
}
