//! SubmissionProcessor port - 採点と永続化を行う外部コラボレータ
//!
//! キューから見ると不透明な async 呼び出しで、`Err` は「この item を retry」を意味します。
//! タイムアウトが必要なら実装側で持つこと（キュー層には item 単位の timeout はない）。

use async_trait::async_trait;

use crate::domain::{GradeOutcome, ProcessingError, SubmissionPayload};

/// Grades one submission and stores the grade.
///
/// # 使用例
/// ```ignore
/// struct Grader { db: PgPool }
///
/// #[async_trait]
/// impl SubmissionProcessor for Grader {
///     async fn process(&self, payload: &SubmissionPayload) -> Result<GradeOutcome, ProcessingError> {
///         let score = score_answers(&payload.answers)?;
///         let grade_id = self.db.insert_grade(&payload.student_id, score).await?;
///         Ok(GradeOutcome::graded(grade_id, score))
///     }
/// }
/// ```
#[async_trait]
pub trait SubmissionProcessor: Send + Sync {
    async fn process(&self, payload: &SubmissionPayload) -> Result<GradeOutcome, ProcessingError>;
}
