//! Submission payload: what the caller asks us to grade.
//!
//! The queue never looks inside the payload. Only the `SubmissionProcessor`
//! and the best-effort side effects interpret it.

use serde::{Deserialize, Serialize};

/// Lowest (and default) priority. Anything above this counts as high priority.
pub const DEFAULT_PRIORITY: u32 = 1;

/// Free-form processing options forwarded to the grader (e.g. `{"partialCredit": true}`).
pub type ProcessOptions = serde_json::Map<String, serde_json::Value>;

/// The opaque unit of work carried by a `QueueItem`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub activity_id: String,
    pub student_id: String,

    /// Submitted answers, shape defined by the activity.
    pub answers: serde_json::Value,

    /// Result the client already computed, if any (the grader may trust or re-check it).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ProcessOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_minutes: Option<u32>,
}

/// Argument bundle for `BatchProcessor::queue_submission`.
///
/// # 使用例
/// ```ignore
/// let request = SubmissionRequest::new("act-1", "stu-9", json!({"q1": "b"}))
///     .priority(5)
///     .time_spent_minutes(12);
/// let id = processor.queue_submission(request)?;
/// ```
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub(crate) payload: SubmissionPayload,
    pub(crate) priority: u32,
}

impl SubmissionRequest {
    pub fn new(
        activity_id: impl Into<String>,
        student_id: impl Into<String>,
        answers: serde_json::Value,
    ) -> Self {
        Self {
            payload: SubmissionPayload {
                activity_id: activity_id.into(),
                student_id: student_id.into(),
                answers,
                client_result: None,
                options: None,
                time_spent_minutes: None,
            },
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn client_result(mut self, result: serde_json::Value) -> Self {
        self.payload.client_result = Some(result);
        self
    }

    pub fn options(mut self, options: ProcessOptions) -> Self {
        self.payload.options = Some(options);
        self
    }

    /// Priority 0 is treated as the default priority.
    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority.max(DEFAULT_PRIORITY);
        self
    }

    pub fn time_spent_minutes(mut self, minutes: u32) -> Self {
        self.payload.time_spent_minutes = Some(minutes);
        self
    }

    pub fn payload(&self) -> &SubmissionPayload {
        &self.payload
    }

    pub fn is_high_priority(&self) -> bool {
        self.priority > DEFAULT_PRIORITY
    }
}
