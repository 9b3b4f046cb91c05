//! Outcome model: what the grader hands back, and what a flush reports.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ids::{FlushId, QueueId};

/// Result returned by the `SubmissionProcessor` for one submission.
///
/// `success == false` means the grader ran but did not store a grade; the
/// queue treats that exactly like an error and retries the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeOutcome {
    pub success: bool,
    pub grade_id: String,
    pub score: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl GradeOutcome {
    pub fn graded(grade_id: impl Into<String>, score: f64) -> Self {
        Self {
            success: true,
            grade_id: grade_id.into(),
            score,
            max_score: None,
            feedback: None,
        }
    }

    pub fn with_max_score(mut self, max_score: f64) -> Self {
        self.max_score = Some(max_score);
        self
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }
}

/// What started a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushTrigger {
    /// Regular scheduler tick (or `flush_now`).
    Scheduled,
    /// Out-of-cycle run started by `queue_submission`.
    Escalation,
}

/// Summary of one flush run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlushReport {
    pub flush_id: FlushId,
    pub trigger: FlushTrigger,

    /// Items attempted, in selection order.
    pub selected: Vec<QueueId>,

    pub succeeded: Vec<QueueId>,
    pub requeued: Vec<QueueId>,
    pub dropped: Vec<QueueId>,

    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl FlushReport {
    pub fn attempted(&self) -> usize {
        self.selected.len()
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
