//! Domain model (IDs, submission payload, outcomes, errors).

pub mod errors;
pub mod ids;
pub mod outcome;
pub mod submission;

pub use errors::{ProcessingError, QueueError, SideEffectError};
pub use ids::{FlushId, QueueId};
pub use outcome::{FlushReport, FlushTrigger, GradeOutcome};
pub use submission::{DEFAULT_PRIORITY, ProcessOptions, SubmissionPayload, SubmissionRequest};
