//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;

use crate::domain::{GradeOutcome, ProcessingError, QueueId, SideEffectError, SubmissionPayload};
use crate::ports::{CacheInvalidator, DownstreamHook, SubmissionProcessor};
use crate::queue::QueueItem;

pub(crate) fn payload(activity_id: &str) -> SubmissionPayload {
    SubmissionPayload {
        activity_id: activity_id.to_string(),
        student_id: "stu-1".to_string(),
        answers: serde_json::json!({"q1": "a"}),
        client_result: None,
        options: None,
        time_spent_minutes: None,
    }
}

pub(crate) fn item(activity_id: &str, priority: u32) -> QueueItem {
    QueueItem::new(QueueId::generate(), payload(activity_id), priority, Utc::now(), 0)
}

#[derive(Debug, Clone, Copy)]
enum Script {
    FailTimes(u32),
    FailAlways,
    Reject,
    PanicOnce,
}

/// Processor whose behaviour is scripted per `activity_id`.
///
/// Unscripted activities succeed. With a gate, every call waits for a permit
/// from `release()` before answering.
pub(crate) struct ScriptedProcessor {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedProcessor {
    pub(crate) fn always_ok() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay: None,
            gate: None,
        }
    }

    pub(crate) fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::always_ok()
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn script(self, activity_id: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(activity_id.to_string(), script);
        self
    }

    pub(crate) fn fail_times(self, activity_id: &str, n: u32) -> Self {
        self.script(activity_id, Script::FailTimes(n))
    }

    pub(crate) fn fail_always(self, activity_id: &str) -> Self {
        self.script(activity_id, Script::FailAlways)
    }

    pub(crate) fn reject(self, activity_id: &str) -> Self {
        self.script(activity_id, Script::Reject)
    }

    /// The first call for `activity_id` panics; later calls succeed.
    pub(crate) fn panic_once(self, activity_id: &str) -> Self {
        self.script(activity_id, Script::PanicOnce)
    }

    pub(crate) fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_for(&self, activity_id: &str) -> usize {
        self.calls().iter().filter(|a| *a == activity_id).count()
    }

    pub(crate) fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubmissionProcessor for ScriptedProcessor {
    async fn process(&self, payload: &SubmissionPayload) -> Result<GradeOutcome, ProcessingError> {
        let activity = payload.activity_id.clone();
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(activity.clone());
            calls.iter().filter(|a| **a == activity).count() as u32
        };
        let script = self.scripts.lock().unwrap().get(&activity).copied();
        if matches!(script, Some(Script::PanicOnce)) && attempt == 1 {
            panic!("{activity} exploded");
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.lock().unwrap().push(activity.clone());

        match script {
            Some(Script::FailAlways) => Err(ProcessingError::failed(format!("{activity} failed"))),
            Some(Script::FailTimes(n)) if attempt <= n => {
                Err(ProcessingError::failed(format!("{activity} attempt {attempt} failed")))
            }
            Some(Script::Reject) => Ok(GradeOutcome {
                success: false,
                ..GradeOutcome::graded(format!("grade-{activity}"), 0.0)
            }),
            _ => Ok(GradeOutcome::graded(format!("grade-{activity}"), 1.0)),
        }
    }
}

pub(crate) struct FailingCache;

#[async_trait]
impl CacheInvalidator for FailingCache {
    async fn invalidate_student_stats(&self, _student_id: &str) -> Result<(), SideEffectError> {
        Err(SideEffectError::new("invalidate_student_stats", "cache offline"))
    }

    async fn invalidate_activity_stats(&self, _activity_id: &str) -> Result<(), SideEffectError> {
        Err(SideEffectError::new("invalidate_activity_stats", "cache offline"))
    }

    async fn invalidate_submission_details(&self, _grade_id: &str) -> Result<(), SideEffectError> {
        Err(SideEffectError::new("invalidate_submission_details", "cache offline"))
    }
}

pub(crate) struct RecordingHook {
    name: String,
    fail: bool,
    calls: AtomicUsize,
}

impl RecordingHook {
    pub(crate) fn ok(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::ok(name)
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DownstreamHook for RecordingHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_graded(
        &self,
        _payload: &SubmissionPayload,
        _outcome: &GradeOutcome,
    ) -> Result<(), SideEffectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SideEffectError::new(&self.name, "service unavailable"));
        }
        Ok(())
    }
}

/// Poll `cond` until it holds, yielding to other tasks in between.
pub(crate) async fn wait_until<F: Fn() -> bool>(cond: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
