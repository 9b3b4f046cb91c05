use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use tokio::time::sleep;

use batchgrade_core::domain::{GradeOutcome, ProcessingError, SideEffectError, SubmissionPayload};
use batchgrade_core::impls::InMemoryDeadLetterSink;
use batchgrade_core::ports::{DownstreamHook, SubmissionProcessor};
use batchgrade_core::{BatchProcessorBuilder, ProcessorConfig, QueueError, SubmissionRequest};

#[derive(Parser)]
#[command(
    name = "batchgrade",
    about = "Demo driver for the submission batch processor",
    version,
    long_about = None
)]
struct Cli {
    /// TOML file with a ProcessorConfig (missing keys fall back to defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of submissions to enqueue
    #[arg(long, default_value = "60")]
    submissions: usize,

    /// Every Nth submission is enqueued with priority 5
    #[arg(long, default_value = "10")]
    high_priority_every: usize,

    /// Every Nth activity fails its first N attempts (0 disables failures)
    #[arg(long, default_value = "7")]
    flaky_every: usize,

    /// How many attempts a flaky activity fails before it succeeds
    #[arg(long, default_value = "1")]
    flaky_failures: u32,
}

/// Simulated grader: one point per answered question, some activities flaky.
struct DemoGrader {
    flaky_every: usize,
    flaky_failures: u32,
    attempts: Mutex<HashMap<String, u32>>,
}

impl DemoGrader {
    fn new(flaky_every: usize, flaky_failures: u32) -> Self {
        Self {
            flaky_every,
            flaky_failures,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn is_flaky(&self, activity_id: &str) -> bool {
        let Some(n) = activity_id
            .rsplit('-')
            .next()
            .and_then(|s| s.parse::<usize>().ok())
        else {
            return false;
        };
        self.flaky_every > 0 && n % self.flaky_every == 0
    }
}

#[async_trait]
impl SubmissionProcessor for DemoGrader {
    async fn process(&self, payload: &SubmissionPayload) -> Result<GradeOutcome, ProcessingError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
            let n = attempts.entry(payload.activity_id.clone()).or_insert(0);
            *n += 1;
            *n
        };

        // DB 書き込みっぽい待ち
        sleep(Duration::from_millis(20 + (attempt as u64 * 5))).await;

        if self.is_flaky(&payload.activity_id) && attempt <= self.flaky_failures {
            return Err(ProcessingError::failed(format!(
                "deadlock detected while storing grade (attempt {attempt})"
            )));
        }

        let answered = payload.answers.as_object().map_or(0, |m| m.len()) as f64;
        Ok(GradeOutcome::graded(
            format!("grade-{}-{}", payload.activity_id, payload.student_id),
            answered,
        )
        .with_max_score(3.0))
    }
}

/// Stand-in for the analytics service.
struct AnalyticsLogHook;

#[async_trait]
impl DownstreamHook for AnalyticsLogHook {
    fn name(&self) -> &str {
        "analytics"
    }

    async fn on_graded(
        &self,
        payload: &SubmissionPayload,
        outcome: &GradeOutcome,
    ) -> Result<(), SideEffectError> {
        tracing::debug!(
            activity_id = %payload.activity_id,
            grade_id = %outcome.grade_id,
            score = outcome.score,
            "analytics event recorded"
        );
        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> Result<ProcessorConfig> {
    let Some(path) = path else {
        return Ok(ProcessorConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config: ProcessorConfig =
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    tracing::info!(?config, "starting batch processor");

    let dead_letters = Arc::new(InMemoryDeadLetterSink::new());
    let processor = BatchProcessorBuilder::new()
        .config(config)
        .processor(Arc::new(DemoGrader::new(cli.flaky_every, cli.flaky_failures)))
        .hook(Arc::new(AnalyticsLogHook))
        .dead_letter(dead_letters.clone())
        .build()?;

    for i in 0..cli.submissions {
        let priority = if cli.high_priority_every > 0 && i % cli.high_priority_every == 0 {
            5
        } else {
            1
        };
        let answers = serde_json::json!({ "q1": "a", "q2": "c", "q3": i % 4 });
        let request =
            SubmissionRequest::new(format!("activity-{i}"), format!("student-{}", i % 7), answers)
                .priority(priority)
                .time_spent_minutes((i % 30) as u32);

        match processor.queue_submission(request) {
            Ok(id) => tracing::debug!(queue_id = %id, priority, "queued"),
            // 本番ならここで同期処理にフォールバックする
            Err(QueueError::CapacityExceeded { capacity }) => {
                tracing::warn!(capacity, "queue full, submission would be graded inline");
            }
            Err(err) => return Err(err.into()),
        }
    }

    // 完了をポーリングで待つ
    loop {
        let status = processor.queue_status();
        println!(
            "queue_length={} processing={} high_priority={}",
            status.queue_length, status.processing, status.high_priority_count
        );
        if status.queue_length == 0 && !status.processing {
            break;
        }
        tokio::select! {
            _ = sleep(Duration::from_millis(500)) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("interrupted, stopping with items still queued");
                break;
            }
        }
    }

    processor.shutdown().await;

    let stats = processor.stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    for letter in dead_letters.drain() {
        println!(
            "dead letter: {} activity={} attempts={} error={}",
            letter.id, letter.payload.activity_id, letter.attempts, letter.last_error
        );
    }
    Ok(())
}
