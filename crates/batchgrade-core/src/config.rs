//! Processor configuration.
//!
//! Every field has a default, so an empty TOML table (or `ProcessorConfig::default()`)
//! gives the stock behaviour. `validate()` runs at build time.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::queue::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Max items taken by one scheduled flush.
    pub batch_size: usize,

    pub processing_interval_ms: u64,

    /// Total attempts per item, including the first.
    pub max_retries: u32,

    pub max_queue_size: usize,

    /// Queue length at which an enqueue triggers escalation.
    pub priority_threshold: usize,

    /// Max concurrent processor calls.
    pub chunk_size: usize,

    pub escalation_batch_size: usize,

    /// Tick interval used once when escalation finds a flush already running.
    pub expedited_interval_ms: u64,

    /// Start the scheduler as soon as the processor is built.
    pub autostart: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            processing_interval_ms: 1000,
            max_retries: 3,
            max_queue_size: 50_000,
            priority_threshold: 20,
            chunk_size: 50,
            escalation_batch_size: 20,
            expedited_interval_ms: 500,
            autostart: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error(
        "expedited_interval_ms ({expedited}) must not exceed processing_interval_ms ({interval})"
    )]
    ExpeditedSlowerThanInterval { expedited: u64, interval: u64 },
}

impl ProcessorConfig {
    pub fn processing_interval(&self) -> Duration {
        Duration::from_millis(self.processing_interval_ms)
    }

    pub fn expedited_interval(&self) -> Duration {
        Duration::from_millis(self.expedited_interval_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("batch_size", self.batch_size as u64),
            ("processing_interval_ms", self.processing_interval_ms),
            ("max_retries", self.max_retries as u64),
            ("max_queue_size", self.max_queue_size as u64),
            ("chunk_size", self.chunk_size as u64),
            ("escalation_batch_size", self.escalation_batch_size as u64),
            ("expedited_interval_ms", self.expedited_interval_ms),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Zero(*name));
        }
        if self.expedited_interval_ms > self.processing_interval_ms {
            return Err(ConfigError::ExpeditedSlowerThanInterval {
                expedited: self.expedited_interval_ms,
                interval: self.processing_interval_ms,
            });
        }
        Ok(())
    }
}
