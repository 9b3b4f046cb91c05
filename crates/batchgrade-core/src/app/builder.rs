//! BatchProcessorBuilder - サービスの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - SubmissionProcessor が無ければ build() でエラー
//! - ProcessorConfig::validate() も build() 時にチェック
//! - autostart なら build() の時点で scheduler が動き出す（Tokio runtime 内で呼ぶこと）

use std::sync::Arc;

use super::runtime::{BatchProcessor, Shared};
use crate::config::{ConfigError, ProcessorConfig};
use crate::impls::NoopCacheInvalidator;
use crate::ports::{
    CacheInvalidator, Clock, DeadLetterSink, DownstreamHook, SubmissionProcessor, SystemClock,
    UlidGenerator,
};
use crate::worker::ProcessingWorker;

/// # 使用例
/// ```ignore
/// let processor = BatchProcessorBuilder::new()
///     .config(config)
///     .processor(Arc::new(Grader::new(pool)))
///     .cache(Arc::new(RedisInvalidator::new(redis)))
///     .hook(Arc::new(AnalyticsHook::new()))
///     .build()?;
/// ```
pub struct BatchProcessorBuilder {
    config: ProcessorConfig,
    processor: Option<Arc<dyn SubmissionProcessor>>,
    cache: Option<Arc<dyn CacheInvalidator>>,
    hooks: Vec<Arc<dyn DownstreamHook>>,
    dead_letter: Option<Arc<dyn DeadLetterSink>>,
    clock: Option<Arc<dyn Clock>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no SubmissionProcessor was registered")]
    MissingProcessor,

    #[error("invalid processor config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl BatchProcessorBuilder {
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
            processor: None,
            cache: None,
            hooks: Vec::new(),
            dead_letter: None,
            clock: None,
        }
    }

    pub fn config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn processor(mut self, processor: Arc<dyn SubmissionProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Defaults to `NoopCacheInvalidator`.
    pub fn cache(mut self, cache: Arc<dyn CacheInvalidator>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Add a downstream hook. Hooks run in registration order, each in its own task.
    pub fn hook(mut self, hook: Arc<dyn DownstreamHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Without a sink, dropped submissions are only logged.
    pub fn dead_letter(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letter = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<BatchProcessor, BuildError> {
        self.config.validate()?;
        let processor = self.processor.ok_or(BuildError::MissingProcessor)?;

        let cache = self.cache.unwrap_or_else(|| Arc::new(NoopCacheInvalidator));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let worker = ProcessingWorker::new(processor, cache, self.hooks);
        let ids = Box::new(UlidGenerator::new(Arc::clone(&clock)));
        let shared = Shared::new(self.config, worker, ids, clock, self.dead_letter);

        Ok(BatchProcessor::from_shared(shared))
    }
}

impl Default for BatchProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
