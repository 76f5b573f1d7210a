//! Configuration for pipeline runs.
//!
//! Every engine knob lives in [`PipelineConfig`], built via
//! [`PipelineConfig::builder`]. The agent list and model target are *not*
//! part of it: they come from the configuration store and are passed per
//! run, because a run treats them as immutable input.

use crate::chunker::DEFAULT_MAX_CHUNK_SIZE;
use crate::error::PipelineError;
use crate::model::ModelClient;
use crate::prompts::DEFAULT_TASK_PREFIX;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Engine configuration shared by every run of a [`crate::runner::Pipeline`].
///
/// # Example
/// ```rust
/// use autonotes::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .max_chunk_size(8_000)
///     .max_retries(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_chunk_size, 8_000);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Target chunk size in characters. Default: 15 000.
    ///
    /// Large enough to amortise per-call overhead, small enough to stay under
    /// common provider context and output limits. A single logical block
    /// longer than this is still sent whole.
    pub max_chunk_size: usize,

    /// First line of every user message; the chunk follows on the next line.
    /// Default: `"Text to process:"`.
    pub task_prefix: String,

    /// Extra attempts for a chunk call that fails with a retryable
    /// [`crate::error::ModelError`]. Default: 0 (fail the stage at once).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per model call timeout in seconds. Default: 300.
    pub api_timeout_secs: u64,

    /// Pre-constructed model client. Takes precedence over the client
    /// resolved from the run's [`crate::model::ModelTarget`].
    pub client: Option<Arc<dyn ModelClient>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            task_prefix: DEFAULT_TASK_PREFIX.to_string(),
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: 300,
            client: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("max_chunk_size", &self.max_chunk_size)
            .field("task_prefix", &self.task_prefix)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("client", &self.client.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn max_chunk_size(mut self, chars: usize) -> Self {
        self.config.max_chunk_size = chars;
        self
    }

    pub fn task_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.task_prefix = prefix.into();
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.max_chunk_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "max chunk size must be ≥ 1 character".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_chunk_size, 15_000);
        assert_eq!(config.task_prefix, "Text to process:");
        assert_eq!(config.max_retries, 0);
        assert!(config.client.is_none());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = PipelineConfig::builder().max_chunk_size(0).build().unwrap_err();
        assert!(err.to_string().contains("chunk size"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(PipelineConfig::builder().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn backoff_doubles() {
        let config = PipelineConfig::builder().retry_backoff_ms(100).build().unwrap();
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert_eq!(config.backoff(3), Duration::from_millis(400));
    }
}
