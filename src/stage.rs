//! Stage executor: run one agent over one input text.
//!
//! ```text
//! input ──▶ chunk ──▶ [model call per chunk, in order] ──▶ concatenate
//! ```
//!
//! Chunks are processed strictly one after another and the outputs are
//! concatenated in chunk order with nothing added between them. A stage is
//! all-or-nothing: if any chunk fails, the outputs of the chunks before it
//! are dropped and the stage reports the failure.
//!
//! ## Retry Strategy
//!
//! With `max_retries > 0`, a chunk call failing with a retryable
//! [`ModelError`] is repeated after `retry_backoff_ms * 2^(attempt-1)`
//! (or the provider's `Retry-After`, if longer, capped at two minutes).
//! The wait polls the cancel flag, so a stop ends it early. Unauthorized
//! and unknown model errors are never retried.

use crate::agent::Agent;
use crate::cancel::CancelFlag;
use crate::chunker;
use crate::config::PipelineConfig;
use crate::error::{ModelError, PipelineError};
use crate::model::{GenerationRequest, ModelClient, ModelTarget};
use crate::prompts::user_prompt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Result of a stage that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Every chunk succeeded; the concatenated output.
    Completed(String),
    /// A stop was requested before a chunk call started.
    Cancelled,
}

/// Run `agent` over `input`.
///
/// `on_chunk(chunk_index, total_chunks)` is called before each model call.
/// Cancellation is checked before each chunk; an in-flight call is never
/// interrupted.
#[allow(clippy::too_many_arguments)]
pub async fn run_stage(
    client: &dyn ModelClient,
    agent: &Agent,
    stage_index: usize,
    input: &str,
    target: &ModelTarget,
    config: &PipelineConfig,
    cancel: &CancelFlag,
    mut on_chunk: impl FnMut(usize, usize),
) -> Result<StageOutcome, PipelineError> {
    let start = Instant::now();
    let chunks = chunker::chunk(input, config.max_chunk_size);
    let total_chunks = chunks.len();
    debug!(
        "Stage {} '{}': {} chars in {} chunks",
        stage_index + 1,
        agent.name,
        input.chars().count(),
        total_chunks
    );

    let mut output = String::new();
    for (chunk_index, chunk) in chunks.iter().enumerate() {
        if cancel.is_cancelled() {
            return Ok(StageOutcome::Cancelled);
        }
        on_chunk(chunk_index, total_chunks);

        let prompt = user_prompt(&config.task_prefix, chunk);
        let request = GenerationRequest {
            system_prompt: &agent.prompt_template,
            user_prompt: &prompt,
            temperature: agent.temperature,
            target,
        };

        match generate_with_retry(client, &request, config, cancel).await {
            Ok(Some(text)) => output.push_str(&text),
            Ok(None) => return Ok(StageOutcome::Cancelled),
            Err(source) => {
                warn!(
                    "Stage {} '{}': chunk {}/{} failed — {}",
                    stage_index + 1,
                    agent.name,
                    chunk_index + 1,
                    total_chunks,
                    source
                );
                return Err(PipelineError::Model {
                    stage_index,
                    agent: agent.name.clone(),
                    chunk_index,
                    total_chunks,
                    source,
                });
            }
        }
    }

    debug!(
        "Stage {} '{}': {} chars out in {:?}",
        stage_index + 1,
        agent.name,
        output.chars().count(),
        start.elapsed()
    );
    Ok(StageOutcome::Completed(output))
}

/// One chunk call with optional retries. `Ok(None)` means a stop was
/// requested while waiting to retry.
async fn generate_with_retry(
    client: &dyn ModelClient,
    request: &GenerationRequest<'_>,
    config: &PipelineConfig,
    cancel: &CancelFlag,
) -> Result<Option<String>, ModelError> {
    let mut attempt = 0u32;
    loop {
        match client.generate(request).await {
            Ok(text) => return Ok(Some(text)),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                let delay = retry_delay(&e, config, attempt);
                warn!(
                    "{}: retry {}/{} after {:?} — {}",
                    client.name(),
                    attempt,
                    config.max_retries,
                    delay,
                    e
                );
                if !wait_unless_cancelled(delay, cancel).await {
                    return Ok(None);
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Upper bound on a single retry wait, whatever `Retry-After` says.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(120);

/// How often a retry wait re-checks the cancel flag.
const CANCEL_POLL: Duration = Duration::from_millis(100);

fn retry_delay(error: &ModelError, config: &PipelineConfig, attempt: u32) -> Duration {
    let backoff = config.backoff(attempt);
    let delay = match error {
        ModelError::RateLimited {
            retry_after_secs: Some(secs),
            ..
        } => backoff.max(Duration::from_secs(*secs)),
        _ => backoff,
    };
    delay.min(MAX_RETRY_DELAY)
}

/// Sleep for `delay` in short slices. Returns `false` as soon as a stop is
/// requested, including one that arrived before the wait started.
async fn wait_unless_cancelled(delay: Duration, cancel: &CancelFlag) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        sleep(CANCEL_POLL.min(deadline - now)).await;
    }
}
