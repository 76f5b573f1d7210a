//! Pipeline runner: drive the ordered stages over one evolving text buffer.
//!
//! ```text
//! initial text
//!   │
//!   ├─ preconditions      (nothing is created if they fail)
//!   ├─ RunState::new      one Pending record per core agent
//!   └─ for each stage, strictly in order:
//!        cancelled? ──▶ stop (Cancelled)
//!        Running ──▶ stage::run_stage(current_text)
//!          ├─ Completed(out)  current_text = out, Success, progress
//!          ├─ Cancelled       stop; the stage stays Running
//!          └─ Err(e)          stage Error + " - Failed", stop (Failed)
//!   all stages done ──▶ every step Success, 100 %, final artifact
//! ```
//!
//! ## Why two entry points?
//!
//! [`Pipeline::run`] is a plain `async fn` that reports through a
//! [`ProgressObserver`] reference; it suits CLIs and tests that already own
//! a task. [`Pipeline::spawn`] moves the run onto its own tokio task and
//! hands back a [`RunHandle`] whose update stream carries every
//! [`RunUpdate`] over a channel, so a UI never shares the run state with
//! the runner.
//!
//! ## Retry
//!
//! A failed run comes back as [`RunOutcome::Failed`] carrying a
//! [`RetryHandle`]. Retrying starts again from the original input text with
//! the same agents and model target; progress made by earlier stages is not
//! reused. A run started from a file with [`Pipeline::run_file`] that fails
//! to extract comes back the same way, and its retry extracts the file again.

use crate::agent::{core_agents, Agent};
use crate::cancel::CancelFlag;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PreconditionError};
use crate::extract::extract_file;
use crate::model::{client_for, ModelClient, ModelTarget};
use crate::progress::{ChannelObserver, ProgressObserver, ProgressUpdate, RunUpdate};
use crate::stage::{run_stage, StageOutcome};
use crate::state::{RunState, EXTRACTION_STEP};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

/// Terminal result of a run that passed its preconditions.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every stage succeeded; `state.final_artifact` holds the result.
    Completed(RunState),
    /// A stop was requested. Not an error.
    Cancelled(RunState),
    /// A stage failed; see [`RunFailure`].
    Failed(RunFailure),
}

impl RunOutcome {
    /// The terminal run state, whatever the outcome.
    pub fn state(&self) -> &RunState {
        match self {
            RunOutcome::Completed(state) | RunOutcome::Cancelled(state) => state,
            RunOutcome::Failed(failure) => &failure.state,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled(_))
    }

    /// The final Markdown, only for a completed run.
    pub fn final_artifact(&self) -> Option<&str> {
        match self {
            RunOutcome::Completed(state) => state.final_artifact.as_deref(),
            _ => None,
        }
    }
}

/// A failed run: its state, the classified error and a way to run it again.
#[derive(Debug)]
pub struct RunFailure {
    pub state: RunState,
    pub error: PipelineError,
    pub retry: RetryHandle,
}

/// Re-runs a failed pipeline from the very beginning.
#[derive(Debug, Clone)]
pub struct RetryHandle {
    pipeline: Pipeline,
    agents: Vec<Agent>,
    input: RetryInput,
    target: ModelTarget,
}

/// Where a retried run starts.
#[derive(Debug, Clone)]
enum RetryInput {
    Text(String),
    /// Extraction failed; extract this file again.
    File(PathBuf),
}

impl RetryHandle {
    /// Start a fresh run with the original input, agents and model target.
    pub async fn retry(
        &self,
        cancel: &CancelFlag,
        observer: &dyn ProgressObserver,
    ) -> Result<RunOutcome, PipelineError> {
        match &self.input {
            RetryInput::Text(text) => {
                info!("Retrying run from the original input");
                self.pipeline
                    .run(&self.agents, text, &self.target, cancel, observer)
                    .await
            }
            RetryInput::File(path) => {
                info!("Retrying extraction of {}", path.display());
                self.pipeline
                    .run_file(path, &self.agents, &self.target, cancel, observer)
                    .await
            }
        }
    }

    /// The text the retried run will start from, if extraction succeeded.
    pub fn initial_text(&self) -> Option<&str> {
        match &self.input {
            RetryInput::Text(text) => Some(text),
            RetryInput::File(_) => None,
        }
    }

    /// The file the retried run will extract again, if extraction failed.
    pub fn source_file(&self) -> Option<&Path> {
        match &self.input {
            RetryInput::File(path) => Some(path),
            RetryInput::Text(_) => None,
        }
    }
}

/// Runs agent chains. Cheap to clone; holds only configuration.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the core agents of `agents`, in order, over `initial_text`.
    ///
    /// # Errors
    /// Returns `Err` only when the run cannot start: a precondition is
    /// violated or no model client can be built. Stage failures are reported
    /// as [`RunOutcome::Failed`] so the caller gets the run state and a
    /// [`RetryHandle`] along with the error.
    pub async fn run(
        &self,
        agents: &[Agent],
        initial_text: &str,
        target: &ModelTarget,
        cancel: &CancelFlag,
        observer: &dyn ProgressObserver,
    ) -> Result<RunOutcome, PipelineError> {
        let stages = check_preconditions(agents, initial_text, target)?;
        let client = self.resolve_client(target)?;

        let total = stages.len();
        let start = Instant::now();
        info!(
            "Starting run: {} stages over {} chars with {} '{}'",
            total,
            initial_text.chars().count(),
            target.provider,
            target.model
        );

        let mut state = RunState::new(&stages, initial_text);
        observer.on_run_start(total);
        observer.on_state(&state);

        for (index, agent) in stages.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(finish_cancelled(state, observer));
            }

            state.mark_running(index);
            observer.on_state(&state);
            let percent = state.progress_percent;
            observer.on_progress(&ProgressUpdate::stage(index, &agent.name, percent));
            debug!("Stage {}/{} '{}' started", index + 1, total, agent.name);

            let result = run_stage(
                client.as_ref(),
                agent,
                index,
                &state.current_text,
                target,
                &self.config,
                cancel,
                |chunk_index, total_chunks| {
                    observer.on_progress(&ProgressUpdate::chunk(
                        index,
                        &agent.name,
                        chunk_index,
                        total_chunks,
                        percent,
                    ))
                },
            )
            .await;

            match result {
                Ok(StageOutcome::Completed(output)) => {
                    // A stop requested while the last call was in flight wins
                    // over its result.
                    if cancel.is_cancelled() {
                        return Ok(finish_cancelled(state, observer));
                    }
                    state.mark_success(index, output);
                    observer.on_state(&state);
                    observer.on_progress(&ProgressUpdate::stage(
                        index,
                        &agent.name,
                        state.progress_percent,
                    ));
                    debug!(
                        "Stage {}/{} '{}' done ({}%)",
                        index + 1,
                        total,
                        agent.name,
                        state.progress_percent
                    );
                }
                Ok(StageOutcome::Cancelled) => {
                    return Ok(finish_cancelled(state, observer));
                }
                Err(error) if cancel.is_cancelled() => {
                    debug!("Discarding error raised after cancellation: {}", error);
                    return Ok(finish_cancelled(state, observer));
                }
                Err(error) => {
                    state.mark_error(index);
                    observer.on_state(&state);
                    observer.on_stage_error(index, &agent.name, &error.to_string());
                    observer.on_run_finish(&state);
                    warn!("Run failed after {:?}: {}", start.elapsed(), error);
                    return Ok(RunOutcome::Failed(RunFailure {
                        state,
                        error,
                        retry: RetryHandle {
                            pipeline: self.clone(),
                            agents: agents.to_vec(),
                            input: RetryInput::Text(initial_text.to_string()),
                            target: target.clone(),
                        },
                    }));
                }
            }
        }

        state.mark_completed();
        observer.on_state(&state);
        if let Some(last) = stages.last() {
            observer.on_progress(&ProgressUpdate::stage(total - 1, &last.name, 100));
        }
        observer.on_run_finish(&state);
        info!(
            "Run completed in {:?}: {} chars of Markdown",
            start.elapsed(),
            state.current_text.chars().count()
        );
        Ok(RunOutcome::Completed(state))
    }

    /// Extract the text of `input`, then [`run`](Self::run) over it.
    ///
    /// A file that cannot be read comes back as [`RunOutcome::Failed`] with a
    /// single failed extraction step; its [`RetryHandle`] extracts the same
    /// path again.
    ///
    /// # Errors
    /// As for [`run`](Self::run), once the text is extracted.
    pub async fn run_file(
        &self,
        input: &Path,
        agents: &[Agent],
        target: &ModelTarget,
        cancel: &CancelFlag,
        observer: &dyn ProgressObserver,
    ) -> Result<RunOutcome, PipelineError> {
        let text = match extract_file(input).await {
            Ok(text) => text,
            Err(e) => {
                let error = PipelineError::Extraction(e);
                let state = RunState::extraction_failed();
                observer.on_state(&state);
                observer.on_stage_error(0, EXTRACTION_STEP, &error.to_string());
                observer.on_run_finish(&state);
                warn!("Extraction of {} failed: {}", input.display(), error);
                return Ok(RunOutcome::Failed(RunFailure {
                    state,
                    error,
                    retry: RetryHandle {
                        pipeline: self.clone(),
                        agents: agents.to_vec(),
                        input: RetryInput::File(input.to_path_buf()),
                        target: target.clone(),
                    },
                }));
            }
        };
        self.run(agents, &text, target, cancel, observer).await
    }

    /// Run on a new tokio task and stream its updates.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, agents: Vec<Agent>, initial_text: String, target: ModelTarget) -> RunHandle {
        let (observer, rx) = ChannelObserver::channel();
        let cancel = CancelFlag::new();
        let pipeline = self.clone();
        let task_cancel = cancel.clone();
        let join = tokio::spawn(async move {
            pipeline
                .run(&agents, &initial_text, &target, &task_cancel, &observer)
                .await
        });
        RunHandle {
            updates: UnboundedReceiverStream::new(rx),
            cancel,
            join,
        }
    }

    fn resolve_client(&self, target: &ModelTarget) -> Result<Arc<dyn ModelClient>, PipelineError> {
        match &self.config.client {
            Some(client) => Ok(Arc::clone(client)),
            None => client_for(target, self.config.api_timeout())
                .map_err(|e| PipelineError::InvalidConfig(e.to_string())),
        }
    }
}

/// A run executing on its own task.
///
/// The update stream ends when the run finishes; await [`RunHandle::outcome`]
/// for the terminal result.
pub struct RunHandle {
    updates: UnboundedReceiverStream<RunUpdate>,
    cancel: CancelFlag,
    join: JoinHandle<Result<RunOutcome, PipelineError>>,
}

impl RunHandle {
    pub fn updates(&mut self) -> &mut UnboundedReceiverStream<RunUpdate> {
        &mut self.updates
    }

    /// Request a cooperative stop.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Wait for the run to end.
    pub async fn outcome(self) -> Result<RunOutcome, PipelineError> {
        self.join
            .await
            .map_err(|e| PipelineError::Internal(format!("run task failed: {e}")))?
    }
}

/// Validate inputs and select the stages; nothing is mutated on failure.
fn check_preconditions(
    agents: &[Agent],
    initial_text: &str,
    target: &ModelTarget,
) -> Result<Vec<Agent>, PreconditionError> {
    if initial_text.trim().is_empty() {
        return Err(PreconditionError::EmptyInput);
    }
    let stages = core_agents(agents);
    if stages.is_empty() {
        return Err(PreconditionError::NoCoreAgents);
    }
    if !target.has_credential() {
        return Err(PreconditionError::MissingCredential {
            model: target.model.clone(),
        });
    }
    for agent in &stages {
        agent.check_temperature()?;
    }
    Ok(stages)
}

fn finish_cancelled(mut state: RunState, observer: &dyn ProgressObserver) -> RunOutcome {
    state.mark_cancelled();
    observer.on_state(&state);
    observer.on_run_finish(&state);
    info!(
        "Run cancelled at stage {}/{}",
        state.current_stage_index + 1,
        state.stage_count()
    );
    RunOutcome::Cancelled(state)
}
