//! Observable run state: one record per stage plus the run-level buffer.
//!
//! ```text
//! stage:  Pending ──▶ Running ──▶ Success
//!                           └───▶ Error
//! run:    NotStarted ──▶ Running ──▶ Completed | Cancelled | Failed
//! ```
//!
//! A [`RunState`] is owned by the runner for one run. Observers only ever
//! see clones.

use crate::agent::Agent;
use serde::{Deserialize, Serialize};

/// Appended to a stage message when the stage fails.
pub const FAILED_SUFFIX: &str = " - Failed";

/// Name of the step reported when a document cannot be read.
pub const EXTRACTION_STEP: &str = "Text extraction";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    NotStarted,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Cancelled | RunStatus::Failed
        )
    }
}

/// Progress record for one stage of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRunRecord {
    pub agent_id: u32,
    pub agent_name: String,
    pub status: StageStatus,
    pub display_message: String,
}

impl StageRunRecord {
    fn pending(agent: &Agent) -> Self {
        Self {
            agent_id: agent.id,
            agent_name: agent.name.clone(),
            status: StageStatus::Pending,
            display_message: agent.name.clone(),
        }
    }
}

/// State of one run. `steps` is fixed in length and order once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub status: RunStatus,
    pub steps: Vec<StageRunRecord>,
    pub current_stage_index: usize,
    pub progress_percent: u8,
    /// Output of the last successful stage (the input text before any).
    pub current_text: String,
    /// Set only on uncancelled, error-free completion.
    pub final_artifact: Option<String>,
    pub cancelled: bool,
}

impl RunState {
    /// One `Pending` record per agent, in agent order.
    pub fn new(agents: &[Agent], initial_text: &str) -> Self {
        Self {
            status: RunStatus::NotStarted,
            steps: agents.iter().map(StageRunRecord::pending).collect(),
            current_stage_index: 0,
            progress_percent: 0,
            current_text: initial_text.to_string(),
            final_artifact: None,
            cancelled: false,
        }
    }

    /// Terminal state of a run whose document could not be read: one
    /// extraction step, marked failed.
    pub(crate) fn extraction_failed() -> Self {
        let mut state = Self {
            status: RunStatus::Running,
            steps: vec![StageRunRecord {
                agent_id: 0,
                agent_name: EXTRACTION_STEP.to_string(),
                status: StageStatus::Running,
                display_message: EXTRACTION_STEP.to_string(),
            }],
            current_stage_index: 0,
            progress_percent: 0,
            current_text: String::new(),
            final_artifact: None,
            cancelled: false,
        };
        state.mark_error(0);
        state
    }

    pub fn stage_count(&self) -> usize {
        self.steps.len()
    }

    pub(crate) fn mark_running(&mut self, index: usize) {
        self.status = RunStatus::Running;
        self.current_stage_index = index;
        self.steps[index].status = StageStatus::Running;
    }

    /// Record a finished stage: its output becomes the current text.
    pub(crate) fn mark_success(&mut self, index: usize, output: String) {
        self.steps[index].status = StageStatus::Success;
        self.current_text = output;
        // 100 is reserved for mark_completed.
        self.progress_percent = stage_progress(index + 1, self.stage_count()).min(99);
    }

    pub(crate) fn mark_error(&mut self, index: usize) {
        let step = &mut self.steps[index];
        step.status = StageStatus::Error;
        if !step.display_message.ends_with(FAILED_SUFFIX) {
            step.display_message.push_str(FAILED_SUFFIX);
        }
        self.status = RunStatus::Failed;
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
        self.status = RunStatus::Cancelled;
    }

    pub(crate) fn mark_completed(&mut self) {
        for step in &mut self.steps {
            step.status = StageStatus::Success;
        }
        self.progress_percent = 100;
        self.final_artifact = Some(self.current_text.clone());
        self.status = RunStatus::Completed;
    }
}

/// `round(done / total * 100)`, held at 99 until every stage is done.
pub fn stage_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    if done >= total {
        return 100;
    }
    let percent = (done as f64 / total as f64 * 100.0).round() as u8;
    percent.min(99)
}
