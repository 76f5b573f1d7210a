//! Progress observation for pipeline runs.
//!
//! Inject an [`Arc<dyn ProgressObserver>`] into a run to receive events as
//! the runner moves through stages and chunks. Every method has a no-op
//! default, so implementors only override what they render.
//!
//! Two ready-made observers exist:
//!
//! * [`NoopObserver`] — the default when nothing is attached.
//! * [`ChannelObserver`] — forwards [`RunUpdate`]s over a tokio channel; this
//!   is what [`crate::runner::Pipeline::spawn`] uses to expose a stream.
//!
//! # Example
//!
//! ```rust
//! use autonotes::progress::{ProgressObserver, ProgressUpdate};
//! use std::sync::atomic::{AtomicU8, Ordering};
//!
//! struct Percent(AtomicU8);
//!
//! impl ProgressObserver for Percent {
//!     fn on_progress(&self, update: &ProgressUpdate) {
//!         self.0.store(update.overall_percent, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::state::RunState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A snapshot of where the run is, suitable for a progress bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// 0-based stage index.
    pub stage_index: usize,
    /// e.g. `"Harmonizer (chunk 2/5)"`.
    pub stage_message: String,
    /// 0-based chunk index, when a chunk is being processed.
    pub chunk_index: Option<usize>,
    pub total_chunks: Option<usize>,
    pub overall_percent: u8,
}

impl ProgressUpdate {
    pub fn stage(stage_index: usize, agent_name: &str, overall_percent: u8) -> Self {
        Self {
            stage_index,
            stage_message: agent_name.to_string(),
            chunk_index: None,
            total_chunks: None,
            overall_percent,
        }
    }

    pub fn chunk(
        stage_index: usize,
        agent_name: &str,
        chunk_index: usize,
        total_chunks: usize,
        overall_percent: u8,
    ) -> Self {
        Self {
            stage_index,
            stage_message: format!("{agent_name} (chunk {}/{total_chunks})", chunk_index + 1),
            chunk_index: Some(chunk_index),
            total_chunks: Some(total_chunks),
            overall_percent,
        }
    }
}

/// Receives run events. Implementations must be `Send + Sync`.
///
/// Events of one run arrive sequentially from a single task, in order.
pub trait ProgressObserver: Send + Sync {
    /// Called once, after preconditions pass and before the first stage.
    fn on_run_start(&self, total_stages: usize) {
        let _ = total_stages;
    }

    /// Called whenever the visible progress changes (stage start, chunk
    /// start, stage completion).
    fn on_progress(&self, update: &ProgressUpdate) {
        let _ = update;
    }

    /// Called after every mutation of the run state with a read-only view.
    fn on_state(&self, state: &RunState) {
        let _ = state;
    }

    /// Called when a stage fails; `error` is human-readable.
    fn on_stage_error(&self, stage_index: usize, agent_name: &str, error: &str) {
        let _ = (stage_index, agent_name, error);
    }

    /// Called once with the terminal state.
    fn on_run_finish(&self, state: &RunState) {
        let _ = state;
    }
}

pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Convenience alias for the shared observer handle.
pub type Observer = Arc<dyn ProgressObserver>;

/// Messages emitted by [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum RunUpdate {
    /// The run passed its checks and will go through this many stages.
    Started { total_stages: usize },
    Progress(ProgressUpdate),
    State(RunState),
    StageError {
        stage_index: usize,
        agent_name: String,
        error: String,
    },
    Finished(RunState),
}

/// Forwards every event as a [`RunUpdate`] message.
///
/// Sends never block; updates are dropped silently once the receiver is gone.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<RunUpdate>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<RunUpdate>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RunUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, update: RunUpdate) {
        let _ = self.tx.send(update);
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_run_start(&self, total_stages: usize) {
        self.send(RunUpdate::Started { total_stages });
    }

    fn on_progress(&self, update: &ProgressUpdate) {
        self.send(RunUpdate::Progress(update.clone()));
    }

    fn on_state(&self, state: &RunState) {
        self.send(RunUpdate::State(state.clone()));
    }

    fn on_stage_error(&self, stage_index: usize, agent_name: &str, error: &str) {
        self.send(RunUpdate::StageError {
            stage_index,
            agent_name: agent_name.to_string(),
            error: error.to_string(),
        });
    }

    fn on_run_finish(&self, state: &RunState) {
        self.send(RunUpdate::Finished(state.clone()));
    }
}
