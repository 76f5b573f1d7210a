//! File-level entry points: document in, Markdown out.
//!
//! ## Why a separate layer?
//!
//! [`Pipeline::run`] works on text that is already in memory. Most callers
//! start from a file on disk and end with a file on disk; this module glues
//! [`crate::extract`] in front of the runner and an atomic write behind it.

use crate::agent::Agent;
use crate::cancel::CancelFlag;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::model::ModelTarget;
use crate::progress::ProgressObserver;
use crate::runner::{Pipeline, RunOutcome};
use std::path::Path;
use tracing::info;

/// Extract the text of `input` and run `agents` over it.
///
/// Only the core agents of `agents` run, in order. See [`Pipeline::run_file`].
///
/// # Errors
/// Precondition violations are returned as `Err`. Extraction and stage
/// failures come back as [`RunOutcome::Failed`] with a retry handle.
pub async fn convert_file(
    input: impl AsRef<Path>,
    agents: &[Agent],
    target: &ModelTarget,
    config: &PipelineConfig,
    cancel: &CancelFlag,
    observer: &dyn ProgressObserver,
) -> Result<RunOutcome, PipelineError> {
    let input = input.as_ref();
    info!("Converting {}", input.display());

    Pipeline::new(config.clone())
        .run_file(input, agents, target, cancel, observer)
        .await
}

/// Synchronous wrapper around [`convert_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_file_sync(
    input: impl AsRef<Path>,
    agents: &[Agent],
    target: &ModelTarget,
    config: &PipelineConfig,
    observer: &dyn ProgressObserver,
) -> Result<RunOutcome, PipelineError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PipelineError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_file(
            input,
            agents,
            target,
            config,
            &CancelFlag::new(),
            observer,
        ))
}

/// Write `markdown` to `path` atomically (temp file, then rename).
///
/// Missing parent directories are created.
pub async fn write_markdown(path: impl AsRef<Path>, markdown: &str) -> Result<(), PipelineError> {
    let path = path.as_ref();
    let fail = |source| PipelineError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, markdown).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;

    info!("Wrote {} bytes to {}", markdown.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractionError, ModelError, PreconditionError};
    use crate::model::{GenerationRequest, ModelClient, ModelProvider};
    use crate::progress::NoopObserver;
    use crate::state::{StageStatus, EXTRACTION_STEP};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Returns the chunk unchanged.
    struct Echo;

    #[async_trait]
    impl ModelClient for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, ModelError> {
            Ok(request
                .user_prompt
                .split_once('\n')
                .map(|(_, rest)| rest.to_string())
                .unwrap_or_default())
        }
    }

    fn echo_config() -> PipelineConfig {
        PipelineConfig::builder().client(Arc::new(Echo)).build().unwrap()
    }

    fn target() -> ModelTarget {
        ModelTarget::new(ModelProvider::Google, "gemini-2.5-flash", "k")
    }

    #[tokio::test]
    async fn write_markdown_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/notes.md");
        write_markdown(&out, "# Notes\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "# Notes\n");
        assert!(!dir.path().join("nested/notes.md.tmp").exists());
    }

    #[tokio::test]
    async fn write_markdown_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("notes.md");
        std::fs::write(&out, "old").unwrap();
        write_markdown(&out, "new").await.unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "new");
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should go makes the rename fail.
        let out = dir.path().join("taken.md");
        std::fs::create_dir(&out).unwrap();
        std::fs::write(out.join("keep"), "x").unwrap();
        let err = write_markdown(&out, "x").await.unwrap_err();
        assert!(matches!(err, PipelineError::OutputWriteFailed { .. }));
    }

    #[tokio::test]
    async fn unsupported_file_marks_the_extraction_step() {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        let agents = vec![Agent::new(1, "a", 0.1, "p")];
        let outcome = convert_file(
            file.path(),
            &agents,
            &target(),
            &echo_config(),
            &CancelFlag::new(),
            &NoopObserver,
        )
        .await
        .unwrap();

        let RunOutcome::Failed(failure) = outcome else {
            panic!("expected a failed run, got {outcome:?}");
        };
        assert!(matches!(
            failure.error,
            PipelineError::Extraction(ExtractionError::UnsupportedFormat { .. })
        ));
        assert!(!failure.error.is_retryable());
        assert_eq!(failure.state.steps.len(), 1);
        assert_eq!(failure.state.steps[0].agent_name, EXTRACTION_STEP);
        assert_eq!(failure.state.steps[0].status, StageStatus::Error);
        assert_eq!(failure.retry.source_file(), Some(file.path()));
    }

    #[tokio::test]
    async fn retry_extracts_the_same_file_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lecture.txt");
        let agents = vec![Agent::new(1, "echo", 0.1, "p")];

        let outcome = convert_file(
            &path,
            &agents,
            &target(),
            &echo_config(),
            &CancelFlag::new(),
            &NoopObserver,
        )
        .await
        .unwrap();
        let RunOutcome::Failed(failure) = outcome else {
            panic!("expected a failed run, got {outcome:?}");
        };
        assert!(matches!(
            failure.error,
            PipelineError::Extraction(ExtractionError::FileNotFound { .. })
        ));
        assert!(failure.error.is_retryable());
        assert!(failure.retry.initial_text().is_none());

        std::fs::write(&path, "cell membranes").unwrap();
        let retried = failure
            .retry
            .retry(&CancelFlag::new(), &NoopObserver)
            .await
            .unwrap();
        assert_eq!(retried.final_artifact(), Some("cell membranes"));
    }

    #[tokio::test]
    async fn empty_document_is_a_precondition_failure() {
        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        let agents = vec![Agent::new(1, "a", 0.1, "p")];
        let err = convert_file(
            file.path(),
            &agents,
            &target(),
            &PipelineConfig::default(),
            &CancelFlag::new(),
            &NoopObserver,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Precondition(PreconditionError::EmptyInput)
        ));
    }
}
