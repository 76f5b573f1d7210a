//! Error types for the autonotes library.
//!
//! Three layers reflect where a run can go wrong:
//!
//! * [`PipelineError`] — **Fatal** for one run: a precondition was violated,
//!   the document could not be read, or a model call inside a stage failed.
//!   The failing stage is marked `Error` and no later stage runs.
//!
//! * [`ModelError`] — the classified failure of a single model call. It is
//!   wrapped in [`PipelineError::Model`] together with the stage and chunk
//!   that produced it, so a failure is always attributable.
//!
//! * [`ExtractionError`] — the text-extraction collaborator could not turn a
//!   file into text.
//!
//! Cancellation is not an error and has no variant here: a cancelled run
//! ends in [`crate::runner::RunOutcome::Cancelled`].
//!
//! [`PipelineError::report`] maps any error to the user-facing
//! [`ErrorReport`] (title, message, severity, retryable/dismissable flags).

use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All fatal errors returned by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Preconditions ─────────────────────────────────────────────────────
    /// Checked before any stage record is created.
    #[error("Cannot start the workflow: {0}")]
    Precondition(#[from] PreconditionError),

    // ── Input ─────────────────────────────────────────────────────────────
    /// The document could not be turned into text.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    // ── Model ─────────────────────────────────────────────────────────────
    /// A model call failed inside a stage; the whole stage is discarded.
    #[error("Stage {} '{agent}' failed on chunk {}/{total_chunks}: {source}", stage_index + 1, chunk_index + 1)]
    Model {
        stage_index: usize,
        agent: String,
        chunk_index: usize,
        total_chunks: usize,
        #[source]
        source: ModelError,
    },

    // ── Output ────────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config ────────────────────────────────────────────────────────────
    /// Builder or catalog validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Violations detected before a run mutates any state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("there is no input text (upload a document and wait for text extraction)")]
    EmptyInput,

    #[error("no core agents are configured; promote at least one agent to the core workflow")]
    NoCoreAgents,

    #[error("the selected model '{model}' has no API key")]
    MissingCredential { model: String },

    #[error("agent '{agent}' has temperature {temperature}, expected a value in [0, 1]")]
    InvalidTemperature { agent: String, temperature: String },
}

/// Classified failure of one model call.
///
/// Classification drives retry presentation: [`ModelError::is_retryable`]
/// is false for `Unauthorized` and `ModelNotFound`, which need the user to
/// fix the model configuration first.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ModelError {
    /// HTTP 401/403: key rejected or not allowed to use the model.
    #[error("Authentication failed for provider '{provider}': {detail}")]
    Unauthorized { provider: String, detail: String },

    /// HTTP 429 or a quota message.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// The provider does not know the requested model identifier.
    #[error("Model '{model}' was not found: {detail}")]
    ModelNotFound { model: String, detail: String },

    /// HTTP 5xx: the provider is overloaded or failing.
    #[error("Service unavailable ({status}): {detail}")]
    ServiceUnavailable { status: u16, detail: String },

    /// Connection refused, DNS failure, request timeout.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected model error: {0}")]
    Unknown(String),
}

impl ModelError {
    /// Whether re-running the same request can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ModelError::Unauthorized { .. } | ModelError::ModelNotFound { .. }
        )
    }

    /// Map an HTTP status and response body to a classified error.
    pub fn from_http_status(
        provider: &str,
        model: &str,
        status: reqwest::StatusCode,
        body: String,
        retry_after_secs: Option<u64>,
    ) -> Self {
        let lower = body.to_lowercase();
        match status.as_u16() {
            401 | 403 => ModelError::Unauthorized {
                provider: provider.to_string(),
                detail: body,
            },
            404 => ModelError::ModelNotFound {
                model: model.to_string(),
                detail: body,
            },
            429 => ModelError::RateLimited {
                provider: provider.to_string(),
                retry_after_secs,
            },
            400 if lower.contains("not a valid model id") => ModelError::ModelNotFound {
                model: model.to_string(),
                detail: body,
            },
            400 if lower.contains("api key") => ModelError::Unauthorized {
                provider: provider.to_string(),
                detail: body,
            },
            _ if lower.contains("quota") || lower.contains("rate limit") => {
                ModelError::RateLimited {
                    provider: provider.to_string(),
                    retry_after_secs,
                }
            }
            code @ 500..=599 => ModelError::ServiceUnavailable {
                status: code,
                detail: body,
            },
            code => ModelError::Unknown(format!("HTTP {code}: {body}")),
        }
    }

    /// Map a transport-level reqwest error.
    pub fn from_network_error(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ModelError::Network(format!("request timed out: {e}"))
        } else if e.is_connect() {
            ModelError::Network(format!("connection failed: {e}"))
        } else if e.is_decode() {
            ModelError::Unknown(format!("could not decode provider response: {e}"))
        } else {
            ModelError::Network(e.to_string())
        }
    }
}

/// Failures of the text-extraction collaborator.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type: .{extension}\nSupported formats: pdf, docx, pptx, xlsx, txt, md")]
    UnsupportedFormat { extension: String },

    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    #[error("Could not read '{path}': {detail}")]
    Malformed { path: PathBuf, detail: String },

    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// PDF support is compiled out, or no pdfium library could be bound.
    #[error("PDF extraction is unavailable: {0}")]
    PdfiumUnavailable(String),
}

// ── User-facing classification ───────────────────────────────────────────

/// Broad category used to pick wording and icons in a UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    File,
    Ai,
    Network,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// What a user interface shows for a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
    pub dismissable: bool,
}

impl PipelineError {
    /// Whether the attached retry action is worth offering.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Model { source, .. } => source.is_retryable(),
            // The file at the same path may be fixed or replaced.
            PipelineError::Extraction(
                ExtractionError::FileNotFound { .. }
                | ExtractionError::Malformed { .. }
                | ExtractionError::Io { .. },
            ) => true,
            PipelineError::OutputWriteFailed { .. } => true,
            _ => false,
        }
    }

    /// Classify this error for display.
    pub fn report(&self) -> ErrorReport {
        let (kind, severity, title, message) = match self {
            PipelineError::Precondition(p) => (
                ErrorKind::Validation,
                Severity::Warning,
                "Workflow not started",
                p.to_string(),
            ),
            PipelineError::Extraction(e) => (
                ErrorKind::File,
                Severity::Warning,
                match e {
                    ExtractionError::UnsupportedFormat { .. } => "Unsupported file",
                    _ => "Invalid file",
                },
                e.to_string(),
            ),
            PipelineError::Model { source, .. } => {
                let (kind, severity, title, message) = model_error_wording(source);
                (kind, severity, title, message.to_string())
            }
            PipelineError::OutputWriteFailed { .. } => (
                ErrorKind::File,
                Severity::Critical,
                "Could not save the result",
                self.to_string(),
            ),
            PipelineError::InvalidConfig(msg) => (
                ErrorKind::Validation,
                Severity::Warning,
                "Invalid configuration",
                msg.clone(),
            ),
            PipelineError::Internal(msg) => (
                ErrorKind::Unknown,
                Severity::Critical,
                "Unexpected error",
                msg.clone(),
            ),
        };

        let details = match self {
            PipelineError::Model { source, .. } => Some(format!("{self}\n{source}")),
            PipelineError::Extraction(_) => Some(
                "Supported formats: PDF, DOCX, PPTX, XLSX, TXT, MD".to_string(),
            ),
            _ => None,
        };

        ErrorReport {
            kind,
            severity,
            title: title.to_string(),
            message,
            details,
            retryable: self.is_retryable(),
            dismissable: true,
        }
    }
}

fn model_error_wording(e: &ModelError) -> (ErrorKind, Severity, &'static str, &'static str) {
    match e {
        ModelError::Unauthorized { .. } => (
            ErrorKind::Ai,
            Severity::Error,
            "Authentication failed",
            "The API key was rejected. Check the key in the model settings.",
        ),
        ModelError::RateLimited { .. } => (
            ErrorKind::Ai,
            Severity::Warning,
            "Rate limit reached",
            "The request limit for this model was reached. Wait a few seconds and retry, or pick another model.",
        ),
        ModelError::ModelNotFound { .. } => (
            ErrorKind::Ai,
            Severity::Warning,
            "Model not found",
            "The model does not exist or is not available. Check the model identifier in the settings.",
        ),
        ModelError::ServiceUnavailable { .. } => (
            ErrorKind::Ai,
            Severity::Warning,
            "AI service unavailable",
            "The AI service is overloaded or under maintenance. Retry in a few minutes.",
        ),
        ModelError::Network(_) => (
            ErrorKind::Network,
            Severity::Warning,
            "Connection error",
            "The AI service could not be reached. Check your connection and retry.",
        ),
        ModelError::Unknown(_) => (
            ErrorKind::Ai,
            Severity::Warning,
            "AI processing error",
            "Something went wrong while processing the text. Retry, and report the problem if it persists.",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn model_failure(source: ModelError) -> PipelineError {
        PipelineError::Model {
            stage_index: 1,
            agent: "Harmonizer".into(),
            chunk_index: 2,
            total_chunks: 5,
            source,
        }
    }

    #[test]
    fn model_failure_display_is_one_based() {
        let e = model_failure(ModelError::Network("reset".into()));
        let msg = e.to_string();
        assert!(msg.contains("Stage 2 'Harmonizer'"), "got: {msg}");
        assert!(msg.contains("chunk 3/5"), "got: {msg}");
    }

    #[test]
    fn http_status_classification() {
        let classify = |code: u16, body: &str| {
            ModelError::from_http_status(
                "openrouter",
                "openai/gpt-4o",
                StatusCode::from_u16(code).unwrap(),
                body.to_string(),
                None,
            )
        };

        assert!(matches!(classify(401, ""), ModelError::Unauthorized { .. }));
        assert!(matches!(classify(403, ""), ModelError::Unauthorized { .. }));
        assert!(matches!(classify(404, ""), ModelError::ModelNotFound { .. }));
        assert!(matches!(classify(429, ""), ModelError::RateLimited { .. }));
        assert!(matches!(
            classify(503, "overloaded"),
            ModelError::ServiceUnavailable { status: 503, .. }
        ));
        assert!(matches!(
            classify(400, "foo is not a valid model ID"),
            ModelError::ModelNotFound { .. }
        ));
        assert!(matches!(
            classify(400, "Quota exceeded for metric"),
            ModelError::RateLimited { .. }
        ));
        assert!(matches!(classify(418, "teapot"), ModelError::Unknown(_)));
    }

    #[test]
    fn retryability_follows_classification() {
        assert!(!ModelError::Unauthorized {
            provider: "google".into(),
            detail: String::new()
        }
        .is_retryable());
        assert!(!ModelError::ModelNotFound {
            model: "x".into(),
            detail: String::new()
        }
        .is_retryable());
        assert!(ModelError::RateLimited {
            provider: "google".into(),
            retry_after_secs: Some(3)
        }
        .is_retryable());
        assert!(ModelError::ServiceUnavailable {
            status: 500,
            detail: String::new()
        }
        .is_retryable());
        assert!(ModelError::Network("x".into()).is_retryable());
        assert!(ModelError::Unknown("x".into()).is_retryable());
    }

    #[test]
    fn precondition_report_is_not_retryable() {
        let report = PipelineError::from(PreconditionError::NoCoreAgents).report();
        assert_eq!(report.kind, ErrorKind::Validation);
        assert!(!report.retryable);
        assert!(report.dismissable);
    }

    #[test]
    fn unauthorized_report_has_error_severity() {
        let report = model_failure(ModelError::Unauthorized {
            provider: "google".into(),
            detail: "API key not valid".into(),
        })
        .report();
        assert_eq!(report.severity, Severity::Error);
        assert!(!report.retryable);
        assert!(report.details.unwrap().contains("API key not valid"));
    }

    #[test]
    fn rate_limit_report_is_retryable_warning() {
        let report = model_failure(ModelError::RateLimited {
            provider: "google".into(),
            retry_after_secs: None,
        })
        .report();
        assert_eq!(report.severity, Severity::Warning);
        assert!(report.retryable);
    }

    #[test]
    fn unsupported_format_report() {
        let report = PipelineError::from(ExtractionError::UnsupportedFormat {
            extension: "odt".into(),
        })
        .report();
        assert_eq!(report.kind, ErrorKind::File);
        assert_eq!(report.title, "Unsupported file");
        assert!(report.message.contains(".odt"));
        assert!(!report.retryable);
    }

    #[test]
    fn unreadable_file_report_is_retryable() {
        let missing = PipelineError::from(ExtractionError::FileNotFound {
            path: "notes.txt".into(),
        });
        assert!(missing.report().retryable);
        let malformed = PipelineError::from(ExtractionError::Malformed {
            path: "deck.pptx".into(),
            detail: "invalid Zip archive".into(),
        });
        assert!(malformed.is_retryable());
        assert!(!PipelineError::from(ExtractionError::PdfiumUnavailable("x".into())).is_retryable());
    }
}
