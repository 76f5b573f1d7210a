//! # autonotes
//!
//! Turn documents into structured Markdown notes by passing their text
//! through an ordered chain of LLM "agents".
//!
//! ## Why a chain?
//!
//! One prompt asked to clean, restructure, harmonise and format a long
//! transcript at once does each job badly. Splitting the work into small
//! single-purpose stages (each with its own system prompt and temperature)
//! keeps every model call focused, and the output of one stage is simply
//! the input of the next.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document
//!  │
//!  ├─ 1. Extract   pdf / docx / pptx / xlsx / txt → text (spawn_blocking)
//!  ├─ 2. Check     input, core agents, credential, temperatures
//!  └─ 3. Stages    for each core agent, in order:
//!                    chunk(text, 15 000 chars) → one model call per chunk,
//!                    sequentially → concatenate → next stage's input
//!  → final Markdown
//! ```
//!
//! Runs are observable ([`progress`]), cooperatively cancellable
//! ([`CancelFlag`]) and, when a stage fails, retryable from the original
//! text ([`runner::RetryHandle`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use autonotes::{AgentCatalog, CancelFlag, ModelProvider, ModelTarget, Pipeline};
//! use autonotes::progress::NoopObserver;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = AgentCatalog::builtin();
//!     let target = ModelTarget::new(
//!         ModelProvider::Google,
//!         "gemini-2.5-flash",
//!         std::env::var("AUTONOTES_API_KEY")?,
//!     );
//!     let text = std::fs::read_to_string("lecture.txt")?;
//!     let outcome = Pipeline::default()
//!         .run(&catalog.agents, &text, &target, &CancelFlag::new(), &NoopObserver)
//!         .await?;
//!     if let Some(markdown) = outcome.final_artifact() {
//!         println!("{markdown}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `autonotes` binary (clap + indicatif + anyhow + tracing-subscriber) |
//! | `pdf`   | on      | PDF text extraction through `pdfium-render` |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! autonotes = { version = "0.3", default-features = false, features = ["pdf"] }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod agent;
pub mod cancel;
pub mod chunker;
pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod model;
pub mod progress;
pub mod prompts;
pub mod runner;
pub mod stage;
pub mod state;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use agent::{Agent, AgentCatalog, AgentKind};
pub use cancel::CancelFlag;
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use convert::{convert_file, convert_file_sync, write_markdown};
pub use error::{ErrorReport, ExtractionError, ModelError, PipelineError, PreconditionError};
pub use extract::{extract_file, DocumentFormat};
pub use model::{ModelClient, ModelProvider, ModelTarget};
pub use progress::{ChannelObserver, ProgressObserver, ProgressUpdate, RunUpdate};
pub use runner::{Pipeline, RetryHandle, RunFailure, RunHandle, RunOutcome};
pub use state::{RunState, RunStatus, StageRunRecord, StageStatus};
