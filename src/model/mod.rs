//! Model clients: one call contract over several LLM providers.
//!
//! The stage executor only knows [`ModelClient`]: a prompt pair goes in,
//! text or a classified [`ModelError`] comes out. Each provider gets its own
//! implementation, picked by [`client_for`] from the run's [`ModelTarget`].
//!
//! ```text
//! ModelTarget { provider, model, api_key }
//!      │
//!      ├─ Google     ──▶ GeminiClient      (generateContent)
//!      └─ OpenRouter ──▶ OpenRouterClient  (OpenAI-compatible chat/completions)
//! ```
//!
//! SECURITY: an API key is only ever sent to the endpoint of the provider it
//! was configured for.

pub mod gemini;
pub mod openrouter;

use crate::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use gemini::GeminiClient;
pub use openrouter::OpenRouterClient;

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    Google,
    OpenRouter,
}

impl ModelProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelProvider::Google => "google",
            ModelProvider::OpenRouter => "openrouter",
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" | "gemini" => Ok(ModelProvider::Google),
            "openrouter" => Ok(ModelProvider::OpenRouter),
            other => Err(format!(
                "unknown provider '{other}' (expected 'google' or 'openrouter')"
            )),
        }
    }
}

/// The provider, model and credential used for every call of one run.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTarget {
    pub provider: ModelProvider,
    /// e.g. `gemini-2.5-flash` or `openai/gpt-4o`.
    pub model: String,
    pub api_key: String,
}

impl ModelTarget {
    pub fn new(provider: ModelProvider, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl fmt::Debug for ModelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelTarget")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &if self.has_credential() { "<set>" } else { "<empty>" })
            .finish()
    }
}

/// One model call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest<'a> {
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub temperature: f32,
    pub target: &'a ModelTarget,
}

/// Prompt in, text out.
///
/// Implementations enforce their own request timeout and map every failure
/// to a [`ModelError`].
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Short provider name used in logs and errors.
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, ModelError>;
}

/// Build the client for `target.provider`.
pub fn client_for(
    target: &ModelTarget,
    timeout: Duration,
) -> Result<Arc<dyn ModelClient>, ModelError> {
    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ModelError::Unknown(format!("cannot build HTTP client: {e}")))?;

    Ok(match target.provider {
        ModelProvider::Google => Arc::new(GeminiClient::new(http)),
        ModelProvider::OpenRouter => Arc::new(OpenRouterClient::new(http)),
    })
}

/// Read a `Retry-After` header expressed in seconds.
pub(crate) fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
