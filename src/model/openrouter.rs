//! OpenRouter client (OpenAI-compatible `chat/completions`).
//!
//! OpenRouter fronts hundreds of models behind one API; the model id has the
//! form `vendor/model`, e.g. `openai/gpt-4o`.
//!
//! SECURITY: the API key is only sent to the official OpenRouter endpoint
//! (or the endpoint explicitly configured with [`OpenRouterClient::with_endpoint`]).

use super::{retry_after_secs, GenerationRequest, ModelClient};
use crate::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Official OpenRouter API endpoint
const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

pub struct OpenRouterClient {
    http: reqwest::Client,
    endpoint: String,
}

impl OpenRouterClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint: OPENROUTER_API_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

fn build_request<'a>(request: &'a GenerationRequest<'a>) -> ChatRequest<'a> {
    ChatRequest {
        model: &request.target.model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: request.system_prompt,
            },
            ChatMessage {
                role: "user",
                content: request.user_prompt,
            },
        ],
        temperature: request.temperature,
    }
}

/// Pull `error.message` out of an OpenAI-style error body, if present.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
}

#[async_trait]
impl ModelClient for OpenRouterClient {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, ModelError> {
        let target = request.target;

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&target.api_key)
            .json(&build_request(request))
            .send()
            .await
            .map_err(ModelError::from_network_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(response.headers());
            let body = response.text().await.unwrap_or_default();
            let detail = error_message(&body).unwrap_or(body);
            return Err(ModelError::from_http_status(
                self.name(),
                &target.model,
                status,
                detail,
                retry_after,
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(ModelError::from_network_error)?;

        // OpenRouter reports some upstream failures with a 200 and an error body.
        if let Some(err) = parsed.error {
            let detail = err.message.unwrap_or_default();
            return Err(match err.code {
                Some(code) => match reqwest::StatusCode::from_u16(code) {
                    Ok(status) => {
                        ModelError::from_http_status(self.name(), &target.model, status, detail, None)
                    }
                    Err(_) => ModelError::Unknown(detail),
                },
                None => ModelError::Unknown(detail),
            });
        }

        if let Some(usage) = &parsed.usage {
            debug!(
                "openrouter {}: {} input tokens, {} output tokens",
                target.model, usage.prompt_tokens, usage.completion_tokens
            );
        }

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| ModelError::Unknown("response contained no choices".to_string()))
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: Option<u16>,
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelProvider, ModelTarget};

    #[test]
    fn request_body_shape() {
        let target = ModelTarget::new(ModelProvider::OpenRouter, "openai/gpt-4o", "k");
        let req = GenerationRequest {
            system_prompt: "sys",
            user_prompt: "Text to process:\nbody",
            temperature: 0.5,
            target: &target,
        };
        let json = serde_json::to_value(build_request(&req)).unwrap();
        assert_eq!(json["model"], "openai/gpt-4o");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "sys");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "Text to process:\nbody");
        assert_eq!(json["temperature"], 0.5);
    }

    #[test]
    fn error_message_is_extracted() {
        let body = r#"{"error":{"code":400,"message":"foo is not a valid model ID"}}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("foo is not a valid model ID")
        );
        assert_eq!(error_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn choice_content_is_parsed() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"out"}}],
                      "usage":{"prompt_tokens":3,"completion_tokens":1}}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("out"));
        assert!(parsed.error.is_none());
    }

    #[test]
    fn inline_error_is_parsed() {
        let raw = r#"{"error":{"code":429,"message":"Rate limit exceeded"}}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.error.unwrap().code, Some(429));
    }
}
