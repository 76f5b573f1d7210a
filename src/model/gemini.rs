//! Google Gemini client (`models/{model}:generateContent`).
//!
//! SECURITY: the API key is only sent to the official Google endpoint (or the
//! base URL explicitly configured with [`GeminiClient::with_base_url`]).

use super::{retry_after_secs, GenerationRequest, ModelClient};
use crate::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Official Google Gemini API endpoint
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }
}

fn build_request(request: &GenerationRequest<'_>) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart {
                text: request.user_prompt.to_string(),
            }],
        }],
        system_instruction: (!request.system_prompt.is_empty()).then(|| GeminiSystemInstruction {
            parts: vec![GeminiPart {
                text: request.system_prompt.to_string(),
            }],
        }),
        generation_config: GeminiGenerationConfig {
            temperature: request.temperature,
        },
    }
}

/// Text of the first candidate; empty if the model returned nothing.
fn response_text(response: GeminiResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn name(&self) -> &str {
        "google"
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, ModelError> {
        let target = request.target;
        let body = build_request(request);

        let response = self
            .http
            .post(self.endpoint(&target.model))
            .query(&[("key", target.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(ModelError::from_network_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(response.headers());
            let error_text = response.text().await.unwrap_or_default();
            return Err(ModelError::from_http_status(
                self.name(),
                &target.model,
                status,
                error_text,
                retry_after,
            ));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(ModelError::from_network_error)?;
        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                "gemini {}: {} input tokens, {} output tokens",
                target.model, usage.prompt_token_count, usage.candidates_token_count
            );
        }
        Ok(response_text(parsed))
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelProvider, ModelTarget};

    #[test]
    fn request_body_shape() {
        let target = ModelTarget::new(ModelProvider::Google, "gemini-2.5-flash", "k");
        let req = GenerationRequest {
            system_prompt: "be brief",
            user_prompt: "Text to process:\nhello",
            temperature: 0.2,
            target: &target,
        };
        let json = serde_json::to_value(build_request(&req)).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Text to process:\nhello");
        let temp = json["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temp - 0.2).abs() < 1e-6);
    }

    #[test]
    fn empty_system_prompt_is_omitted() {
        let target = ModelTarget::new(ModelProvider::Google, "m", "k");
        let req = GenerationRequest {
            system_prompt: "",
            user_prompt: "u",
            temperature: 0.0,
            target: &target,
        };
        let json = serde_json::to_value(build_request(&req)).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn response_parts_are_concatenated() {
        let raw = r##"{
            "candidates": [{"content": {"role": "model", "parts": [{"text": "# A"}, {"text": "\n\nbody"}]}}],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 4, "totalTokenCount": 14}
        }"##;
        let parsed: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response_text(parsed), "# A\n\nbody");
    }

    #[test]
    fn missing_candidates_yield_empty_text() {
        let parsed: GeminiResponse = serde_json::from_str(r#"{"candidates": [{}]}"#).unwrap();
        assert_eq!(response_text(parsed), "");
        let parsed: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response_text(parsed), "");
    }

    #[test]
    fn endpoint_includes_model() {
        let client = GeminiClient::new(reqwest::Client::new()).with_base_url("http://localhost:9/");
        assert_eq!(
            client.endpoint("gemini-2.5-flash"),
            "http://localhost:9/gemini-2.5-flash:generateContent"
        );
    }
}
