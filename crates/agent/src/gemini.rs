//! HTTP adapter for the Gemini `generateContent` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use outreach_core::config::LlmConfig;
use outreach_core::domain::conversation::{Role, Turn};

use crate::llm::{GenerationProvider, ProviderError};

const SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";
const SAFETY_CATEGORIES: &[&str] = &["HARM_CATEGORY_HARASSMENT", "HARM_CATEGORY_HATE_SPEECH"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

fn provider_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(api_key: SecretString, base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|error| ProviderError::transport(format!("failed to build HTTP client: {error}")))?;

        Ok(Self { client, api_key, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::transport("llm.api_key is not configured"))?;
        Self::new(api_key, config.base_url.clone())
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }
}

#[async_trait]
impl GenerationProvider for GeminiClient {
    async fn generate(
        &self,
        model: &str,
        instruction: &str,
        history: &[Turn],
        message: &str,
    ) -> Result<String, ProviderError> {
        let mut contents = history
            .iter()
            .map(|turn| Content {
                role: Some(provider_role(turn.role)),
                parts: vec![Part { text: &turn.text }],
            })
            .collect::<Vec<_>>();
        contents.push(Content { role: Some("user"), parts: vec![Part { text: message }] });

        let request = GenerateContentRequest {
            system_instruction: (!instruction.trim().is_empty())
                .then(|| Content { role: None, parts: vec![Part { text: instruction }] }),
            contents,
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|category| SafetySetting { category: *category, threshold: SAFETY_THRESHOLD })
                .collect(),
        };

        let response = self
            .client
            .post(self.endpoint(model))
            .query(&[("key", self.api_key.expose_secret())])
            .json(&request)
            .send()
            .await
            .map_err(|error| ProviderError::transport(format!("HTTP request failed: {error}")))?;

        let status = response.status();
        debug!(event_name = "agent.provider.response", model, status = status.as_u16(), "gemini response received");

        let body = response
            .text()
            .await
            .map_err(|error| ProviderError::transport(format!("failed to read response body: {error}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            return Err(ProviderError::with_status(status.as_u16(), message));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|error| {
            ProviderError::transport(format!("failed to parse generateContent response: {error}"))
        })?;

        Ok(parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect::<String>())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use outreach_core::domain::conversation::{Role, Turn};

    use super::GeminiClient;
    use crate::llm::{GenerationProvider, ProviderErrorKind};

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new("test-key".to_string().into(), server.uri()).expect("client")
    }

    fn turn(role: Role, text: &str) -> Turn {
        Turn { role, text: text.to_string(), created_at: Utc::now() }
    }

    #[tokio::test]
    async fn sends_instruction_history_and_safety_settings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "systemInstruction": { "parts": [{ "text": "Eres Cami" }] },
                "contents": [
                    { "role": "user", "parts": [{ "text": "hola" }] },
                    { "role": "model", "parts": [{ "text": "¡Buenos días!" }] },
                    { "role": "user", "parts": [{ "text": "no lo veo" }] }
                ],
                "safetySettings": [
                    { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
                    { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_MEDIUM_AND_ABOVE" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Claro, " }, { "text": "aquí está." }] }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let history = vec![turn(Role::User, "hola"), turn(Role::Assistant, "¡Buenos días!")];
        let text = client(&server)
            .generate("gemini-1.5-flash", "Eres Cami", &history, "no lo veo")
            .await
            .expect("generation should succeed");
        assert_eq!(text, "Claro, aquí está.");
    }

    #[tokio::test]
    async fn error_status_is_preserved_for_classification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
            })))
            .mount(&server)
            .await;

        let error = client(&server)
            .generate("gemini-1.5-flash", "", &[], "hola")
            .await
            .expect_err("429 should fail");
        assert_eq!(error.status, Some(429));
        assert_eq!(error.message, "Resource has been exhausted");
        assert_eq!(error.kind(), ProviderErrorKind::Transient);
    }

    #[tokio::test]
    async fn unknown_model_is_a_client_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let error =
            client(&server).generate("gemini-9", "", &[], "hola").await.expect_err("404 should fail");
        assert_eq!(error.kind(), ProviderErrorKind::Client);
        assert_eq!(error.message, "not found");
    }

    #[tokio::test]
    async fn blocked_prompt_without_candidates_yields_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let text = client(&server).generate("gemini-1.5-flash", "", &[], "hola").await.expect("ok");
        assert_eq!(text, "");
    }
}
