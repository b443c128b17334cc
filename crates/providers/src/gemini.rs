//! Google Gemini provider implementation.
//!
//! Uses the native `generateContent` API:
//! - `x-goog-api-key` header authentication
//! - system messages lifted into `systemInstruction`
//! - turns sent as `contents[].parts[].text` with roles `user` / `model`
//! - the model is part of the URL, so one adapter serves every Gemini model

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use simulai_config::ProviderConfig;
use simulai_core::error::ProviderError;
use simulai_core::message::{Message, Role};
use simulai_core::provider::*;
use simulai_core::EngineKind;
use std::time::Duration;
use tracing::{debug, warn};

/// Gemini `generateContent` provider.
pub struct GeminiProvider {
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        default_model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            default_model: default_model.into(),
            client: crate::http_client(timeout),
        }
    }

    pub fn from_config(config: &ProviderConfig, timeout: Duration) -> Self {
        Self::new(
            &config.api_url,
            config.api_key.clone(),
            &config.default_model,
            timeout,
        )
    }

    /// Split system messages out and convert the rest into `contents`.
    fn to_api_body(messages: &[Message]) -> (Option<GeminiContent>, Vec<GeminiContent>) {
        let mut system_parts: Vec<GeminiPart> = Vec::new();
        let mut contents: Vec<GeminiContent> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(GeminiPart {
                    text: Some(msg.content.clone()),
                }),
                Role::User | Role::Assistant => contents.push(GeminiContent {
                    role: Some(if msg.role == Role::User { "user" } else { "model" }.into()),
                    parts: vec![GeminiPart {
                        text: Some(msg.content.clone()),
                    }],
                }),
            }
        }

        let system = (!system_parts.is_empty()).then(|| GeminiContent {
            role: None,
            parts: system_parts,
        });

        (system, contents)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn engine(&self) -> EngineKind {
        EngineKind::Gemini
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("gemini API key missing".into()))?;

        let model = request.model.unwrap_or_else(|| self.default_model.clone());
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let (system_instruction, contents) = Self::to_api_body(&request.messages);

        let mut generation_config = serde_json::json!({ "temperature": request.temperature });
        if let Some(max_tokens) = request.max_tokens {
            generation_config["maxOutputTokens"] = serde_json::json!(max_tokens);
        }

        let body = GenerateRequest {
            contents,
            system_instruction,
            generation_config,
        };

        debug!(provider = "gemini", model = %model, "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = "gemini", model = %model, status = status.as_u16(), body = %error_body, "Gemini returned error");
            return Err(ProviderError::from_status(status.as_u16(), error_body));
        }

        let api_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let text: String = api_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(ProviderResponse {
            content: text,
            tokens_used: api_response
                .usage_metadata
                .map(|u| u.total_token_count)
                .unwrap_or(0),
            model,
        })
    }
}

// --- Gemini API types (internal) ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new(
            server.uri(),
            Some("gk-test".into()),
            "gemini-2.5-flash",
            Duration::from_secs(5),
        )
    }

    #[test]
    fn system_messages_become_instruction() {
        let messages = vec![
            Message::system("Você é um tutor"),
            Message::system("Responda em português"),
            Message::user("Olá"),
            Message::assistant("Oi!"),
        ];
        let (system, contents) = GeminiProvider::to_api_body(&messages);
        let system = system.unwrap();
        assert_eq!(system.parts.len(), 2);
        assert!(system.role.is_none());
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role.as_deref(), Some("user"));
        assert_eq!(contents[1].role.as_deref(), Some("model"));
    }

    #[test]
    fn request_body_shape() {
        let (system_instruction, contents) =
            GeminiProvider::to_api_body(&[Message::system("s"), Message::user("u")]);
        let body = GenerateRequest {
            contents,
            system_instruction,
            generation_config: serde_json::json!({"temperature": 0.7}),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "u");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "s");
        assert!(json["generationConfig"]["temperature"].is_number());
    }

    #[tokio::test]
    async fn successful_generate_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "gk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Olá, "}, {"text": "estudante!"}]}}],
                "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 3, "totalTokenCount": 7}
            })))
            .mount(&server)
            .await;

        let request = ProviderRequest::new(vec![Message::user("Olá")])
            .with_model(Some("gemini-2.0-flash".into()));
        let response = provider_for(&server).complete(request).await.unwrap();
        assert_eq!(response.content, "Olá, estudante!");
        assert_eq!(response.tokens_used, 7);
        assert_eq!(response.model, "gemini-2.0-flash");
    }

    #[tokio::test]
    async fn no_candidates_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": []
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .complete(ProviderRequest::new(vec![Message::user("Olá")]))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::EmptyResponse);
    }

    #[tokio::test]
    async fn rate_limit_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .complete(ProviderRequest::new(vec![Message::user("Olá")]))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::RateLimited);
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let provider = GeminiProvider::new("http://127.0.0.1:1", None, "m", Duration::from_secs(1));
        let err = provider
            .complete(ProviderRequest::new(vec![Message::user("Olá")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
