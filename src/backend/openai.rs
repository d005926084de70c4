//! Backend for OpenAI-compatible APIs.
//!
//! [`OpenAiBackend`] covers OpenAI, vLLM, llama.cpp server, LM Studio,
//! Together AI, Groq, Mistral, and Ollama's `/v1/` endpoint.
//!
//! Endpoint: `/v1/chat/completions`.

use super::{error_for_status, Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Backend for any OpenAI-compatible API.
///
/// # Example
///
/// ```
/// use llm_batch::backend::OpenAiBackend;
///
/// let backend = OpenAiBackend::new();
/// let with_key = OpenAiBackend::new().with_api_key("sk-...");
/// ```
#[derive(Clone, Default)]
pub struct OpenAiBackend {
    /// Optional API key. If set, sent as `Authorization: Bearer {key}`.
    pub(crate) api_key: Option<String>,
    /// Optional organization ID. If set, sent as `OpenAI-Organization: {org}`.
    pub(crate) organization: Option<String>,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field(
                "api_key",
                &self.api_key.as_ref().map(|k| {
                    if k.chars().count() > 6 {
                        format!("{}***", k.chars().take(6).collect::<String>())
                    } else {
                        "***".to_string()
                    }
                }),
            )
            .field("organization", &self.organization)
            .finish()
    }
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend without authentication.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API key for authentication.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the organization ID header.
    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    /// Build the request body for `/v1/chat/completions`.
    ///
    /// Custom options are Ollama-specific and skipped here.
    fn build_body(request: &LlmRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|msg| json!({"role": msg.role.as_str(), "content": msg.content}))
            .collect();

        json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.config.temperature,
            "max_tokens": request.config.max_tokens,
            "stream": false,
        })
    }

    /// Build the reqwest request with appropriate headers.
    fn build_http_request(
        &self,
        client: &Client,
        url: &str,
        body: &Value,
    ) -> reqwest::RequestBuilder {
        let mut req = client.post(url).json(body);

        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }
        if let Some(ref org) = self.organization {
            req = req.header("OpenAI-Organization", org.as_str());
        }

        req
    }

    fn extract_text(json_resp: &Value) -> String {
        json_resp
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    /// Extract metadata from an OpenAI response.
    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let mut meta = serde_json::Map::new();
        for key in ["usage", "model", "id"] {
            if let Some(v) = json_resp.get(key) {
                meta.insert(key.into(), v.clone());
            }
        }
        if meta.is_empty() {
            None
        } else {
            Some(Value::Object(meta))
        }
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
        let body = Self::build_body(request);

        let resp = self.build_http_request(client, &url, &body).send().await?;
        let resp = error_for_status(resp).await?;
        let status = resp.status().as_u16();

        let json_resp: Value = resp.json().await?;
        Ok(LlmResponse {
            text: Self::extract_text(&json_resp),
            status,
            metadata: Self::extract_metadata(&json_resp),
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatMessage;
    use crate::config::LlmConfig;

    fn test_request() -> LlmRequest {
        LlmRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![
                ChatMessage::system("You list titles."),
                ChatMessage::user("context"),
                ChatMessage::user("format"),
            ],
            config: LlmConfig::default(),
        }
    }

    #[test]
    fn test_openai_chat_payload() {
        let body = OpenAiBackend::build_body(&test_request());
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], false);
        assert_eq!(body["max_tokens"], 2048);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "context");
    }

    #[test]
    fn test_custom_options_skipped() {
        let mut request = test_request();
        request.config.options = Some(json!({"seed": 42}));
        let body = OpenAiBackend::build_body(&request);
        assert!(body.get("seed").is_none());
        assert!(body.get("options").is_none());
    }

    #[test]
    fn test_auth_headers() {
        let backend = OpenAiBackend::new()
            .with_api_key("sk-test-key")
            .with_organization("org-1");
        let client = Client::new();
        let req = backend
            .build_http_request(&client, "http://localhost/v1/chat/completions", &json!({}))
            .build()
            .unwrap();
        assert_eq!(req.headers()["Authorization"], "Bearer sk-test-key");
        assert_eq!(req.headers()["OpenAI-Organization"], "org-1");
    }

    #[test]
    fn test_no_auth_header_without_key() {
        let client = Client::new();
        let req = OpenAiBackend::new()
            .build_http_request(&client, "http://localhost/v1/chat/completions", &json!({}))
            .build()
            .unwrap();
        assert!(req.headers().get("Authorization").is_none());
    }

    #[test]
    fn test_extract_text() {
        let resp = json!({
            "id": "cmpl-1",
            "choices": [{"message": {"role": "assistant", "content": "\"Alien\""}}],
            "usage": {"total_tokens": 10}
        });
        assert_eq!(OpenAiBackend::extract_text(&resp), "\"Alien\"");
        assert!(OpenAiBackend::extract_metadata(&resp).is_some());
        assert_eq!(OpenAiBackend::extract_text(&json!({"choices": []})), "");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let backend = OpenAiBackend::new().with_api_key("sk-1234567890");
        let debug = format!("{:?}", backend);
        assert!(debug.contains("sk-123***"));
        assert!(!debug.contains("4567890"));
    }
}
