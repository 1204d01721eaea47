//! OpenAI-compatible reasoning delegate.
//!
//! Supports OpenAI, Azure OpenAI, Ollama, vLLM, LM Studio, and any
//! endpoint that follows the OpenAI chat completions API format.

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

/// OpenAI-compatible chat completions client with a bounded request timeout.
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    timeout_secs: u64,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider from configuration.
    ///
    /// Reads the API key from `config.api_key`, falling back to the environment
    /// variable named by `config.api_key_env`.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let is_local = config
            .base_url
            .as_ref()
            .map(|u| u.contains("localhost") || u.contains("127.0.0.1"))
            .unwrap_or(false);

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(&config.api_key_env).ok())
            .or_else(|| {
                if is_local {
                    // Local servers don't require an API key
                    debug!("No API key set for local provider; using dummy bearer token");
                    Some("local".to_string())
                } else {
                    None
                }
            })
            .ok_or_else(|| LlmError::AuthFailed {
                provider: format!(
                    "OpenAI-compatible: env var '{}' not set",
                    config.api_key_env
                ),
            })?;
        Self::new_with_key(config, api_key)
    }

    /// Create a new provider with an explicitly provided API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Convert internal messages to OpenAI JSON format.
    fn messages_to_json(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                };
                json!({ "role": role, "content": msg.content })
            })
            .collect()
    }

    /// Build the request body for a completion.
    fn request_body(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let mut body = json!({
            "model": model,
            "messages": Self::messages_to_json(&request.messages),
            "stream": false,
        });
        // Reasoning models reject temperature and use a different token cap field
        if is_reasoning_model(model) {
            body["max_completion_tokens"] = json!(request.max_tokens.unwrap_or(self.max_tokens));
        } else {
            body["temperature"] = json!(request.temperature);
            body["max_tokens"] = json!(request.max_tokens.unwrap_or(self.max_tokens));
        }
        body
    }

    fn parse_response(body: &Value, model: &str) -> Result<CompletionResponse, LlmError> {
        let choice =
            body.get("choices")
                .and_then(|c| c.get(0))
                .ok_or_else(|| LlmError::ResponseParse {
                    message: "No choices in response".to_string(),
                })?;

        let text = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| LlmError::ResponseParse {
                message: "No message content in choice".to_string(),
            })?;

        let finish_reason = choice
            .get("finish_reason")
            .and_then(|f| f.as_str())
            .map(|s| s.to_string());

        let usage = body
            .get("usage")
            .map(|u| TokenUsage {
                input_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
                output_tokens: u
                    .get("completion_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as usize,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            message: Message::assistant(text),
            usage,
            model: body
                .get("model")
                .and_then(|m| m.as_str())
                .unwrap_or(model)
                .to_string(),
            finish_reason,
        })
    }

    fn map_http_error(status: reqwest::StatusCode, body: &str) -> LlmError {
        match status.as_u16() {
            401 => {
                debug!(body = %body, "Authentication failed (401)");
                LlmError::AuthFailed {
                    provider: "OpenAI-compatible".to_string(),
                }
            }
            status if status >= 500 => LlmError::ApiRequest {
                message: format!("Server error ({}): {}", status, body),
            },
            _ => LlmError::ApiRequest {
                message: format!("HTTP {}: {}", status, body),
            },
        }
    }
}

/// o1/o3-style reasoning models.
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("o1") || model.starts_with("o3") || model.starts_with("o4")
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(&request);

        debug!(url = %url, model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    LlmError::ApiRequest {
                        message: format!("Request failed: {}", e),
                    }
                }
            })?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| LlmError::ApiRequest {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &response_body));
        }

        let json: Value =
            serde_json::from_str(&response_body).map_err(|e| LlmError::ResponseParse {
                message: format!("Invalid JSON: {}", e),
            })?;

        Self::parse_response(&json, &self.model)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(model: &str) -> OpenAiCompatibleProvider {
        let config = LlmConfig {
            model: model.into(),
            base_url: Some("http://localhost:11434/v1/".into()),
            ..Default::default()
        };
        OpenAiCompatibleProvider::new(&config).unwrap()
    }

    #[test]
    fn test_local_provider_needs_no_key() {
        let p = provider("llama3.1:8b");
        assert_eq!(p.base_url, "http://localhost:11434/v1");
        assert_eq!(p.model_name(), "llama3.1:8b");
    }

    #[test]
    fn test_missing_key_is_auth_error() {
        let config = LlmConfig {
            api_key_env: "ULTRON_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..Default::default()
        };
        assert!(matches!(
            OpenAiCompatibleProvider::new(&config),
            Err(LlmError::AuthFailed { .. })
        ));
    }

    #[test]
    fn test_request_body_reasoning_model() {
        let p = provider("o1-mini");
        let body = p.request_body(&CompletionRequest::from_prompt("hi"));
        assert_eq!(body["model"], "o1-mini");
        assert!(body.get("temperature").is_none());
        assert_eq!(body["max_completion_tokens"], 2048);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_request_body_chat_model() {
        let p = provider("gpt-4o-mini");
        let body = p.request_body(&CompletionRequest::from_prompt("hi"));
        assert!(body.get("temperature").is_some());
        assert_eq!(body["max_tokens"], 2048);
    }

    #[test]
    fn test_parse_response() {
        let body = json!({
            "model": "o1-mini-2024-09-12",
            "choices": [{
                "message": {"role": "assistant", "content": " pirate "},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 40, "completion_tokens": 2}
        });
        let resp = OpenAiCompatibleProvider::parse_response(&body, "o1-mini").unwrap();
        assert_eq!(resp.text(), "pirate");
        assert_eq!(resp.model, "o1-mini-2024-09-12");
        assert_eq!(resp.usage.total(), 42);
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_parse_response_without_choices() {
        let err = OpenAiCompatibleProvider::parse_response(&json!({}), "m").unwrap_err();
        assert!(matches!(err, LlmError::ResponseParse { .. }));
    }

    #[test]
    fn test_map_http_error() {
        let err = OpenAiCompatibleProvider::map_http_error(
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            "overloaded",
        );
        assert_eq!(
            err.to_string(),
            "API request failed: Server error (503): overloaded"
        );
        assert!(matches!(
            OpenAiCompatibleProvider::map_http_error(reqwest::StatusCode::UNAUTHORIZED, ""),
            LlmError::AuthFailed { .. }
        ));
        assert_eq!(
            OpenAiCompatibleProvider::map_http_error(reqwest::StatusCode::BAD_REQUEST, "nope")
                .to_string(),
            "API request failed: HTTP 400: nope"
        );
    }
}
