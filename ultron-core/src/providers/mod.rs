//! Reasoning delegate implementations.
//!
//! Provides an implementation of the `LlmProvider` trait for OpenAI-compatible
//! APIs (OpenAI, Azure, Ollama, vLLM, LM Studio). Use `create_provider()` to
//! instantiate a delegate from config.

pub mod openai_compat;

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use std::sync::Arc;

pub use openai_compat::OpenAiCompatibleProvider;

/// Create the reasoning delegate described by `config`.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.provider.as_str() {
        "openai" | "local" | "ollama" | "azure" | "vllm" | "lmstudio" => {
            let provider = OpenAiCompatibleProvider::new(config)?;
            tracing::info!(
                provider = %config.provider,
                model = %config.model,
                timeout_secs = config.timeout_secs,
                "Reasoning delegate initialized"
            );
            Ok(Arc::new(provider))
        }
        other => Err(LlmError::UnsupportedProvider {
            provider: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_unknown() {
        let config = LlmConfig {
            provider: "carrier-pigeon".into(),
            ..Default::default()
        };
        match create_provider(&config) {
            Err(LlmError::UnsupportedProvider { provider }) => {
                assert_eq!(provider, "carrier-pigeon")
            }
            _ => panic!("expected UnsupportedProvider"),
        }
    }

    #[test]
    fn test_create_provider_with_explicit_key() {
        let config = LlmConfig {
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "o1-mini");
    }
}
