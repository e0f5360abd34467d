//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use ragflow_core::AppSettings;

/// Configuration for the chat completion client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model_name: String,
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl LlmConfig {
    /// Create configuration with explicit values
    pub fn new(model_name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            api_key: AppSettings::DEFAULT_LLM_API_KEY.to_string(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Create configuration from application settings
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            model_name: settings.llm_model_name.clone(),
            api_key: settings.llm_api_key.clone(),
            base_url: settings.llm_base_url.clone(),
            timeout: settings.request_timeout,
        }
    }

    /// Full URL of the chat completions endpoint
    pub fn chat_url(&self) -> String {
        endpoint(&self.base_url, "chat/completions")
    }
}

/// Configuration for the embeddings client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    pub model_name: String,
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub base_url: String,
    pub dimension: usize,
    pub normalize: bool,
    pub passage_prefix: String,
    pub query_prefix: String,
    pub timeout: Duration,
}

impl EmbedderConfig {
    /// Create configuration with explicit values and e5-style prefixes
    pub fn new(
        model_name: impl Into<String>,
        base_url: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            api_key: AppSettings::DEFAULT_LLM_API_KEY.to_string(),
            base_url: base_url.into(),
            dimension,
            normalize: true,
            passage_prefix: "passage: ".to_string(),
            query_prefix: "query: ".to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Create configuration from application settings
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            model_name: settings.encoder_model_name.clone(),
            api_key: settings.llm_api_key.clone(),
            base_url: settings.encoder_base_url.clone(),
            dimension: settings.embedding_size,
            normalize: settings.normalize_embeddings,
            passage_prefix: settings.passage_prefix.clone(),
            query_prefix: settings.query_prefix.clone(),
            timeout: settings.request_timeout,
        }
    }

    /// Full URL of the embeddings endpoint
    pub fn embeddings_url(&self) -> String {
        endpoint(&self.base_url, "embeddings")
    }
}

/// Join an OpenAI-style path onto a base URL that may or may not end in `/v1`
fn endpoint(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{}/{}", base, path)
    } else {
        format!("{}/v1/{}", base, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_url() {
        let config = LlmConfig::new("m", "http://127.0.0.1:8080");
        assert_eq!(config.chat_url(), "http://127.0.0.1:8080/v1/chat/completions");

        let config = LlmConfig::new("m", "https://api.openai.com/v1/");
        assert_eq!(config.chat_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_embeddings_url() {
        let config = EmbedderConfig::new("e5", "http://localhost:8081/", 1024);
        assert_eq!(config.embeddings_url(), "http://localhost:8081/v1/embeddings");
    }
}
