//! OpenAI-compatible chat completion client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use ragflow_core::{ChatMessage, ChatModel, Error, GenerationConfig, GenerationResult, Result};

use crate::config::LlmConfig;

/// Chat client for any server exposing `/v1/chat/completions`
pub struct OpenAiChatClient {
    config: LlmConfig,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "no_stop_sequences")]
    stop: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a serde_json::Value>,
    stream: bool,
}

fn no_stop_sequences(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u32,
}

/// Map a transport failure, keeping client-side timeouts distinct from network errors
pub(crate) fn request_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Network(e.to_string())
    }
}

pub(crate) fn body_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Serialization(e.to_string())
    }
}

impl OpenAiChatClient {
    /// Create a new client from configuration
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Create a generation config preset for this client's model
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            model_id: self.config.model_name.clone(),
            timeout: self.config.timeout,
            ..Default::default()
        }
    }

    /// Perform the actual completion request
    async fn perform_completion(
        &self,
        messages: &[ChatMessage],
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        let model = if config.model_id.is_empty() {
            self.config.model_name.as_str()
        } else {
            config.model_id.as_str()
        };

        let request_body = ChatRequest {
            model,
            messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            stop: &config.stop_sequences,
            response_format: config.response_format.as_ref(),
            stream: false,
        };

        let response = self
            .client
            .post(self.config.chat_url())
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::LLMProvider(format!(
                "Chat completion request failed with status {}: {}",
                status, error_text
            )));
        }

        let body: ChatResponse = response.json().await.map_err(body_error)?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                Error::LLMProvider("Empty response from chat completion API".to_string())
            })?;

        Ok(GenerationResult {
            text,
            model_id: model.to_string(),
            tokens_used: body.usage.map(|u| u.total_tokens),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        tracing::debug!(
            model = %self.config.model_name,
            messages = messages.len(),
            "chat completion"
        );

        match timeout(config.timeout, self.perform_completion(messages, config)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "Chat completion timed out after {:?}",
                config.timeout
            ))),
        }
    }

    fn model_id(&self) -> &str {
        &self.config.model_name
    }
}
