//! LLM integration for ragflow
//!
//! This crate provides an OpenAI-compatible implementation of the `ChatModel`
//! and `Embedder` traits (llama.cpp server, vLLM, text-embeddings-inference, ...),
//! the prompt templates, and the grading chains used by the workflow.

mod client;
mod config;
mod embeddings;
mod evaluation;
mod prompts;


pub use client::OpenAiChatClient;
pub use config::{EmbedderConfig, LlmConfig};
pub use embeddings::OpenAiEmbedder;
pub use evaluation::{EvaluationChains, parse_evaluation};
pub use prompts::{PromptRole, PromptTemplate};

// Re-export core types for convenience
pub use ragflow_core::{
    ChatMessage, ChatModel, Embedder, Error, Evaluation, GenerationConfig, GenerationResult,
    Result, Role,
};
