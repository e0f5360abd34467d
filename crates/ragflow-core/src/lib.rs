//! Core traits and types for ragflow
//!
//! This crate defines the fundamental traits and types shared by the ragflow crates.
//! The chat model, embedder, vector store, retriever and web search are all
//! capability-facing traits, so the workflow can be driven by real services or
//! by in-process test doubles.

pub mod document;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod retriever;
pub mod settings;
pub mod types;
pub mod vector_store;
pub mod web_search;

pub use document::Document;
pub use embeddings::Embedder;
pub use error::{Error, Result};
pub use llm::{ChatMessage, ChatModel, GenerationConfig, GenerationResult, Role};
pub use retriever::Retriever;
pub use settings::AppSettings;
pub use types::*;
pub use vector_store::{SearchConfig, SearchResult, VectorDocument, VectorStore};
pub use web_search::{SearchHit, WebSearch};
