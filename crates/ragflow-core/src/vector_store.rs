//! Vector store trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Document, Result};

/// A point stored in the vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDocument {
    pub id: String,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub metadata: serde_json::Value,
    pub score: Option<f32>,
}

impl VectorDocument {
    /// Convert into a workflow document, keeping the similarity score in the metadata
    pub fn into_document(self) -> Document {
        let mut metadata = match self.metadata {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("metadata".to_string(), other);
                map
            }
        };
        metadata.insert("id".to_string(), self.id.into());
        metadata
            .entry("source")
            .or_insert_with(|| "vector_store".into());
        if let Some(score) = self.score {
            metadata.insert("score".to_string(), score.into());
        }

        Document {
            page_content: self.content,
            metadata: serde_json::Value::Object(metadata),
        }
    }
}

/// Search result from vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub documents: Vec<VectorDocument>,
    pub total: usize,
}

/// Configuration for vector search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub top_k: usize,
    pub score_threshold: Option<f32>,
    /// Ask the store to return stored vectors alongside the payload
    pub with_vectors: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            score_threshold: None,
            with_vectors: false,
        }
    }
}

/// Trait for vector stores (e.g., Qdrant, in-memory)
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the backing collection if it does not exist yet
    async fn ensure_collection(&self) -> Result<()>;

    /// Store documents with precomputed embeddings, returning their ids
    async fn add_documents(&self, documents: Vec<VectorDocument>) -> Result<Vec<String>>;

    /// Search using a vector embedding
    async fn search_by_vector(
        &self,
        vector: Vec<f32>,
        config: &SearchConfig,
    ) -> Result<SearchResult>;

    /// Get the total number of stored points
    async fn count(&self) -> Result<usize>;

    /// Drop the whole collection
    async fn delete_collection(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_document_keeps_metadata_and_score() {
        let doc = VectorDocument {
            id: "abc".to_string(),
            content: "Vaccines train the immune system".to_string(),
            embedding: None,
            metadata: json!({"doc_id": "doc_1"}),
            score: Some(0.5),
        };

        let document = doc.into_document();
        assert_eq!(document.page_content, "Vaccines train the immune system");
        assert_eq!(document.metadata["doc_id"], "doc_1");
        assert_eq!(document.metadata["id"], "abc");
        assert_eq!(document.metadata["score"], 0.5);
        assert_eq!(document.source(), Some("vector_store"));
    }

    #[test]
    fn test_into_document_wraps_scalar_metadata() {
        let doc = VectorDocument {
            id: "1".to_string(),
            content: "x".to_string(),
            embedding: None,
            metadata: json!("legacy"),
            score: None,
        };

        let document = doc.into_document();
        assert_eq!(document.metadata["metadata"], "legacy");
        assert!(document.metadata.get("score").is_none());
    }
}
