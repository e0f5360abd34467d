//! Embedding model trait

use async_trait::async_trait;

use crate::Result;

/// Trait for text embedding models
///
/// Documents and queries are embedded separately so asymmetric models
/// (e5 and friends) can apply their own prefixes.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed passages that will be stored in the vector store
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Size of the produced vectors
    fn dimension(&self) -> usize;
}
