//! MMR retriever over a vector store

use async_trait::async_trait;
use std::sync::Arc;

use ragflow_core::{Document, Embedder, Result, Retriever, SearchConfig, VectorStore};

use crate::mmr::maximal_marginal_relevance;

/// Retrieves `k` diverse documents out of the `fetch_k` nearest neighbours
pub struct MmrRetriever<V: VectorStore, E: Embedder> {
    vector_store: Arc<V>,
    embedder: Arc<E>,
    k: usize,
    fetch_k: usize,
    lambda: f32,
}

impl<V: VectorStore, E: Embedder> MmrRetriever<V, E> {
    /// Create a retriever with `k = 4`, `fetch_k = 20`, `lambda = 0.5`
    pub fn new(vector_store: Arc<V>, embedder: Arc<E>) -> Self {
        Self {
            vector_store,
            embedder,
            k: 4,
            fetch_k: 20,
            lambda: 0.5,
        }
    }

    /// Number of documents returned
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self.fetch_k = self.fetch_k.max(k);
        self
    }

    /// Number of nearest neighbours considered
    pub fn with_fetch_k(mut self, fetch_k: usize) -> Self {
        self.fetch_k = fetch_k.max(self.k);
        self
    }

    /// Similarity/diversity trade-off, clamped into `[0.0, 1.0]`
    pub fn with_lambda(mut self, lambda: f32) -> Self {
        self.lambda = lambda.clamp(0.0, 1.0);
        self
    }
}

#[async_trait]
impl<V: VectorStore + 'static, E: Embedder + 'static> Retriever for MmrRetriever<V, E> {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        let query_vector = self.embedder.embed_query(query).await?;

        let config = SearchConfig {
            top_k: self.fetch_k,
            score_threshold: None,
            with_vectors: true,
        };
        let mut candidates = self
            .vector_store
            .search_by_vector(query_vector.clone(), &config)
            .await?
            .documents;

        if candidates.is_empty() {
            tracing::debug!("No candidates found for query");
            return Ok(Vec::new());
        }

        let missing: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.embedding.is_none())
            .map(|(i, _)| i)
            .collect();
        if !missing.is_empty() {
            let texts: Vec<String> = missing
                .iter()
                .map(|&i| candidates[i].content.clone())
                .collect();
            let vectors = self.embedder.embed_documents(&texts).await?;
            for (idx, vector) in missing.into_iter().zip(vectors) {
                candidates[idx].embedding = Some(vector);
            }
        }

        let vectors: Vec<Vec<f32>> = candidates
            .iter()
            .map(|c| c.embedding.clone().unwrap_or_default())
            .collect();
        let picked = maximal_marginal_relevance(&query_vector, &vectors, self.k, self.lambda);

        tracing::debug!(candidates = candidates.len(), picked = picked.len(), "MMR retrieval");

        let mut slots: Vec<Option<_>> = candidates.into_iter().map(Some).collect();
        Ok(picked
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .map(|mut doc| {
                doc.embedding = None;
                doc.into_document()
            })
            .collect())
    }
}
