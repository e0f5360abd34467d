//! In-memory vector store

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use ragflow_core::{Error, Result, SearchConfig, SearchResult, VectorDocument, VectorStore};

use crate::mmr::cosine_similarity;

/// Local in-memory vector store implementation
pub struct LocalVectorStore {
    documents: Arc<RwLock<HashMap<String, VectorDocument>>>,
}

impl LocalVectorStore {
    /// Create a new local vector store
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for LocalVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn ensure_collection(&self) -> Result<()> {
        Ok(())
    }

    async fn add_documents(&self, documents: Vec<VectorDocument>) -> Result<Vec<String>> {
        // The batch is stored whole or not at all
        if let Some(document) = documents.iter().find(|d| d.embedding.is_none()) {
            return Err(Error::VectorStore(format!(
                "Document {} has no embedding",
                document.id
            )));
        }

        let mut docs = self
            .documents
            .write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        let ids = documents.iter().map(|d| d.id.clone()).collect();
        for document in documents {
            docs.insert(document.id.clone(), document);
        }

        Ok(ids)
    }

    async fn search_by_vector(
        &self,
        vector: Vec<f32>,
        config: &SearchConfig,
    ) -> Result<SearchResult> {
        let docs = self
            .documents
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        let mut results: Vec<VectorDocument> = docs
            .values()
            .filter_map(|doc| {
                let embedding = doc.embedding.as_ref()?;
                let score = cosine_similarity(&vector, embedding);
                let mut doc_with_score = doc.clone();
                doc_with_score.score = Some(score);
                if !config.with_vectors {
                    doc_with_score.embedding = None;
                }
                Some(doc_with_score)
            })
            .filter(|doc| match config.score_threshold {
                Some(threshold) => doc.score.unwrap_or(0.0) >= threshold,
                None => true,
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .total_cmp(&a.score.unwrap_or(0.0))
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(config.top_k);

        let total = results.len();
        Ok(SearchResult {
            documents: results,
            total,
        })
    }

    async fn count(&self) -> Result<usize> {
        let docs = self
            .documents
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        Ok(docs.len())
    }

    async fn delete_collection(&self) -> Result<()> {
        let mut docs = self
            .documents
            .write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        docs.clear();
        Ok(())
    }
}
