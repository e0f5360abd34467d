//! Dataset indexer
//!
//! Loads the main dataset (`{"doc_1": ["text", ...], ...}`), splits every
//! text into token-bounded chunks, embeds them in batches and upserts them
//! into the vector store.

use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use ragflow_core::{Embedder, Error, IndexingResult, Result, VectorDocument, VectorStore};

use crate::splitter::TextSplitter;

/// Load the dataset as `(doc_id, texts)` pairs
pub async fn load_dataset(path: &Path) -> Result<Vec<(String, Vec<String>)>> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::DocumentIndexer(format!("Failed to read dataset {}: {}", path.display(), e))
    })?;
    parse_dataset(&raw)
}

fn parse_dataset(raw: &str) -> Result<Vec<(String, Vec<String>)>> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| Error::DocumentIndexer(format!("Dataset is not valid JSON: {}", e)))?;

    let serde_json::Value::Object(map) = value else {
        return Err(Error::DocumentIndexer(
            "Dataset must be a JSON object of document id to texts".to_string(),
        ));
    };

    map.into_iter()
        .map(|(doc_id, texts)| {
            let texts = match texts {
                serde_json::Value::String(s) => vec![s],
                serde_json::Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => Ok(s),
                        other => Err(Error::DocumentIndexer(format!(
                            "Document {} contains a non-string entry: {}",
                            doc_id, other
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?,
                other => {
                    return Err(Error::DocumentIndexer(format!(
                        "Document {} must be a string or a list of strings, got {}",
                        doc_id, other
                    )));
                }
            };
            Ok((doc_id, texts))
        })
        .collect()
}

/// Uploads documents into a vector store
pub struct DatasetIndexer<V: VectorStore, E: Embedder> {
    vector_store: Arc<V>,
    embedder: Arc<E>,
    splitter: TextSplitter,
    batch_size: usize,
}

impl<V: VectorStore, E: Embedder> DatasetIndexer<V, E> {
    /// Create a new indexer embedding 32 chunks per request
    pub fn new(vector_store: Arc<V>, embedder: Arc<E>, splitter: TextSplitter) -> Self {
        Self {
            vector_store,
            embedder,
            splitter,
            batch_size: 32,
        }
    }

    /// Number of chunks embedded per request
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Split the texts of one document into stored chunks
    pub fn chunk_document(&self, doc_id: &str, texts: &[String]) -> Vec<VectorDocument> {
        let mut chunks = Vec::new();
        for (source_index, text) in texts.iter().enumerate() {
            for content in self.splitter.split_text(text) {
                let chunk_index = chunks.len();
                chunks.push(VectorDocument {
                    id: format!("{}_{}", doc_id, chunk_index),
                    content,
                    embedding: None,
                    metadata: json!({
                        "doc_id": doc_id,
                        "source_index": source_index,
                        "chunk_index": chunk_index,
                    }),
                    score: None,
                });
            }
        }
        chunks
    }

    /// Index a single document made of several texts
    pub async fn index_document(&self, doc_id: &str, texts: &[String]) -> Result<IndexingResult> {
        let chunks = self.chunk_document(doc_id, texts);
        let mut result = IndexingResult::default();

        for batch in chunks.chunks(self.batch_size) {
            let contents: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();

            let stored = match self.embedder.embed_documents(&contents).await {
                Ok(vectors) => {
                    let points: Vec<VectorDocument> = batch
                        .iter()
                        .cloned()
                        .zip(vectors)
                        .map(|(mut chunk, vector)| {
                            chunk.embedding = Some(vector);
                            chunk
                        })
                        .collect();
                    self.vector_store.add_documents(points).await
                }
                Err(e) => Err(e),
            };

            match stored {
                Ok(ids) => result.chunks_indexed += ids.len(),
                Err(e) => {
                    result.chunks_failed += batch.len();
                    result
                        .errors
                        .push(format!("Failed to store chunks of {}: {}", doc_id, e));
                }
            }
        }

        if result.chunks_indexed > 0 {
            result.documents_indexed = 1;
        }
        tracing::debug!(doc_id, chunks = result.chunks_indexed, "indexed document");

        Ok(result)
    }

    /// Index every document of a loaded dataset
    pub async fn index_documents(
        &self,
        documents: &[(String, Vec<String>)],
    ) -> Result<IndexingResult> {
        let mut total = IndexingResult::default();

        for (position, (doc_id, texts)) in documents.iter().enumerate() {
            let result = self.index_document(doc_id, texts).await?;
            total.merge(result);

            if (position + 1) % 25 == 0 {
                tracing::info!("Uploaded {}/{} documents", position + 1, documents.len());
            }
        }

        Ok(total)
    }

    /// Create the collection if needed and upload the dataset file
    pub async fn index_dataset(&self, path: &Path) -> Result<IndexingResult> {
        self.vector_store.ensure_collection().await?;

        let documents = load_dataset(path).await?;
        tracing::info!("Uploading {} documents from {}", documents.len(), path.display());

        let result = self.index_documents(&documents).await?;
        tracing::info!(
            documents = result.documents_indexed,
            chunks = result.chunks_indexed,
            failed = result.chunks_failed,
            "Uploaded vectors to DB!"
        );

        Ok(result)
    }
}
