//! Qdrant vector store

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vector_output::Vector;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, PointId, PointStruct, ScoredPoint,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder, VectorsOutput,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use uuid::Uuid;

use ragflow_core::{Error, Result, SearchConfig, SearchResult, VectorDocument, VectorStore};

const UPSERT_BATCH_SIZE: usize = 64;

/// Vector store backed by a Qdrant collection
///
/// Points are stored with a `{page_content, metadata}` payload. Stored vectors
/// come back with search hits when `SearchConfig::with_vectors` is set.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection_name: String,
    embedding_dimension: u64,
}

impl QdrantVectorStore {
    /// Create a client for `qdrant_url`; the connection is opened lazily
    pub fn new(
        qdrant_url: &str,
        collection_name: &str,
        embedding_dimension: usize,
    ) -> Result<Self> {
        let client = Qdrant::from_url(qdrant_url)
            .build()
            .map_err(|e| Error::VectorStore(format!("Failed to create Qdrant client: {}", e)))?;

        Ok(Self {
            client,
            collection_name: collection_name.to_string(),
            embedding_dimension: embedding_dimension as u64,
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn to_point(&self, document: VectorDocument) -> Result<PointStruct> {
        let embedding = document.embedding.ok_or_else(|| {
            Error::VectorStore(format!("Document {} has no embedding", document.id))
        })?;
        if embedding.len() as u64 != self.embedding_dimension {
            return Err(Error::VectorStore(format!(
                "Embedding size {} does not match collection size {}",
                embedding.len(),
                self.embedding_dimension
            )));
        }

        let point_id = point_uuid(&document.id);
        let payload = Payload::try_from(json!({
            "id": document.id,
            "page_content": document.content,
            "metadata": document.metadata,
        }))
        .map_err(|e| Error::Serialization(e.to_string()))?;

        Ok(PointStruct::new(point_id.to_string(), embedding, payload))
    }
}

/// Qdrant only accepts UUIDs or integers as ids; other ids are hashed into a UUID
fn point_uuid(id: &str) -> Uuid {
    Uuid::parse_str(id).unwrap_or_else(|_| Uuid::from_bytes(md5::compute(id.as_bytes()).0))
}

fn point_id_to_string(id: Option<PointId>) -> String {
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => "unknown".to_string(),
    }
}

/// Convert a Qdrant payload value back into JSON
fn value_to_json(value: Value) -> serde_json::Value {
    match value.kind {
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => json!(i),
        Some(Kind::DoubleValue(d)) => json!(d),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(object)) => serde_json::Value::Object(
            object
                .fields
                .into_iter()
                .map(|(k, v)| (k, value_to_json(v)))
                .collect(),
        ),
    }
}

/// The unnamed dense vector of a point, if the response carried one
fn dense_vector(vectors: Option<VectorsOutput>) -> Option<Vec<f32>> {
    match vectors?.get_vector()? {
        Vector::Dense(dense) => Some(dense.data),
        _ => None,
    }
}

fn scored_point_to_document(point: ScoredPoint) -> VectorDocument {
    let point_id = point_id_to_string(point.id);
    let mut payload = point.payload;

    let content = match payload.remove("page_content").map(value_to_json) {
        Some(serde_json::Value::String(s)) => s,
        _ => String::new(),
    };
    let metadata = payload
        .remove("metadata")
        .map(value_to_json)
        .unwrap_or(serde_json::Value::Null);
    let id = match payload.remove("id").map(value_to_json) {
        Some(serde_json::Value::String(s)) => s,
        _ => point_id,
    };

    VectorDocument {
        id,
        content,
        embedding: dense_vector(point.vectors),
        metadata,
        score: Some(point.score),
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_collection(&self) -> Result<()> {
        let exists = self
            .client
            .collection_exists(self.collection_name.as_str())
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        if exists {
            tracing::warn!(
                "Qdrant collection `{}` already exists. Skipping collection creation.",
                self.collection_name
            );
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(self.collection_name.as_str()).vectors_config(
                    VectorParamsBuilder::new(self.embedding_dimension, Distance::Cosine),
                ),
            )
            .await
            .map_err(|e| Error::VectorStore(format!("Error creating Qdrant collection: {}", e)))?;

        tracing::info!("Qdrant collection {} is created!", self.collection_name);
        Ok(())
    }

    async fn add_documents(&self, documents: Vec<VectorDocument>) -> Result<Vec<String>> {
        let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        let points = documents
            .into_iter()
            .map(|d| self.to_point(d))
            .collect::<Result<Vec<_>>>()?;

        for batch in points.chunks(UPSERT_BATCH_SIZE) {
            let request =
                UpsertPointsBuilder::new(self.collection_name.as_str(), batch.to_vec()).wait(true);
            self.client
                .upsert_points(request)
                .await
                .map_err(|e| Error::VectorStore(format!("Upsert failed: {}", e)))?;
        }

        Ok(ids)
    }

    async fn search_by_vector(
        &self,
        vector: Vec<f32>,
        config: &SearchConfig,
    ) -> Result<SearchResult> {
        let mut request =
            SearchPointsBuilder::new(self.collection_name.as_str(), vector, config.top_k as u64)
                .with_payload(true)
                .with_vectors(config.with_vectors);
        if let Some(threshold) = config.score_threshold {
            request = request.score_threshold(threshold);
        }

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| Error::VectorStore(format!("Search failed: {}", e)))?;

        let documents: Vec<VectorDocument> = response
            .result
            .into_iter()
            .map(scored_point_to_document)
            .collect();
        let total = documents.len();

        Ok(SearchResult { documents, total })
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(self.collection_name.as_str()).exact(true))
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    async fn delete_collection(&self) -> Result<()> {
        tracing::info!("Clearing Qdrant collection {}...", self.collection_name);
        self.client
            .delete_collection(self.collection_name.as_str())
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;
        Ok(())
    }
}
