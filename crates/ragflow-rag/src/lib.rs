//! Retrieval components for ragflow
//!
//! This crate provides vector store implementations (Qdrant and in-memory),
//! a token-aware text splitter, the MMR retriever, the dataset indexer and
//! a DuckDuckGo web search backend.

mod indexer;
mod local_store;
mod mmr;
mod qdrant_store;
mod retriever;
mod splitter;
mod web_search;


pub use indexer::{DatasetIndexer, load_dataset};
pub use local_store::LocalVectorStore;
pub use mmr::{cosine_similarity, maximal_marginal_relevance};
pub use qdrant_store::QdrantVectorStore;
pub use retriever::MmrRetriever;
pub use splitter::TextSplitter;
pub use web_search::DuckDuckGoSearch;

// Re-export core types for convenience
pub use ragflow_core::{
    Document, Embedder, Error, IndexingResult, Result, Retriever, SearchConfig, SearchHit,
    SearchResult, VectorDocument, VectorStore, WebSearch,
};
