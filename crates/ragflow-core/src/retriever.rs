//! Retriever trait

use async_trait::async_trait;

use crate::{Document, Result};

/// Anything that turns a question into a list of candidate documents
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>>;
}
