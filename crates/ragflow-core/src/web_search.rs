//! Web search trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Document, Result};

/// A single organic search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub href: String,
    pub body: String,
}

impl SearchHit {
    /// Turn the snippet into a workflow document
    pub fn into_document(self) -> Document {
        Document::new(self.body.trim()).with_metadata(serde_json::json!({
            "source": "web",
            "title": self.title,
            "url": self.href,
        }))
    }
}

/// Trait for text web search backends
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}
