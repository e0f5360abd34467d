//! Documents flowing through the workflow

use serde::{Deserialize, Serialize};

/// A piece of context: a retrieved chunk or a web search snippet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Document {
    /// Create a document without metadata
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Origin of the document, if recorded (`"vector_store"` or `"web"`)
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|s| s.as_str())
    }
}
