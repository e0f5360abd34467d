//! Corrective RAG workflow for ragflow
//!
//! The graph routes a question through document retrieval, relevance grading,
//! an optional web search and answer generation. Generated answers are graded
//! for grounding and coverage; failures loop back to generation or to the web
//! search until the answer passes or the recursion limit is hit.

mod graph;
mod state;
mod workflow;

#[cfg(test)]
mod tests;

pub use graph::{Edge, Endpoint, Node, Route, WorkflowGraph};
pub use state::State;
pub use workflow::{
    ANSWER_GRADE_THRESHOLD, DOCUMENT_RELEVANCE_THRESHOLD, RagWorkflow, WEB_SEARCH_RATIO,
};

// Re-export core types for convenience
pub use ragflow_core::{Document, Error, Evaluation, Result};
