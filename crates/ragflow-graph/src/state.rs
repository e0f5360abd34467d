//! Workflow state

use serde::{Deserialize, Serialize};

use ragflow_core::{Document, Evaluation};

use crate::graph::Node;

/// State threaded through every node of the workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub question: String,
    pub solution: Option<String>,
    /// Set when the retrieved documents are not good enough on their own
    pub web_search: bool,
    pub documents: Vec<Document>,
    /// Grounding certainty of the last answer
    pub solution_evaluation: Option<f32>,
    /// Coverage certainty of the last answer, unset when grounding failed
    pub question_evaluation: Option<f32>,
    /// Grades of the retrieved documents, in retrieval order
    pub document_evaluations: Vec<Evaluation>,
    /// Nodes in execution order
    pub trace: Vec<Node>,
}

impl State {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    /// Whether the web search node ran at least once
    pub fn searched_online(&self) -> bool {
        self.trace.contains(&Node::SearchOnline)
    }

    /// How many times an answer was generated
    pub fn generations(&self) -> usize {
        self.trace
            .iter()
            .filter(|node| **node == Node::GenerateAnswer)
            .count()
    }
}
