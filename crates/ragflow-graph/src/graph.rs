//! Graph topology: nodes, routes and edges

use serde::{Deserialize, Serialize};
use std::fmt;

/// A step of the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Node {
    #[serde(rename = "Retrieve Documents")]
    RetrieveDocuments,
    #[serde(rename = "Evaluate Documents")]
    EvaluateDocuments,
    #[serde(rename = "Search Online")]
    SearchOnline,
    #[serde(rename = "Generate Answer")]
    GenerateAnswer,
}

impl Node {
    pub const ALL: [Node; 4] = [
        Node::RetrieveDocuments,
        Node::EvaluateDocuments,
        Node::SearchOnline,
        Node::GenerateAnswer,
    ];

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Node::RetrieveDocuments => "Retrieve Documents",
            Node::EvaluateDocuments => "Evaluate Documents",
            Node::SearchOnline => "Search Online",
            Node::GenerateAnswer => "Generate Answer",
        }
    }

    fn mermaid_id(&self) -> &'static str {
        match self {
            Node::RetrieveDocuments => "retrieve_documents",
            Node::EvaluateDocuments => "evaluate_documents",
            Node::SearchOnline => "search_online",
            Node::GenerateAnswer => "generate_answer",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of grading a generated answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    #[serde(rename = "Hallucinations detected")]
    HallucinationsDetected,
    #[serde(rename = "Answers Question")]
    AnswersQuestion,
    #[serde(rename = "Question not addressed")]
    QuestionNotAddressed,
}

impl Route {
    pub fn label(&self) -> &'static str {
        match self {
            Route::HallucinationsDetected => "Hallucinations detected",
            Route::AnswersQuestion => "Answers Question",
            Route::QuestionNotAddressed => "Question not addressed",
        }
    }

    /// Next node, `None` when the workflow ends
    pub fn target(&self) -> Option<Node> {
        match self {
            Route::HallucinationsDetected => Some(Node::GenerateAnswer),
            Route::AnswersQuestion => None,
            Route::QuestionNotAddressed => Some(Node::SearchOnline),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Start, end or a workflow node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    Node(Node),
    End,
}

impl Endpoint {
    fn mermaid_id(&self) -> &'static str {
        match self {
            Endpoint::Start => "__start__",
            Endpoint::Node(node) => node.mermaid_id(),
            Endpoint::End => "__end__",
        }
    }
}

impl From<Option<Node>> for Endpoint {
    fn from(node: Option<Node>) -> Self {
        node.map(Endpoint::Node).unwrap_or(Endpoint::End)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: Endpoint,
    pub to: Endpoint,
    /// Set for conditional edges
    pub label: Option<&'static str>,
    pub conditional: bool,
}

impl Edge {
    fn direct(from: Endpoint, to: Endpoint) -> Self {
        Self {
            from,
            to,
            label: None,
            conditional: false,
        }
    }

    fn conditional(from: Endpoint, to: Endpoint, label: Option<&'static str>) -> Self {
        Self {
            from,
            to,
            label,
            conditional: true,
        }
    }
}

/// Static description of the workflow graph
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    title: &'static str,
    edges: Vec<Edge>,
}

impl WorkflowGraph {
    /// The corrective RAG graph
    pub fn rag_workflow() -> Self {
        use Endpoint::{Node as N, Start};

        let mut edges = vec![
            Edge::direct(Start, N(Node::RetrieveDocuments)),
            Edge::direct(N(Node::RetrieveDocuments), N(Node::EvaluateDocuments)),
            Edge::conditional(N(Node::EvaluateDocuments), N(Node::SearchOnline), None),
            Edge::conditional(N(Node::EvaluateDocuments), N(Node::GenerateAnswer), None),
            Edge::direct(N(Node::SearchOnline), N(Node::GenerateAnswer)),
        ];
        for route in [
            Route::HallucinationsDetected,
            Route::AnswersQuestion,
            Route::QuestionNotAddressed,
        ] {
            edges.push(Edge::conditional(
                N(Node::GenerateAnswer),
                route.target().into(),
                Some(route.label()),
            ));
        }

        Self {
            title: "RAG Workflow",
            edges,
        }
    }

    pub fn title(&self) -> &str {
        self.title
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Endpoints reachable in one step from `from`
    pub fn successors(&self, from: Endpoint) -> Vec<Endpoint> {
        self.edges
            .iter()
            .filter(|e| e.from == from)
            .map(|e| e.to)
            .collect()
    }

    /// Render the graph as a Mermaid flowchart
    pub fn to_mermaid(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("---\ntitle: {}\n---\n", self.title));
        out.push_str("flowchart TD\n");

        out.push_str("    __start__([<p>__start__</p>]):::first\n");
        for node in Node::ALL {
            out.push_str(&format!("    {}({})\n", node.mermaid_id(), node.name()));
        }
        out.push_str("    __end__([<p>__end__</p>]):::last\n");

        for edge in &self.edges {
            let from = edge.from.mermaid_id();
            let to = edge.to.mermaid_id();
            let line = match (edge.conditional, edge.label) {
                (true, Some(label)) => {
                    format!("    {} -. &nbsp;{}&nbsp; .-> {}\n", from, label, to)
                }
                (true, None) => format!("    {} -.-> {}\n", from, to),
                (false, _) => format!("    {} --> {}\n", from, to),
            };
            out.push_str(&line);
        }

        out.push_str("    classDef default fill:#f2f0ff,line-height:1.2\n");
        out.push_str("    classDef first fill-opacity:0\n");
        out.push_str("    classDef last fill:#bfb6fc\n");
        out
    }
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::rag_workflow()
    }
}
