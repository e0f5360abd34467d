//! Workflow runner

use futures::future::try_join_all;
use ragflow_core::{ChatModel, Error, Result, Retriever, WebSearch};
use ragflow_llm::EvaluationChains;

use crate::graph::{Node, Route, WorkflowGraph};
use crate::state::State;

/// Minimum relevance for a retrieved document to be kept
pub const DOCUMENT_RELEVANCE_THRESHOLD: f32 = 0.75;
/// Below this share of kept documents the workflow searches online
pub const WEB_SEARCH_RATIO: f32 = 0.7;
/// Relevance an answer grade must exceed to pass
pub const ANSWER_GRADE_THRESHOLD: f32 = 0.65;

const DEFAULT_RECURSION_LIMIT: usize = 10;
const DEFAULT_SEARCH_RESULTS: usize = 5;

/// Corrective RAG workflow
pub struct RagWorkflow<R: Retriever, M: ChatModel, W: WebSearch> {
    retriever: R,
    chains: EvaluationChains<M>,
    web_search: W,
    k_search_results: usize,
    recursion_limit: usize,
    graph: WorkflowGraph,
}

impl<R: Retriever, M: ChatModel, W: WebSearch> RagWorkflow<R, M, W> {
    pub fn new(retriever: R, chains: EvaluationChains<M>, web_search: W) -> Self {
        Self {
            retriever,
            chains,
            web_search,
            k_search_results: DEFAULT_SEARCH_RESULTS,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            graph: WorkflowGraph::rag_workflow(),
        }
    }

    /// Number of web results added per online search
    pub fn with_search_results(mut self, k: usize) -> Self {
        self.k_search_results = k;
        self
    }

    /// Maximum number of node executions per run
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    /// Run the workflow with the configured recursion limit
    pub async fn invoke(&self, question: &str) -> Result<State> {
        self.invoke_with_limit(question, self.recursion_limit).await
    }

    /// Run the workflow, failing once more than `limit` nodes have run
    pub async fn invoke_with_limit(&self, question: &str, limit: usize) -> Result<State> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("Question must not be empty".to_string()));
        }

        let mut state = State::new(question);
        let mut next = Some(Node::RetrieveDocuments);
        let mut step = 0;

        while let Some(node) = next {
            step += 1;
            if step > limit {
                tracing::warn!(limit, "Recursion limit reached");
                return Err(Error::RecursionLimit { limit });
            }

            tracing::info!(step, node = node.name(), "Running node");
            state.trace.push(node);
            next = self.run_node(node, &mut state).await?;
            tracing::debug!(
                step,
                node = node.name(),
                documents = state.documents.len(),
                web_search = state.web_search,
                "Node finished"
            );
        }

        Ok(state)
    }

    async fn run_node(&self, node: Node, state: &mut State) -> Result<Option<Node>> {
        match node {
            Node::RetrieveDocuments => {
                self.retrieve(state).await;
                Ok(Some(Node::EvaluateDocuments))
            }
            Node::EvaluateDocuments => {
                self.evaluate(state).await?;
                Ok(Some(if state.web_search {
                    Node::SearchOnline
                } else {
                    Node::GenerateAnswer
                }))
            }
            Node::SearchOnline => {
                self.search_online(state).await;
                Ok(Some(Node::GenerateAnswer))
            }
            Node::GenerateAnswer => {
                self.generate_answer(state).await?;
                let route = self.check_solution(state).await?;
                tracing::info!(route = route.label(), "Answer graded");
                Ok(route.target())
            }
        }
    }

    async fn retrieve(&self, state: &mut State) {
        match self.retriever.retrieve(&state.question).await {
            Ok(documents) => state.documents = documents,
            Err(e) => {
                tracing::warn!("Retrieval failed, falling back to web search: {}", e);
                state.documents.clear();
                state.web_search = true;
            }
        }
    }

    async fn evaluate(&self, state: &mut State) -> Result<()> {
        let total = state.documents.len();
        let evaluations = try_join_all(state.documents.iter().map(|document| {
            self.chains
                .evaluate_retrieved_doc(&state.question, &document.page_content)
        }))
        .await?;

        let kept: Vec<_> = std::mem::take(&mut state.documents)
            .into_iter()
            .zip(&evaluations)
            .filter(|(_, evaluation)| evaluation.relevance_score >= DOCUMENT_RELEVANCE_THRESHOLD)
            .map(|(document, _)| document)
            .collect();

        let ratio = if total == 0 {
            0.0
        } else {
            kept.len() as f32 / total as f32
        };
        tracing::debug!(kept = kept.len(), total, ratio, "Documents graded");

        state.web_search = ratio < WEB_SEARCH_RATIO;
        state.documents = kept;
        state.document_evaluations = evaluations;
        Ok(())
    }

    async fn search_online(&self, state: &mut State) {
        match self
            .web_search
            .search(&state.question, self.k_search_results)
            .await
        {
            Ok(hits) => {
                tracing::debug!(hits = hits.len(), "Web search results added");
                state
                    .documents
                    .extend(hits.into_iter().map(|hit| hit.into_document()));
            }
            Err(e) => tracing::warn!("Web search failed, keeping current documents: {}", e),
        }
    }

    async fn generate_answer(&self, state: &mut State) -> Result<()> {
        let solution = self
            .chains
            .generate_answer(&state.documents, &state.question)
            .await?;
        state.solution = Some(solution);
        Ok(())
    }

    /// Grade the last answer for grounding, then for coverage
    async fn check_solution(&self, state: &mut State) -> Result<Route> {
        let solution = state.solution.clone().unwrap_or_default();

        let grounding = self
            .chains
            .evaluate_solution(&state.documents, &solution)
            .await?;
        state.solution_evaluation = Some(grounding.relevance_score);

        if !grounding.passes(ANSWER_GRADE_THRESHOLD) {
            state.question_evaluation = None;
            return Ok(Route::HallucinationsDetected);
        }

        let coverage = self
            .chains
            .evaluate_question(&state.question, &solution)
            .await?;
        state.question_evaluation = Some(coverage.relevance_score);

        Ok(if coverage.passes(ANSWER_GRADE_THRESHOLD) {
            Route::AnswersQuestion
        } else {
            Route::QuestionNotAddressed
        })
    }
}
