//! Prompt templates for grading and answer generation

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

use ragflow_core::{ChatMessage, Error, Result};

/// The four prompts the workflow uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptRole {
    RetrievalEvaluation,
    SolutionEvaluation,
    QuestionEvaluation,
    AnswerGeneration,
}

impl PromptRole {
    pub fn name(&self) -> &'static str {
        match self {
            PromptRole::RetrievalEvaluation => "retrieval_evaluation",
            PromptRole::SolutionEvaluation => "solution_evaluation",
            PromptRole::QuestionEvaluation => "question_evaluation",
            PromptRole::AnswerGeneration => "answer_generation",
        }
    }

    pub fn template(&self) -> PromptTemplate {
        match self {
            PromptRole::RetrievalEvaluation => {
                PromptTemplate::new(RETRIEVAL_SYSTEM, RETRIEVAL_HUMAN)
            }
            PromptRole::SolutionEvaluation => PromptTemplate::new(SOLUTION_SYSTEM, SOLUTION_HUMAN),
            PromptRole::QuestionEvaluation => PromptTemplate::new(QUESTION_SYSTEM, QUESTION_HUMAN),
            PromptRole::AnswerGeneration => PromptTemplate::new(ANSWER_SYSTEM, ANSWER_HUMAN),
        }
    }
}

const GRADER_FORMAT: &str = "Respond only with a JSON object of the form \
{\"score\": <true|false>, \"relevance_score\": <number between 0.0 and 1.0>}, \
where relevance_score is how certain you are of your verdict.";

const RETRIEVAL_SYSTEM: &str = "You are a grader assessing the relevance of a retrieved document to a user question. \
If the document contains keywords or meaning related to the question, grade it as relevant. \
The goal is to filter out erroneous retrievals; the test does not need to be stringent.";
const RETRIEVAL_HUMAN: &str = "Retrieved document:\n\n{document}\n\nUser question: {question}";

const SOLUTION_SYSTEM: &str = "You are a grader assessing whether an answer is grounded in and supported by a set of facts. \
Grade true if the answer is supported by the facts, false if it contains claims the facts do not support.";
const SOLUTION_HUMAN: &str = "Set of facts:\n\n{documents}\n\nAnswer: {solution}";

const QUESTION_SYSTEM: &str = "You are a grader assessing whether an answer addresses and resolves a question. \
Grade true if the answer resolves the question, false otherwise.";
const QUESTION_HUMAN: &str = "User question:\n\n{question}\n\nAnswer: {solution}";

const ANSWER_SYSTEM: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, say that you don't know. \
Use at most five sentences and keep the answer concise.";
const ANSWER_HUMAN: &str = "Context:\n\n{context}\n\nQuestion: {question}\n\nAnswer:";

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("valid placeholder regex"))
}

/// A system + human prompt pair with `{name}` placeholders
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    system: String,
    human: String,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>, human: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            human: human.into(),
        }
    }

    /// Names of all placeholders, in order of first appearance
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for text in [&self.system, &self.human] {
            for caps in placeholder_regex().captures_iter(text) {
                let name = caps[1].to_string();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Fill every placeholder and build the chat messages
    ///
    /// Substituted values are not scanned again, so user text containing
    /// braces is passed through verbatim.
    pub fn render(&self, variables: &[(&str, &str)]) -> Result<Vec<ChatMessage>> {
        let values: HashMap<&str, &str> = variables.iter().copied().collect();

        let missing: Vec<String> = self
            .placeholders()
            .into_iter()
            .filter(|name| !values.contains_key(name.as_str()))
            .collect();
        if !missing.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Missing prompt variables: {}",
                missing.join(", ")
            )));
        }

        let fill = |text: &str| {
            placeholder_regex()
                .replace_all(text, |caps: &Captures| {
                    values.get(&caps[1]).map(|v| v.to_string()).unwrap_or_default()
                })
                .trim()
                .to_string()
        };

        Ok(vec![
            ChatMessage::system(fill(&self.system)),
            ChatMessage::user(fill(&self.human)),
        ])
    }

    /// Same as `render`, with the grader output format appended to the system prompt
    pub fn render_grader(&self, variables: &[(&str, &str)]) -> Result<Vec<ChatMessage>> {
        let mut messages = self.render(variables)?;
        if let Some(system) = messages.first_mut() {
            system.content = format!("{}\n\n{}", system.content, GRADER_FORMAT);
        }
        Ok(messages)
    }
}
