//! LLM grading chains
//!
//! Each chain renders a prompt, calls the chat model and parses the reply.
//! Graders ask for structured output, but small local models do not always
//! honour `response_format`, so replies are parsed leniently.

use serde_json::{Value, json};

use ragflow_core::{ChatModel, Document, Error, Evaluation, GenerationConfig, Result};

use crate::prompts::PromptRole;

/// Grading and answering chains over a single chat model
pub struct EvaluationChains<M: ChatModel> {
    model: M,
    grader_config: GenerationConfig,
    answer_config: GenerationConfig,
}

impl<M: ChatModel> EvaluationChains<M> {
    /// Create chains with default generation settings for the model
    pub fn new(model: M) -> Self {
        let base = GenerationConfig {
            model_id: model.model_id().to_string(),
            ..Default::default()
        };
        Self::with_config(model, base)
    }

    /// Create chains from a base generation config
    pub fn with_config(model: M, base: GenerationConfig) -> Self {
        let grader_config = GenerationConfig {
            max_tokens: 128,
            temperature: Some(0.0),
            response_format: Some(evaluation_response_format()),
            ..base.clone()
        };
        let answer_config = GenerationConfig {
            response_format: None,
            ..base
        };

        Self {
            model,
            grader_config,
            answer_config,
        }
    }

    /// The underlying chat model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Grade the relevance of a retrieved document to the question
    pub async fn evaluate_retrieved_doc(
        &self,
        question: &str,
        document: &str,
    ) -> Result<Evaluation> {
        self.grade(
            PromptRole::RetrievalEvaluation,
            &[("question", question), ("document", document)],
        )
        .await
    }

    /// Grade whether a solution is grounded in the documents
    pub async fn evaluate_solution(
        &self,
        documents: &[Document],
        solution: &str,
    ) -> Result<Evaluation> {
        let documents = format_documents(documents);
        self.grade(
            PromptRole::SolutionEvaluation,
            &[("documents", documents.as_str()), ("solution", solution)],
        )
        .await
    }

    /// Grade whether a solution addresses the question
    pub async fn evaluate_question(&self, question: &str, solution: &str) -> Result<Evaluation> {
        self.grade(
            PromptRole::QuestionEvaluation,
            &[("question", question), ("solution", solution)],
        )
        .await
    }

    /// Generate the final answer from the collected context
    pub async fn generate_answer(&self, documents: &[Document], question: &str) -> Result<String> {
        let context = format_documents(documents);
        let messages = PromptRole::AnswerGeneration
            .template()
            .render(&[("context", context.as_str()), ("question", question)])?;

        let result = self.model.complete(&messages, &self.answer_config).await?;
        Ok(result.text.trim().to_string())
    }

    async fn grade(&self, role: PromptRole, variables: &[(&str, &str)]) -> Result<Evaluation> {
        let messages = role.template().render_grader(variables)?;
        let result = self.model.complete(&messages, &self.grader_config).await?;

        let evaluation = parse_evaluation(&result.text)?;
        tracing::debug!(
            grader = role.name(),
            score = evaluation.score,
            relevance = evaluation.relevance_score,
            "graded"
        );
        Ok(evaluation)
    }
}

/// JSON schema `response_format` for the grader output
fn evaluation_response_format() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "evaluation",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "score": {"type": "boolean"},
                    "relevance_score": {"type": "number", "minimum": 0.0, "maximum": 1.0}
                },
                "required": ["score", "relevance_score"],
                "additionalProperties": false
            }
        }
    })
}

/// Join document contents into a prompt-ready context block
pub(crate) fn format_documents(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|d| d.page_content.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Parse a grader reply into an `Evaluation`
pub fn parse_evaluation(text: &str) -> Result<Evaluation> {
    let trimmed = strip_code_fence(text.trim());

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return evaluation_from_object(&map);
    }

    if let Some(object) = first_json_object(trimmed) {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(object) {
            return evaluation_from_object(&map);
        }
    }

    match parse_verdict(trimmed) {
        Some(score) => Ok(Evaluation::new(score, 0.5)),
        None => Err(Error::Serialization(format!(
            "Could not parse grader output: {}",
            text
        ))),
    }
}

fn evaluation_from_object(map: &serde_json::Map<String, Value>) -> Result<Evaluation> {
    let score = match map.get("score") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => parse_verdict(s).ok_or_else(|| {
            Error::Serialization(format!("Invalid grader score: {}", s))
        })?,
        Some(other) => {
            return Err(Error::Serialization(format!("Invalid grader score: {}", other)));
        }
        None => return Err(Error::Serialization("Grader output has no score".to_string())),
    };

    let relevance_score = match map.get("relevance_score") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.5) as f32,
        Some(Value::String(s)) => s.trim().parse::<f32>().unwrap_or(0.5),
        _ => 0.5,
    };

    Ok(Evaluation::new(score, relevance_score))
}

fn parse_verdict(text: &str) -> Option<bool> {
    let word: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase();

    match word.as_str() {
        "yes" | "true" => Some(true),
        "no" | "false" => Some(false),
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Slice of the first balanced `{...}` in `text`, honouring JSON strings
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
