//! Offline evaluation runner
//!
//! Replays the questions of `eval_dataset.json` through the workflow and
//! aggregates the graders' verdicts into a JSON report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

use ragflow_core::{ChatModel, Error, Result, Retriever, WebSearch};
use ragflow_graph::{RagWorkflow, State};

#[derive(Debug, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct Conversation {
    domain_id: String,
    messages: Vec<Message>,
}

/// A question paired with the reference answer that followed it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalCase {
    pub domain_id: String,
    pub question: String,
    pub reference: Option<String>,
}

fn cases_from_conversations(conversations: Vec<Conversation>) -> Vec<EvalCase> {
    let mut cases = Vec::new();
    for conversation in conversations {
        let mut messages = conversation.messages.into_iter().peekable();
        while let Some(message) = messages.next() {
            if message.role != "user" || message.content.trim().is_empty() {
                continue;
            }
            let reference = messages
                .next_if(|next| next.role == "assistant")
                .map(|next| next.content);
            cases.push(EvalCase {
                domain_id: conversation.domain_id.clone(),
                question: message.content,
                reference,
            });
        }
    }
    cases
}

pub(crate) fn parse_eval_dataset(raw: &str) -> Result<Vec<EvalCase>> {
    let conversations: Vec<Conversation> = serde_json::from_str(raw)
        .map_err(|e| Error::InvalidInput(format!("Malformed evaluation dataset: {}", e)))?;
    Ok(cases_from_conversations(conversations))
}

/// Load `[{domain_id, messages: [{role, content}]}]` as evaluation cases
pub async fn load_eval_dataset(path: &Path) -> Result<Vec<EvalCase>> {
    let raw = tokio::fs::read_to_string(path).await?;
    parse_eval_dataset(&raw)
}

/// What happened to a single question
#[derive(Debug, Clone, Serialize)]
pub struct CaseOutcome {
    #[serde(flatten)]
    pub case: EvalCase,
    pub answer: Option<String>,
    pub answered: bool,
    pub solution_score: Option<f32>,
    pub question_score: Option<f32>,
    pub web_search: bool,
    pub generations: usize,
    pub error: Option<String>,
}

impl CaseOutcome {
    pub fn from_result(case: EvalCase, result: Result<State>) -> Self {
        match result {
            Ok(state) => Self {
                case,
                answered: state.solution.is_some(),
                solution_score: state.solution_evaluation,
                question_score: state.question_evaluation,
                web_search: state.searched_online(),
                generations: state.generations(),
                answer: state.solution,
                error: None,
            },
            Err(e) => Self {
                case,
                answer: None,
                answered: false,
                solution_score: None,
                question_score: None,
                web_search: false,
                generations: 0,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Aggregated grades over a set of outcomes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub questions: usize,
    pub answered: usize,
    pub answered_rate: f32,
    pub mean_solution_score: Option<f32>,
    pub mean_question_score: Option<f32>,
    /// Share of completed runs that searched online
    pub web_search_rate: f32,
    pub failures: usize,
}

fn mean(values: impl Iterator<Item = f32>) -> Option<f32> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f32)
}

impl Metrics {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a CaseOutcome>) -> Self {
        let outcomes: Vec<&CaseOutcome> = outcomes.into_iter().collect();
        let questions = outcomes.len();
        let answered = outcomes.iter().filter(|o| o.answered).count();
        let failures = outcomes.iter().filter(|o| o.error.is_some()).count();
        let completed = questions - failures;
        let searched = outcomes
            .iter()
            .filter(|o| o.error.is_none() && o.web_search)
            .count();

        Self {
            questions,
            answered,
            answered_rate: if questions == 0 {
                0.0
            } else {
                answered as f32 / questions as f32
            },
            mean_solution_score: mean(outcomes.iter().filter_map(|o| o.solution_score)),
            mean_question_score: mean(outcomes.iter().filter_map(|o| o.question_score)),
            web_search_rate: if completed == 0 {
                0.0
            } else {
                searched as f32 / completed as f32
            },
            failures,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub overall: Metrics,
    pub domains: BTreeMap<String, Metrics>,
    pub cases: Vec<CaseOutcome>,
}

impl EvaluationReport {
    pub fn new(started_at: DateTime<Utc>, cases: Vec<CaseOutcome>) -> Self {
        let mut by_domain: BTreeMap<String, Vec<&CaseOutcome>> = BTreeMap::new();
        for outcome in &cases {
            by_domain
                .entry(outcome.case.domain_id.clone())
                .or_default()
                .push(outcome);
        }
        let domains = by_domain
            .into_iter()
            .map(|(domain, outcomes)| (domain, Metrics::from_outcomes(outcomes)))
            .collect();

        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            overall: Metrics::from_outcomes(&cases),
            domains,
            cases,
        }
    }
}

/// Run every case through the workflow; per-question errors are recorded
pub async fn run_evaluation<R, M, W>(
    workflow: &RagWorkflow<R, M, W>,
    cases: Vec<EvalCase>,
) -> EvaluationReport
where
    R: Retriever,
    M: ChatModel,
    W: WebSearch,
{
    let started_at = Utc::now();
    let total = cases.len();
    let mut outcomes = Vec::with_capacity(total);

    for (position, case) in cases.into_iter().enumerate() {
        tracing::info!(
            "[{}/{}] {}: {}",
            position + 1,
            total,
            case.domain_id,
            case.question
        );
        let result = workflow.invoke(&case.question).await;
        if let Err(e) = &result {
            tracing::warn!("Question failed: {}", e);
        }
        outcomes.push(CaseOutcome::from_result(case, result));
    }

    EvaluationReport::new(started_at, outcomes)
}

/// Write the report as pretty JSON, creating parent directories
pub async fn write_report(report: &EvaluationReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_questions_with_references() {
        let cases = parse_eval_dataset(
            r#"[
                {"domain_id": "vaccines", "messages": [
                    {"role": "user", "content": "Q1"},
                    {"role": "assistant", "content": "A1"},
                    {"role": "user", "content": "Q2"}
                ]},
                {"domain_id": "weather", "messages": [
                    {"role": "system", "content": "ignored"},
                    {"role": "user", "content": "Q3"},
                    {"role": "assistant", "content": "A3"}
                ]}
            ]"#,
        )
        .unwrap();

        let summary: Vec<(&str, &str, Option<&str>)> = cases
            .iter()
            .map(|c| (c.domain_id.as_str(), c.question.as_str(), c.reference.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("vaccines", "Q1", Some("A1")),
                ("vaccines", "Q2", None),
                ("weather", "Q3", Some("A3")),
            ]
        );
    }

    #[test]
    fn test_malformed_dataset() {
        let err = parse_eval_dataset(r#"{"domain_id": "x"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean([0.5, 1.0].into_iter()), Some(0.75));
        assert_eq!(mean(std::iter::empty()), None);
    }
}
