//! Terminal interface and offline evaluation for ragflow

mod evaluation;
mod ui;


pub use evaluation::{
    CaseOutcome, EvalCase, EvaluationReport, Metrics, load_eval_dataset, run_evaluation,
    write_report,
};
pub use ui::{display_banner, handle_input_with_history, print_error, print_help, print_outcome};

// Re-export core types
pub use ragflow_core::{Error, Result};
