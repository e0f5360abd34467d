//! UI utilities for the CLI

use colored::*;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, size},
};
use ragflow_core::Result;
use ragflow_graph::State;
use std::io::{self, IsTerminal, Write};

const PROMPT: &str = "ragflow>";

/// Display startup banner
pub fn display_banner(model_name: &str) {
    let terminal_width = size().map(|(w, _)| w as usize).unwrap_or(80);
    let banner_width = std::cmp::min(67, terminal_width.saturating_sub(4)).max(40);

    let top_border = format!("┌{}┐", "─".repeat(banner_width - 2));
    let bottom_border = format!("└{}┘", "─".repeat(banner_width - 2));
    let empty_line = format!("│{}│", " ".repeat(banner_width - 2));

    println!();
    println!("{}", top_border.blue());
    println!("{}", empty_line.blue());

    let title = "ragflow - corrective RAG workflow";
    let title_line = format!(
        "│  {}{}│",
        title.blue().bold(),
        " ".repeat(banner_width.saturating_sub(title.chars().count() + 4))
    );
    println!("{}", title_line);
    println!("{}", empty_line.blue());

    let model_line = format!("Model: {}", model_name);
    let feature_lines = [
        "Retrieve, grade, search online, answer, self-check",
        "",
        "History navigation with ↑/↓, Esc clears the line",
        "",
        model_line.as_str(),
    ];

    for line in feature_lines {
        if line.is_empty() {
            println!("{}", empty_line.blue());
        } else {
            let padding = " ".repeat(banner_width.saturating_sub(line.chars().count() + 4));
            println!("{}", format!("│  {}{}│", line, padding).blue());
        }
    }

    println!("{}", empty_line.blue());
    println!("{}", bottom_border.blue());
    println!();
    println!("{}", "Tip: Ask a question, or type 'help' for commands".dimmed());
    println!();
}

fn redraw(input: &str) -> Result<()> {
    let prompt = PROMPT.green().bold();
    let blank = " ".repeat(input.chars().count() + 50);
    print!("\r{} {}  \r{} {}", prompt, blank, prompt, input);
    io::stdout().flush()?;
    Ok(())
}

/// Read a line, with ↑/↓ history navigation when stdin is a terminal
pub async fn handle_input_with_history(history: &mut Vec<String>) -> Result<String> {
    if !io::stdin().is_terminal() {
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_string();
        if !input.is_empty() {
            history.push(input.clone());
        }
        return Ok(input);
    }

    enable_raw_mode()?;
    let result = read_line_raw(history);
    disable_raw_mode()?;
    println!();

    let input = result?;
    if !input.is_empty() {
        history.push(input.clone());
    }
    Ok(input)
}

fn read_line_raw(history: &[String]) -> Result<String> {
    let mut input: Vec<char> = Vec::new();
    let mut history_index: Option<usize> = None;
    let mut cursor_pos = 0;

    print!("{} ", PROMPT.green().bold());
    io::stdout().flush()?;

    loop {
        let Event::Key(key_event) = event::read()? else {
            continue;
        };
        if key_event.kind != KeyEventKind::Press {
            continue;
        }

        match key_event.code {
            KeyCode::Enter => {
                return Ok(input.iter().collect::<String>().trim().to_string());
            }
            KeyCode::Char(c) => {
                input.insert(cursor_pos, c);
                cursor_pos += 1;
                redraw(&input.iter().collect::<String>())?;
            }
            KeyCode::Backspace if cursor_pos > 0 => {
                input.remove(cursor_pos - 1);
                cursor_pos -= 1;
                redraw(&input.iter().collect::<String>())?;
            }
            KeyCode::Up if !history.is_empty() => {
                let new_index = match history_index {
                    None => history.len() - 1,
                    Some(idx) => idx.saturating_sub(1),
                };
                history_index = Some(new_index);
                input = history[new_index].chars().collect();
                cursor_pos = input.len();
                redraw(&history[new_index])?;
            }
            KeyCode::Down => {
                if let Some(idx) = history_index {
                    if idx + 1 < history.len() {
                        history_index = Some(idx + 1);
                        input = history[idx + 1].chars().collect();
                    } else {
                        history_index = None;
                        input.clear();
                    }
                    cursor_pos = input.len();
                    redraw(&input.iter().collect::<String>())?;
                }
            }
            KeyCode::Esc => {
                input.clear();
                cursor_pos = 0;
                history_index = None;
                redraw("")?;
            }
            _ => {}
        }
    }
}

/// Display help message
pub fn print_help() {
    println!("{}", "Available commands:".bold());
    println!("  {} - Run the workflow on a question", "<question>".green());
    println!("  {} - Print the workflow graph as Mermaid", "graph".green());
    println!("  {} - Show this help message", "help".green());
    println!("  {} - Exit the application", "exit/quit".green());
    println!();
    println!("{}", "Examples:".bold());
    println!("  How long does immunity last after a measles vaccine?");
    println!("  What is the difference between mRNA and vector vaccines?");
}

fn format_score(score: Option<f32>) -> String {
    score
        .map(|s| format!("{:.2}", s))
        .unwrap_or_else(|| "-".to_string())
}

/// Print the answer, its grades and the path through the graph
pub fn print_outcome(state: &State) {
    println!();
    match &state.solution {
        Some(solution) => println!("{}", solution),
        None => println!("{}", "No answer was generated".yellow()),
    }
    println!();

    println!(
        "{} grounding {} · coverage {} · web search {}",
        "Grades:".bold(),
        format_score(state.solution_evaluation).cyan(),
        format_score(state.question_evaluation).cyan(),
        if state.searched_online() { "yes".yellow() } else { "no".green() }
    );

    let path: Vec<&str> = state.trace.iter().map(|node| node.name()).collect();
    println!("{} {}", "Path:".bold(), path.join(" → ").dimmed());

    let sources: Vec<String> = state
        .documents
        .iter()
        .filter_map(|doc| {
            doc.metadata
                .get("url")
                .or_else(|| doc.metadata.get("doc_id"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .collect();
    if !sources.is_empty() {
        println!("{}", "Sources:".bold());
        for source in sources {
            println!("  • {}", source.dimmed());
        }
    }
    println!();
}

/// Print an error in the CLI style
pub fn print_error(message: &str) {
    eprintln!("{} {}", "Error:".red().bold(), message);
}
