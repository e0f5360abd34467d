use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ragflow_cli::{
    display_banner, handle_input_with_history, load_eval_dataset, print_error, print_help,
    print_outcome, run_evaluation, write_report,
};
use ragflow_core::{AppSettings, VectorStore};
use ragflow_graph::{RagWorkflow, WorkflowGraph};
use ragflow_llm::{EmbedderConfig, EvaluationChains, LlmConfig, OpenAiChatClient, OpenAiEmbedder};
use ragflow_rag::{DatasetIndexer, DuckDuckGoSearch, MmrRetriever, QdrantVectorStore, TextSplitter};

type Workflow = RagWorkflow<
    MmrRetriever<QdrantVectorStore, OpenAiEmbedder>,
    OpenAiChatClient,
    DuckDuckGoSearch,
>;

#[derive(Parser)]
#[command(name = "ragflow")]
#[command(
    about = "Corrective RAG over a local LLM server, Qdrant and web search",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question
    Ask {
        question: String,
        /// Maximum number of node executions
        #[arg(long)]
        recursion_limit: Option<usize>,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive question loop (default)
    Chat,
    /// Create the collection if needed and upload the dataset
    Ingest {
        /// Defaults to <CACHE_STORAGE_DIR>/data/main_dataset.json
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
    /// Delete the collection
    Clear,
    /// Print the workflow graph as a Mermaid diagram
    Graph,
    /// Run the evaluation dataset and write a JSON report
    Evaluate {
        /// Defaults to <CACHE_STORAGE_DIR>/data/eval_dataset.json
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// Defaults to <CACHE_STORAGE_DIR>/reports/<run id>.json
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ragflow=info,warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn vector_store(settings: &AppSettings) -> Result<Arc<QdrantVectorStore>> {
    let store = QdrantVectorStore::new(
        &settings.qdrant_url,
        &settings.collection_name,
        settings.embedding_size,
    )?;
    Ok(Arc::new(store))
}

fn embedder(settings: &AppSettings) -> Result<Arc<OpenAiEmbedder>> {
    Ok(Arc::new(OpenAiEmbedder::new(EmbedderConfig::from_settings(settings))?))
}

fn build_workflow(settings: &AppSettings) -> Result<Workflow> {
    let retriever = MmrRetriever::new(vector_store(settings)?, embedder(settings)?);

    let client = OpenAiChatClient::new(LlmConfig::from_settings(settings))?;
    let generation_config = client.generation_config();
    let chains = EvaluationChains::with_config(client, generation_config);

    let web_search = DuckDuckGoSearch::new(settings.request_timeout)?;

    Ok(RagWorkflow::new(retriever, chains, web_search)
        .with_search_results(settings.k_search_results)
        .with_recursion_limit(settings.recursion_limit))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let command = cli.command.unwrap_or(Commands::Chat);
    if let Commands::Graph = command {
        println!("{}", WorkflowGraph::rag_workflow().to_mermaid());
        return Ok(());
    }

    let settings = AppSettings::from_env().context("Failed to load settings")?;
    tracing::debug!(?settings, "Loaded settings");

    match command {
        Commands::Graph => {}
        Commands::Ask {
            question,
            recursion_limit,
            json,
        } => {
            let workflow = build_workflow(&settings)?;
            let limit = recursion_limit.unwrap_or(workflow.recursion_limit());
            let state = workflow.invoke_with_limit(&question, limit).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                print_outcome(&state);
            }
        }
        Commands::Chat => chat(&settings).await?,
        Commands::Ingest { dataset } => {
            let path = dataset.unwrap_or_else(|| settings.data_dir().join("main_dataset.json"));
            let splitter = TextSplitter::from_tiktoken(
                &settings.encoding_name,
                settings.chunk_size,
                settings.chunk_overlap,
            )?;
            let indexer =
                DatasetIndexer::new(vector_store(&settings)?, embedder(&settings)?, splitter);

            println!("{} Indexing {}...", "📚".blue(), path.display());
            let result = indexer.index_dataset(&path).await?;

            println!(
                "{} Indexed {} documents ({} chunks)",
                "✅".green(),
                result.documents_indexed,
                result.chunks_indexed
            );
            if result.chunks_failed > 0 {
                println!("{} {} chunks failed", "⚠️".yellow(), result.chunks_failed);
                for error in &result.errors {
                    println!("  {} {}", "•".yellow(), error);
                }
            }
        }
        Commands::Clear => {
            vector_store(&settings)?.delete_collection().await?;
            println!(
                "{} Collection {} deleted",
                "🗑️".yellow(),
                settings.collection_name
            );
        }
        Commands::Evaluate { dataset, output } => {
            let path = dataset.unwrap_or_else(|| settings.data_dir().join("eval_dataset.json"));
            let cases = load_eval_dataset(&path)
                .await
                .with_context(|| format!("Failed to load {}", path.display()))?;
            println!("{} Evaluating {} questions...", "🧪".blue(), cases.len());

            let workflow = build_workflow(&settings)?;
            let report = run_evaluation(&workflow, cases).await;

            let output = output.unwrap_or_else(|| {
                settings
                    .cache_storage_dir
                    .join("reports")
                    .join(format!("{}.json", report.run_id))
            });
            write_report(&report, &output).await?;

            let overall = &report.overall;
            println!(
                "{} Answered {}/{} ({:.0}%), {} failures",
                "✅".green(),
                overall.answered,
                overall.questions,
                overall.answered_rate * 100.0,
                overall.failures
            );
            println!("{} Report written to {}", "📝".blue(), output.display());
        }
    }

    Ok(())
}

async fn chat(settings: &AppSettings) -> Result<()> {
    let workflow = build_workflow(settings)?;
    display_banner(&settings.llm_model_name);

    let mut history = Vec::new();
    loop {
        let input = handle_input_with_history(&mut history).await?;
        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "exit" | "quit" => {
                println!("{}", "👋 Goodbye!".green());
                break;
            }
            "help" => print_help(),
            "graph" => println!("{}", workflow.graph().to_mermaid()),
            _ => {
                println!("{} Thinking...", "🤖".blue());
                match workflow.invoke(&input).await {
                    Ok(state) => print_outcome(&state),
                    Err(e) => print_error(&e.to_string()),
                }
            }
        }
    }

    Ok(())
}
