//! zotero-llm: batch LLM analysis of a Zotero library.
//!
//! Subcommands:
//! - `analyze`: run a per-document task over one document, a search hit,
//!   one or more collection paths, or the unfiled documents
//! - `reconcile`: keep the `missing_pdf` flag consistent with attachments
//! - `summary-qa`: answer a question from a collection's summaries
//! - `chat`: interactive QA over a single paper

mod chat;
mod config;
mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{ArgGroup, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zotero_llm_core::{Document, DocumentStore, Error};
use zotero_llm_inference::create_backend;
use zotero_llm_store::ZoteroClient;
use zotero_llm_tasks::{
    AggregationPipeline, BatchCoordinator, BatchEvent, BatchReport, DocumentSource, PromptLibrary,
    ReconciliationEngine, ShutdownSignal, TaskKind, TaskOutcome, TaskRunner,
};

use crate::config::{AppConfig, DEFAULT_CONFIG_FILE};

/// Exit status after an interrupt.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "zotero-llm")]
#[command(author, version, about = "Zotero LLM Assistant - Analyze and organize your research library")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a per-document task
    #[command(group(
        ArgGroup::new("scope")
            .required(true)
            .args(["item_id", "query", "collection", "unfiled"])
    ))]
    Analyze {
        /// Task to run: llm_summary or key_references
        #[arg(short, long, default_value = "llm_summary")]
        task: String,

        /// Zotero item key to analyze
        #[arg(long)]
        item_id: Option<String>,

        /// Search query; the first hit is analyzed
        #[arg(short, long)]
        query: Option<String>,

        /// Collection path such as "Research/ML" (repeatable)
        #[arg(long, num_args = 1..)]
        collection: Vec<String>,

        /// Process documents that belong to no collection
        #[arg(long)]
        unfiled: bool,

        /// Include subcollections
        #[arg(short, long)]
        recursive: bool,

        /// Reprocess documents that already carry the task tag
        #[arg(long)]
        no_skip: bool,
    },

    /// Reconcile the missing-PDF flag across the whole library
    Reconcile,

    /// Answer a question from the summaries in a collection
    SummaryQa {
        /// Collection path to draw summaries from
        #[arg(long)]
        collection: String,

        /// Question to answer
        #[arg(short, long)]
        question: String,

        /// Also include Key References notes
        #[arg(long)]
        include_references: bool,
    },

    /// Interactive Q&A session with a single paper
    Chat,
}

impl Cli {
    /// Filter directive used when `RUST_LOG` is unset.
    ///
    /// Chat keeps the terminal quiet unless verbose output is requested.
    fn default_filter(&self) -> String {
        let level = if self.verbose {
            "debug".to_string()
        } else if matches!(self.command, Commands::Chat) {
            "warn".to_string()
        } else {
            self.log_level.to_lowercase()
        };
        format!(
            "warn,zotero_llm={l},zotero_llm_core={l},zotero_llm_inference={l},zotero_llm_store={l},zotero_llm_tasks={l}",
            l = level
        )
    }
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
///   RUST_LOG    - standard env filter (default: derived from --log-level)
///
/// Console output goes to stderr so `--json` results stay parseable.
fn init_tracing(default_filter: &str) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let path = Path::new(path);
        let file_dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("zotero-llm.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    }
}

/// First Ctrl+C requests a cooperative stop; a second one exits at once.
fn spawn_interrupt_handler(shutdown: ShutdownSignal) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received; stopping after the current step (Ctrl+C again to abort)");
                shutdown.trigger();
            }
            Err(error) => {
                warn!(%error, "Failed to capture Ctrl+C signal");
                return;
            }
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _file_guard = init_tracing(&cli.default_filter());

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = AppConfig::load(&cli.config)?;
    let needs_llm = !matches!(cli.command, Commands::Reconcile);
    if needs_llm {
        config.validate()?;
    } else {
        config.zotero.validate()?;
    }

    let store: Arc<dyn DocumentStore> = Arc::new(ZoteroClient::new(&config.zotero)?);
    let shutdown = ShutdownSignal::new();
    spawn_interrupt_handler(shutdown.clone());

    match cli.command {
        Commands::Analyze {
            task,
            item_id,
            query,
            collection,
            unfiled,
            recursive,
            no_skip,
        } => {
            let task: TaskKind = task.parse()?;
            let prompts = PromptLibrary::load(&config.prompts_file)?;
            let backend = create_backend(&config.llm)?;
            let runner = TaskRunner::new(
                store.clone(),
                backend,
                &prompts,
                task,
                config.tasks.settings_for(task),
            )?
            .with_shutdown(shutdown.clone());
            let skip_if_done = !no_skip;
            let source = DocumentSource::new(store.clone());

            if let Some(id) = item_id {
                let document = source.document(&id).await?;
                return run_single(&runner, document, skip_if_done, cli.json).await;
            }
            if let Some(query) = query {
                let Some(document) = source.first_match(&query).await? else {
                    bail!("No items found for query: '{}'", query);
                };
                if !cli.json {
                    println!("Found item: {}", document.display_title());
                }
                return run_single(&runner, document, skip_if_done, cli.json).await;
            }

            let coordinator = BatchCoordinator::new(store, runner);
            let progress = (!cli.json).then(|| spawn_progress(coordinator.events()));

            let code = if unfiled {
                let batch = coordinator.run_unfiled(skip_if_done).await?;
                finish_progress(coordinator, progress).await;
                print_output(&batch, cli.json, report::render_batch)?;
                batch_exit_code(&batch)
            } else {
                let scopes = coordinator
                    .run_over_scopes(&collection, recursive, skip_if_done)
                    .await;
                finish_progress(coordinator, progress).await;
                print_output(&scopes, cli.json, |s| report::render_scopes(s))?;
                if scopes.iter().filter_map(|s| s.batch.as_ref()).any(|b| b.interrupted)
                    || shutdown.is_triggered()
                {
                    ExitCode::from(EXIT_INTERRUPTED)
                } else {
                    ExitCode::SUCCESS
                }
            };
            Ok(code)
        }

        Commands::Reconcile => {
            let engine = ReconciliationEngine::new(store).with_shutdown(shutdown);
            let result = engine
                .reconcile_missing_flag(
                    &config.reconcile.flag_tag,
                    zotero_llm_tasks::reconcile::is_pdf_attachment,
                )
                .await?;
            print_output(&result, cli.json, report::render_reconcile)?;
            Ok(if result.interrupted {
                ExitCode::from(EXIT_INTERRUPTED)
            } else {
                ExitCode::SUCCESS
            })
        }

        Commands::SummaryQa {
            collection,
            question,
            include_references,
        } => {
            let prompts = PromptLibrary::load(&config.prompts_file)?;
            let backend = create_backend(&config.llm)?;
            let pipeline =
                AggregationPipeline::new(store, backend, &prompts, config.tasks.summary_qa.clone());

            let answer = pipeline.answer(&collection, &question, include_references);
            let result = tokio::select! {
                result = answer => result?,
                _ = shutdown.triggered() => {
                    info!("Summary QA interrupted before the answer was saved");
                    return Ok(ExitCode::from(EXIT_INTERRUPTED));
                }
            };
            print_output(&result, cli.json, report::render_aggregation)?;
            Ok(if result.error.is_some() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }

        Commands::Chat => {
            let prompts = PromptLibrary::load(&config.prompts_file)?;
            let backend = create_backend(&config.llm)?;
            chat::run(store, backend, &prompts, shutdown)
                .await
                .context("chat session failed")?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// How a single-document run ended.
#[derive(Debug)]
enum SingleRun {
    Finished(TaskOutcome),
    Interrupted,
}

/// Map a runner result: configuration errors abort, an interrupt is not a
/// failure, anything else is reported as a failed document.
fn settle_single(
    document: &Document,
    result: zotero_llm_core::Result<TaskOutcome>,
) -> anyhow::Result<SingleRun> {
    match result {
        Ok(outcome) => Ok(SingleRun::Finished(outcome)),
        Err(Error::Interrupted) => Ok(SingleRun::Interrupted),
        Err(e) if e.is_config() => Err(e.into()),
        Err(e) => {
            error!(document_id = %document.key, error = %e, "Document failed");
            Ok(SingleRun::Finished(TaskOutcome::failed(document, &e)))
        }
    }
}

async fn run_single(
    runner: &TaskRunner,
    document: Document,
    skip_if_done: bool,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let result = runner.run(&document, skip_if_done).await;
    match settle_single(&document, result)? {
        SingleRun::Finished(outcome) => {
            print_output(&outcome, json, report::render_outcome)?;
            Ok(ExitCode::SUCCESS)
        }
        SingleRun::Interrupted => {
            info!(document_id = %document.key, "Interrupted before any change was written");
            if !json {
                println!("Interrupted: {} was left unchanged", document.display_title());
            }
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
    }
}

fn batch_exit_code(batch: &BatchReport) -> ExitCode {
    if batch.interrupted {
        ExitCode::from(EXIT_INTERRUPTED)
    } else {
        ExitCode::SUCCESS
    }
}

fn print_output<T, F>(value: &T, json: bool, render: F) -> anyhow::Result<()>
where
    T: serde::Serialize + ?Sized,
    F: Fn(&T) -> String,
{
    if json {
        println!("{}", report::to_json(value)?);
    } else {
        print!("{}", render(value));
    }
    Ok(())
}

/// Print one progress line per document to stderr.
fn spawn_progress(
    mut events: tokio::sync::broadcast::Receiver<BatchEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match events.recv().await {
                Ok(BatchEvent::ScopeStarted { path }) => eprintln!("\nCollection: {}", path),
                Ok(BatchEvent::ScopeFailed { path, error }) => {
                    eprintln!("Collection '{}' failed: {}", path, error)
                }
                Ok(BatchEvent::DocumentStarted {
                    index,
                    total,
                    title,
                    ..
                }) => eprintln!("[{}/{}] {}", index, total, title),
                Ok(BatchEvent::DocumentFinished { .. }) => {}
                Ok(BatchEvent::Interrupted { completed, total }) => {
                    eprintln!("Interrupted after {} of {} documents", completed, total)
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Drop the coordinator so the progress stream closes, then drain it.
async fn finish_progress(
    coordinator: BatchCoordinator,
    progress: Option<tokio::task::JoinHandle<()>>,
) {
    drop(coordinator);
    if let Some(handle) = progress {
        let _ = handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zotero_llm_tasks::TaskState;

    #[test]
    fn test_analyze_requires_exactly_one_scope() {
        assert!(Cli::try_parse_from(["zotero-llm", "analyze"]).is_err());
        assert!(Cli::try_parse_from([
            "zotero-llm",
            "analyze",
            "--item-id",
            "ABC",
            "--unfiled"
        ])
        .is_err());

        let cli = Cli::try_parse_from([
            "zotero-llm",
            "analyze",
            "--collection",
            "Research/ML",
            "--collection",
            "Biology",
            "--recursive",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze {
                collection,
                recursive,
                task,
                ..
            } => {
                assert_eq!(collection, vec!["Research/ML", "Biology"]);
                assert!(recursive);
                assert_eq!(task, "llm_summary");
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["zotero-llm", "reconcile", "--json", "-c", "other.yaml"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.config, PathBuf::from("other.yaml"));
    }

    #[test]
    fn test_single_document_interrupt_is_not_a_failure() {
        let document = Document::new("P1", "journalArticle");

        let settled = settle_single(&document, Err(Error::Interrupted)).unwrap();
        assert!(matches!(settled, SingleRun::Interrupted));

        let settled = settle_single(&document, Err(Error::Inference("timeout".into()))).unwrap();
        match settled {
            SingleRun::Finished(outcome) => {
                assert_eq!(outcome.state, TaskState::Failed);
                assert!(outcome.error.unwrap().contains("timeout"));
            }
            other => panic!("expected a failed outcome, got {:?}", other),
        }

        assert!(settle_single(&document, Err(Error::UnknownTask("x".into()))).is_err());
    }

    #[test]
    fn test_chat_logs_quietly_unless_verbose() {
        let cli = Cli::try_parse_from(["zotero-llm", "chat"]).unwrap();
        assert!(cli.default_filter().contains("zotero_llm_tasks=warn"));

        let cli = Cli::try_parse_from(["zotero-llm", "chat", "-v"]).unwrap();
        assert!(cli.default_filter().contains("zotero_llm_tasks=debug"));

        let cli = Cli::try_parse_from(["zotero-llm", "--log-level", "DEBUG", "reconcile"]).unwrap();
        assert!(cli.default_filter().contains("zotero_llm_store=debug"));
    }
}
