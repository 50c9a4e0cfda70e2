use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use docent_channels::CliChannel;
use docent_core::config::{Config, ProviderKind};
use docent_core::generator::AnswerGenerator;
use docent_core::session::{ChatSession, TurnOutcome};
use docent_core::Agent;
use docent_index::document::{DocumentLoader, IngestionPipeline, TextLoader, TextSplitter};
use docent_index::{IndexError, LocalVectorIndex, Retriever, VectorIndex};
use docent_llm::ollama::OllamaProvider;
use docent_llm::{AnyProvider, LlmProvider};
use tokio::sync::watch;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(name = "docent", version, about = "Chat with your private documents")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the vector index from the source folder, replacing any existing index.
    Ingest {
        #[arg(long)]
        source: Option<PathBuf>,
        /// File extension to ingest, e.g. `pdf` or `txt`.
        #[arg(long)]
        extension: Option<String>,
    },
    /// Interactive question answering over the indexed documents.
    Chat,
    /// Answer a single question and exit.
    Ask { question: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)?;
    config.validate()?;

    let provider = create_provider(&config)?;
    health_check(&provider).await;

    match cli.command {
        Command::Ingest { source, extension } => {
            let source = source.unwrap_or_else(|| PathBuf::from(&config.ingest.source_dir));
            let extension = extension.unwrap_or_else(|| config.ingest.extension.clone());
            run_ingest(&config, provider, &source, &extension).await
        }
        Command::Chat => run_chat(&config, provider).await,
        Command::Ask { question } => run_ask(&config, provider, &question).await,
    }
}

/// Logs go to stderr so stdout carries only the conversation.
fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("DOCENT_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    match config.llm.provider {
        ProviderKind::Ollama => {
            let mut ollama = OllamaProvider::new(
                &config.llm.base_url,
                config.llm.model.clone(),
                config.llm.embedding_model.clone(),
            );
            ollama.set_context_window(config.llm.context_window);
            Ok(AnyProvider::Ollama(ollama))
        }
        #[cfg(feature = "mock")]
        ProviderKind::Mock => {
            let mut mock = docent_llm::mock::MockProvider::default().with_bag_of_words();
            mock.default_response =
                "(mock provider) This answer was generated offline without a language model."
                    .into();
            Ok(AnyProvider::Mock(mock))
        }
        #[cfg(not(feature = "mock"))]
        ProviderKind::Mock => bail!("the mock provider requires building with `--features mock`"),
    }
}

#[allow(irrefutable_let_patterns)]
async fn health_check(provider: &AnyProvider) {
    if let AnyProvider::Ollama(ollama) = provider {
        match ollama.health_check().await {
            Ok(()) => tracing::info!("ollama health check passed"),
            Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
        }
    }
}

fn create_loader(extension: &str, max_file_size: u64) -> anyhow::Result<Box<dyn DocumentLoader>> {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    match ext.as_str() {
        #[cfg(feature = "pdf")]
        "pdf" => Ok(Box::new(docent_index::document::PdfLoader { max_file_size })),
        #[cfg(not(feature = "pdf"))]
        "pdf" => bail!("PDF support requires building with the `pdf` feature"),
        "txt" | "md" | "markdown" => Ok(Box::new(TextLoader { max_file_size })),
        other => bail!("no document loader for .{other} files"),
    }
}

async fn run_ingest(
    config: &Config,
    provider: AnyProvider,
    source: &Path,
    extension: &str,
) -> anyhow::Result<()> {
    let splitter = TextSplitter::new(config.splitter_config())?;
    let loader = create_loader(extension, config.ingest.max_file_size)?;
    let pipeline = IngestionPipeline::new(splitter, loader, Arc::new(provider), &config.index.path)
        .with_config(config.ingestion_config());

    let report = match pipeline.ingest(source, extension).await {
        Ok(report) => report,
        Err(IndexError::NoSourceFiles { folder, extension }) => {
            tracing::warn!(
                "no .{extension} files found in {}, index left unchanged",
                folder.display()
            );
            return Ok(());
        }
        Err(e) => return Err(e).context("ingestion failed"),
    };

    println!("Files discovered: {}", report.files_discovered);
    println!("Files failed:     {}", report.files_failed);
    for failure in &report.failures {
        println!("  - {}: {}", failure.path.display(), failure.reason);
    }
    println!("Total pages:      {}", report.pages_extracted);
    println!("Total chunks:     {}", report.chunks_produced);
    if report.index_written {
        println!(
            "Indexed {} chunks into {}",
            report.entries_written, config.index.path
        );
    } else {
        println!("Nothing to index, existing index left unchanged");
    }
    Ok(())
}

async fn open_session(
    config: &Config,
    provider: AnyProvider,
) -> anyhow::Result<ChatSession<AnyProvider>> {
    let index = LocalVectorIndex::load(Path::new(&config.index.path))
        .await
        .context("failed to open the document index, run `docent ingest` first")?;
    tracing::info!(
        entries = index.len(),
        scheme = %index.scheme(),
        "opened document index"
    );

    let provider = Arc::new(provider);
    let retriever = Retriever::new(Arc::new(index), Arc::clone(&provider))?
        .with_timeout(config.timeouts.embedding());
    let generator = AnswerGenerator::new(provider, config.generation_settings());

    Ok(ChatSession::new(
        Arc::new(retriever),
        Arc::new(generator),
        config.retrieval_settings(),
    ))
}

async fn run_chat(config: &Config, provider: AnyProvider) -> anyhow::Result<()> {
    tracing::info!(
        provider = provider.name(),
        model = %config.llm.model,
        "starting chat"
    );
    let session = open_session(config, provider).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    println!("docent v{}", env!("CARGO_PKG_VERSION"));
    let mut agent = Agent::new(session, CliChannel::new()).with_shutdown(shutdown_rx);
    agent.run().await?;
    Ok(())
}

async fn run_ask(config: &Config, provider: AnyProvider, question: &str) -> anyhow::Result<()> {
    let mut session = open_session(config, provider).await?;
    match session.handle_turn(question).await {
        TurnOutcome::Answered { answer, sources } => {
            println!("{}", answer.trim_end());
            if !sources.is_empty() {
                println!("\nSources:");
                for source in sources {
                    println!("  - {source}");
                }
            }
            Ok(())
        }
        TurnOutcome::Failed { message } => bail!("{message}"),
    }
}
