//! intent-router CLI
//!
//! # Input
//! `classify "<prompt>"`, or a JSON request on stdin:
//! `{"prompt": "...", "threshold": 0.35}` (threshold optional)
//!
//! # Output
//! `IntentResponse` JSON on stdout; logs and a coloured summary on stderr.

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::{debug, error, info};

use intent_router::embedding::{
    provider_from_config, EmbeddingStore, JsonSnapshotStore, SnapshotStore,
};
use intent_router::{Catalog, EngineConfig, IntentEngine, IntentResponse, Result, RouterError};

#[derive(Parser)]
#[command(name = "intent-router", version, about = "Classify requests into intentions and recommend tools")]
struct Cli {
    /// Config file (JSON); defaults to ~/.config/intent-router/config.json if present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Embedding snapshot to load or create
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a prompt (argument or JSON on stdin)
    Classify {
        prompt: Option<String>,

        #[arg(long)]
        threshold: Option<f64>,

        /// Pretty-print the JSON response
        #[arg(long)]
        pretty: bool,
    },
    /// Encode the catalog and write an embedding snapshot
    Snapshot {
        /// Snapshot destination; defaults to the configured or cache-dir path
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List catalog intentions and their tools
    Catalog,
}

/// Request payload accepted on stdin
#[derive(Debug, Deserialize)]
struct ClassifyRequest {
    prompt: String,

    #[serde(default)]
    threshold: Option<f64>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => fatal(e),
    };

    match cli.command {
        Command::Classify {
            prompt,
            threshold,
            pretty,
        } => {
            let engine = match IntentEngine::from_config(config) {
                Ok(engine) => engine,
                Err(e) => fatal(e),
            };
            if let Err(e) = classify(&engine, prompt, threshold, pretty).await {
                error!("Error: {}", e);
                // Bad requests still get a well-formed response
                let output = IntentResponse::empty();
                println!("{}", serde_json::to_string(&output).unwrap_or_default());
            }
        }
        Command::Snapshot { output } => {
            if let Err(e) = snapshot(config, output) {
                fatal(e);
            }
        }
        Command::Catalog => {
            if let Err(e) = list_catalog(&config) {
                fatal(e);
            }
        }
    }
}

fn fatal(e: RouterError) -> ! {
    eprintln!("{} {}", "error:".red().bold(), e);
    std::process::exit(1);
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(path) = &cli.snapshot {
        config.snapshot_path = Some(path.clone());
    }
    Ok(config)
}

async fn classify(
    engine: &IntentEngine,
    prompt: Option<String>,
    threshold: Option<f64>,
    pretty: bool,
) -> Result<()> {
    let request = match prompt {
        Some(prompt) => ClassifyRequest { prompt, threshold },
        None => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            debug!("Received input: {}", input);
            let mut request: ClassifyRequest = serde_json::from_str(&input)?;
            request.threshold = threshold.or(request.threshold);
            request
        }
    };

    info!(
        "Processing prompt: {}",
        request.prompt.chars().take(50).collect::<String>()
    );
    let response = engine
        .classify_response(&request.prompt, request.threshold)
        .await;
    print_summary(&response);

    let json = if pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{}", json);
    Ok(())
}

fn print_summary(response: &IntentResponse) {
    match &response.matched_intention {
        Some(name) => {
            eprintln!(
                "{} {} (confidence: {:.3})",
                "✔".green(),
                name.bold(),
                response.confidence
            );
            for tool in &response.recommended_tools {
                eprintln!("    {} {} - {}", "•".blue(), tool.name, tool.description.dimmed());
            }
        }
        None => eprintln!("{} no intention matched (fallback)", "✘".yellow()),
    }
    for alt in &response.alternative_intentions {
        eprintln!("    {} {} ({:.3})", "~".dimmed(), alt.intention, alt.score);
    }
}

fn snapshot(config: EngineConfig, output: Option<PathBuf>) -> Result<()> {
    let path = output
        .or_else(|| config.snapshot_path.clone())
        .or_else(EngineConfig::default_snapshot_path)
        .ok_or_else(|| RouterError::Catalog("no snapshot path and no cache directory".into()))?;

    let catalog = load_catalog(&config)?;
    let provider = provider_from_config(&config)?;
    let store = EmbeddingStore::build(&catalog, provider.as_ref())?;
    let snapshots = JsonSnapshotStore::new(&path);
    snapshots.save(&store.snapshot())?;

    eprintln!(
        "{} wrote {} embeddings ({}) to {}",
        "✔".green(),
        store.len(),
        provider.name(),
        snapshots.location().bold()
    );
    Ok(())
}

fn list_catalog(config: &EngineConfig) -> Result<()> {
    let catalog = load_catalog(config)?;
    for entry in catalog.entries() {
        println!("{}", entry.name.bold());
        for tool in &entry.tools {
            println!("    {}", tool);
        }
    }
    Ok(())
}

fn load_catalog(config: &EngineConfig) -> Result<Catalog> {
    match &config.catalog_path {
        Some(path) => Catalog::from_path(path),
        None => Catalog::builtin(),
    }
}
