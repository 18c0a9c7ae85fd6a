//! `tracelight` - CLI for tracelight
//!
//! This binary runs operations through the adaptive dispatcher, manages the
//! document store, and prints what the trace registry recorded.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::Value;

use tracelight::cli::{
    Cli, Command, ConfigCommand, DiagnosticsCommand, DispatchCommand, DocumentsCommand,
};
use tracelight::config::DispatchConfig;
use tracelight::dispatch::{NoBackend, Operation};
use tracelight::recognition::UnavailableEngine;
use tracelight::{
    diagnostics, init_logging, AdaptiveDispatcher, Config, DiagnosticReport, DocumentStore,
    FallbackProvider, RecognitionSupervisor, TraceRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;
    let registry = TraceRegistry::with_config(config.trace.clone());

    // Execute the command
    match cli.command {
        Command::Dispatch(cmd) => handle_dispatch(&config, &registry, cmd).await,
        Command::Operations => {
            handle_operations();
            Ok(())
        }
        Command::Diagnostics(cmd) => handle_diagnostics(&config, &registry, &cmd).await,
        Command::Documents(cmd) => handle_documents(&config, &registry, cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn dispatch_config(config: &Config, immediate: bool) -> DispatchConfig {
    if immediate {
        DispatchConfig::immediate()
    } else {
        config.dispatch.clone()
    }
}

async fn handle_dispatch(
    config: &Config,
    registry: &TraceRegistry,
    cmd: DispatchCommand,
) -> anyhow::Result<()> {
    let args: Value = match cmd.args.as_deref() {
        Some(raw) => serde_json::from_str(raw).context("--args is not valid JSON")?,
        None => Value::Null,
    };

    let supervisor = RecognitionSupervisor::new(
        Arc::new(UnavailableEngine),
        &config.recognition,
        registry,
    );
    let fallback = FallbackProvider::new(registry, dispatch_config(config, cmd.immediate))
        .with_supervisor(supervisor);
    let dispatcher = AdaptiveDispatcher::new(registry, Arc::new(NoBackend), fallback);

    let result = dispatcher.dispatch(&cmd.operation, args).await;

    if cmd.trace {
        println!("{}", DiagnosticReport::collect(registry));
    }

    let value = result.with_context(|| format!("dispatch of {} failed", cmd.operation))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn handle_operations() {
    println!("Fallback Operations");
    println!("===================");
    println!();
    for operation in Operation::ALL {
        println!("  {:<26} {}", operation.name(), operation.description());
    }
}

async fn handle_diagnostics(
    config: &Config,
    registry: &TraceRegistry,
    cmd: &DiagnosticsCommand,
) -> anyhow::Result<()> {
    let config = Config {
        dispatch: dispatch_config(config, cmd.immediate),
        ..config.clone()
    };
    let report = diagnostics::run_exercise(&config, registry)
        .await
        .context("diagnostics exercise failed")?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}

fn open_store(config: &Config, registry: &TraceRegistry) -> anyhow::Result<DocumentStore> {
    let path = config.database_path();
    DocumentStore::open_configured(&path, &config.storage, registry)
        .with_context(|| format!("failed to open document store at {}", path.display()))
}

fn document_name(file: &Path, name: Option<String>) -> anyhow::Result<String> {
    if let Some(name) = name {
        return Ok(name);
    }
    match file.file_name().and_then(|n| n.to_str()) {
        Some(name) => Ok(name.to_string()),
        None => bail!("cannot derive a document name from {}", file.display()),
    }
}

fn handle_documents(
    config: &Config,
    registry: &TraceRegistry,
    cmd: DocumentsCommand,
) -> anyhow::Result<()> {
    let store = open_store(config, registry)?;

    match cmd {
        DocumentsCommand::Add { file, name } => {
            let name = document_name(&file, name)?;
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let outcome = store.ingest(&name, &content)?;
            println!("{name}: {outcome}");
        }
        DocumentsCommand::List { json } => {
            let documents = store.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&documents)?);
            } else if documents.is_empty() {
                println!("No documents stored.");
            } else {
                for document in documents {
                    println!(
                        "  {:<32} {:>8} bytes {:>4} chunks  {}",
                        document.filename,
                        document.content.len(),
                        document.chunks.len(),
                        document.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    );
                }
            }
        }
        DocumentsCommand::Remove { name } => {
            if store.remove(&name)? {
                println!("Removed {name}.");
            } else {
                bail!("no document named {name}");
            }
        }
        DocumentsCommand::Search { query, limit, json } => {
            let hits = store.search(&query, limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("No matches for \"{query}\".");
            } else {
                for hit in hits {
                    println!("[{:.2}] {}", hit.score, hit.filename);
                    println!("  {}", hit.chunk);
                    println!();
                }
            }
        }
        DocumentsCommand::Stats { json } => {
            let stats = store.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Document Store");
                println!("==============");
                println!();
                println!("  Database:           {}", store.path().display());
                println!("  Documents:          {}", stats.total_documents);
                println!("  Chunks:             {}", stats.total_chunks);
                println!("  Content bytes:      {}", stats.collection_bytes);
                println!("  Database bytes:     {}", stats.db_size_bytes);
                match stats.last_updated {
                    Some(ts) => println!("  Last updated:       {}", ts.to_rfc3339()),
                    None => println!("  Last updated:       never"),
                }
            }
        }
        DocumentsCommand::Clear { yes } => {
            if yes {
                let removed = store.clear()?;
                println!("Removed {removed} documents.");
            } else {
                println!("This will remove every stored document.");
                println!("Use --yes to confirm.");
            }
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Trace]");
                println!("  Trail capacity:     {}", config.trace.trail_capacity);
                println!("  Trail retain:       {}", config.trace.trail_retain);
                println!("  Global capacity:    {}", config.trace.global_capacity);
                println!("  Global retain:      {}", config.trace.global_retain);
                println!();
                println!("[Dispatch]");
                println!(
                    "  Latency (ms):       {}-{}",
                    config.dispatch.min_latency_ms, config.dispatch.max_latency_ms
                );
                println!();
                println!("[Recognition]");
                println!("  Language:           {}", config.recognition.language);
                println!("  Continuous:         {}", config.recognition.continuous);
                println!("  Interim results:    {}", config.recognition.interim_results);
                println!("  Restart delay (ms): {}", config.recognition.restart_delay_ms);
                println!("  Retry delay (ms):   {}", config.recognition.retry_delay_ms);
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Max chunk size:     {}", config.storage.max_chunk_size);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
