//! sbf-recon - Form Reconciliation CLI
//!
//! Reads an extraction payload and a form schema (both JSON), reconciles
//! them, and prints the FillResult as JSON. Logs go to stderr (or the
//! configured log file) so stdout stays machine-readable.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sbf_common::config::{LoggingConfig, TomlConfig};
use sbf_recon::adapters::{JsonFactExtractor, JsonFormWriter, JsonSchemaSource};
use sbf_recon::{apply_overrides, FillResult, Override, Reconciler, ReconciliationPipeline};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for sbf-recon
#[derive(Parser, Debug)]
#[command(name = "sbf-recon")]
#[command(about = "Reconcile extracted document facts against a barangay form")]
#[command(version)]
struct Cli {
    /// Configuration file (overrides SBF_CONFIG and the platform default)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "sbf_recon=trace"
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve and fill a form from an extraction payload
    Reconcile {
        /// Extraction payload (JSON)
        #[arg(long, value_name = "FILE")]
        facts: PathBuf,

        /// Form schema (JSON)
        #[arg(long, value_name = "FILE")]
        schema: PathBuf,

        /// Human corrections to apply after filling (JSON array)
        #[arg(long, value_name = "FILE")]
        overrides: Option<PathBuf>,

        /// Write the FillResult here instead of stdout
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Also write the filled form values (JSON) here
        #[arg(long, value_name = "FILE")]
        form_output: Option<PathBuf>,
    },

    /// Apply human corrections to a saved FillResult
    ApplyOverrides {
        /// FillResult produced by `reconcile` (JSON)
        #[arg(long, value_name = "FILE")]
        result: PathBuf,

        /// Corrections (JSON array)
        #[arg(long, value_name = "FILE")]
        overrides: PathBuf,

        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, source) = TomlConfig::resolve_and_load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    init_tracing(cli.log_level.as_deref(), &config.logging)?;

    info!("sbf-recon {}", env!("CARGO_PKG_VERSION"));
    source.log();

    let reconciler = Reconciler::from_settings(&config.reconciliation)
        .context("Invalid [reconciliation] configuration")?;

    match cli.command {
        Command::Reconcile {
            facts,
            schema,
            overrides,
            output,
            form_output,
        } => {
            let document = read_file(&facts).await?;
            let template = read_file(&schema).await?;

            let pipeline = ReconciliationPipeline::new(
                Arc::new(JsonFactExtractor::new()),
                Arc::new(JsonSchemaSource::new()),
                reconciler,
            );
            let mut result = pipeline
                .run(&document, &template)
                .await
                .context("Reconciliation failed")?;

            if let Some(path) = overrides {
                let corrections = read_overrides(&path).await?;
                result = apply_overrides(&result, &corrections);
            }

            if let Some(path) = form_output {
                let bytes = pipeline
                    .finalize(&JsonFormWriter::new(), &template, &result)
                    .await
                    .context("Failed to write form values")?;
                write_file(&path, &bytes).await?;
            }

            report(&result);
            emit(&result, output.as_deref()).await?;
        }

        Command::ApplyOverrides {
            result,
            overrides,
            output,
        } => {
            let bytes = read_file(&result).await?;
            let saved: FillResult = serde_json::from_slice(&bytes)
                .with_context(|| format!("{} is not a FillResult", result.display()))?;
            let corrections = read_overrides(&overrides).await?;

            let merged = apply_overrides(&saved, &corrections);
            report(&merged);
            emit(&merged, output.as_deref()).await?;
        }
    }

    Ok(())
}

/// Filter priority: --log-level, then RUST_LOG, then [logging].level
fn init_tracing(cli_level: Option<&str>, logging: &LoggingConfig) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::try_new(level),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&logging.level)),
    }
    .context("Invalid log level")?;

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn report(result: &FillResult) {
    info!(
        filled = result.filled_fields().len(),
        missing = result.missing_fields().len(),
        "Reconciliation result"
    );
    for missing in result.missing_fields() {
        if missing.required {
            warn!(field = %missing.name, reason = %missing.reason, "Required field needs completion");
        } else {
            info!(field = %missing.name, reason = %missing.reason, "Optional field left blank");
        }
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

async fn read_overrides(path: &Path) -> Result<Vec<Override>> {
    let bytes = read_file(path).await?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("{} is not a list of overrides", path.display()))
}

async fn emit(result: &FillResult, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(result).context("Failed to serialize result")?;
    match output {
        Some(path) => write_file(path, json.as_bytes()).await,
        None => {
            println!("{json}");
            Ok(())
        }
    }
}
