use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use refharvest_acquire::{
    AcquireError, IngestSummary, Pipeline, RunSummary, TableStatus, read_checkpoint,
};
use refharvest_core::{AppConfig, CoreError, ExitCode};

mod logging;

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "refharvest",
    about = "Merge citation-database exports and harvest the referenced PDFs",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of ~/.config/refharvest/config.toml.
    /// Also settable with REFHARVEST_CONFIG.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output in JSON format. Also enabled by setting REFHARVEST_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest, deduplicate, acquire and compress in one go.
    Run {
        /// Skip the compression pass.
        #[arg(long)]
        no_compress: bool,
        /// Keep already downloaded documents and resume from the last checkpoint.
        #[arg(long)]
        keep_documents: bool,
    },

    /// Normalize and deduplicate the exports, then write the checkpoint.
    Ingest,

    /// Acquire documents for the records of the existing checkpoint.
    Acquire,

    /// Compress the documents listed in the existing checkpoint.
    Compress,

    /// Summarize the checkpoint.
    Status,

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let start = Instant::now();
    let cli = Cli::parse();
    let json_output = cli.json || std::env::var("REFHARVEST_JSON").as_deref() == Ok("1");

    if let Err(err) = dispatch(cli, json_output, start).await {
        let code = exit_code_for(&err);
        if json_output {
            let envelope = json!({
                "status": "error",
                "error": format!("{code:?}"),
                "message": format!("{err:#}"),
                "meta": { "duration_ms": start.elapsed().as_millis() }
            });
            println!("{envelope:#}");
        } else {
            eprintln!("error: {err:#}");
        }
        std::process::exit(code as i32);
    }
}

async fn dispatch(cli: Cli, json_output: bool, start: Instant) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);
    let mut config = AppConfig::load_from(&config_path)?;

    match cli.command {
        Commands::Config { action } => {
            config_command(action, &config, &config_path, json_output, start)?;
        }

        Commands::Run {
            no_compress,
            keep_documents,
        } => {
            if no_compress {
                config.cleanup.compress = false;
            }
            if keep_documents {
                config.cleanup.reset_directories = false;
            }
            let pipeline = open_pipeline(config)?;
            let summary = pipeline.run().await?;
            if json_output {
                print_ok(&summary, start)?;
            } else {
                print_run_summary(&summary);
            }
        }

        Commands::Ingest => {
            let pipeline = open_pipeline(config)?;
            let table = pipeline.ingest()?;
            let summary = IngestSummary::from(&table);
            if json_output {
                print_ok(&summary, start)?;
            } else {
                println!(
                    "{} records from {} rows ({} rejected), checkpoint {}",
                    summary.records,
                    summary.rows_read,
                    summary.rejected.len(),
                    pipeline.config().checkpoint_path().display()
                );
            }
        }

        Commands::Acquire => {
            let pipeline = open_pipeline(config)?;
            let mut records = pipeline.load_checkpoint()?;
            std::fs::create_dir_all(pipeline.config().documents_dir())?;
            let report = pipeline.acquire(&mut records).await?;
            if json_output {
                print_ok(&report, start)?;
            } else {
                println!(
                    "acquired {}, unacquired {}, already present {}",
                    report.acquired, report.unacquired, report.skipped
                );
            }
        }

        Commands::Compress => {
            let pipeline = open_pipeline(config)?;
            let records = pipeline.load_checkpoint()?;
            let report = pipeline.compress(&records)?;
            if json_output {
                print_ok(&report, start)?;
            } else {
                println!(
                    "evaluated {}, replaced {}, kept {}, failed {}, saved {} bytes",
                    report.evaluated,
                    report.replaced,
                    report.kept_original,
                    report.failed,
                    report.bytes_saved
                );
            }
        }

        Commands::Status => {
            let status = checkpoint_status(&config)?;
            if json_output {
                print_ok(&status, start)?;
            } else {
                println!("Checkpoint: {}", config.checkpoint_path().display());
                println!("  records:    {}", status.total);
                println!("  acquired:   {}", status.acquired);
                println!("  unacquired: {}", status.unacquired);
            }
        }
    }

    Ok(())
}

/// Start logging for a pipeline command and build the pipeline.
fn open_pipeline(config: AppConfig) -> Result<Pipeline> {
    if let Some(log_file) = logging::init(&config.logging, &config.log_dir())? {
        info!("logging to {}", log_file.display());
    }
    Ok(Pipeline::from_config(config)?)
}

/// Status only reads the checkpoint, so a config the fetcher would reject
/// (bad proxy, unreachable mirrors) does not get in the way.
fn checkpoint_status(config: &AppConfig) -> Result<TableStatus> {
    let records = read_checkpoint(&config.checkpoint_path())?;
    Ok(TableStatus::of(&records))
}

fn config_command(
    action: ConfigAction,
    config: &AppConfig,
    config_path: &Path,
    json_output: bool,
    start: Instant,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            if json_output {
                print_ok(config, start)?;
            } else {
                println!("# {}", config_path.display());
                print!("{}", config.to_toml_string()?);
            }
        }
        ConfigAction::Init { force } => {
            let written = init_config(config_path, force)?;
            if json_output {
                print_ok(&json!({ "path": written }), start)?;
            } else {
                println!("Wrote default config to {}", written.display());
            }
        }
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<PathBuf> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    AppConfig::default().save_to(path)?;
    Ok(path.to_path_buf())
}

// ─── Output ──────────────────────────────────────────────────────────────────

fn print_ok<T: serde::Serialize + ?Sized>(data: &T, start: Instant) -> Result<()> {
    let envelope = json!({
        "status": "ok",
        "data": data,
        "meta": { "duration_ms": start.elapsed().as_millis() }
    });
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn print_run_summary(summary: &RunSummary) {
    let ingest = &summary.ingest;
    println!(
        "Ingested {} records from {} rows in {} folders",
        ingest.records,
        ingest.rows_read,
        ingest.folders.len()
    );
    if !ingest.rejected.is_empty() {
        println!("  {} rows or files rejected (see log)", ingest.rejected.len());
    }
    if let Some(dedup) = &ingest.global_dedup {
        println!("  {} cross-source duplicates removed", dedup.removed());
    }
    if summary.inherited > 0 {
        println!("  {} documents kept from the previous run", summary.inherited);
    }

    let acq = &summary.acquisition;
    println!(
        "Acquired {} of {} documents ({} already present)",
        acq.acquired, acq.attempted, acq.skipped
    );
    if let Some(c) = &summary.compression {
        println!(
            "Compressed {} of {} documents, {} bytes saved",
            c.replaced, c.evaluated, c.bytes_saved
        );
    }
    println!("Checkpoint: {}", summary.checkpoint.display());
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if let Some(err) = err.downcast_ref::<AcquireError>() {
        return match err {
            AcquireError::Core(core) => ExitCode::from(core),
            AcquireError::Http(_)
            | AcquireError::RateLimit(..)
            | AcquireError::NoMirror(_)
            | AcquireError::ApiError(..) => ExitCode::NetworkError,
            AcquireError::InvalidProxy(..) => ExitCode::InvalidConfig,
            AcquireError::Io(_) => ExitCode::FileSystemError,
            _ => ExitCode::GeneralError,
        };
    }
    if let Some(err) = err.downcast_ref::<CoreError>() {
        return ExitCode::from(err);
    }
    ExitCode::GeneralError
}
