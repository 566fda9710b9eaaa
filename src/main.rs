//! GenReport - generation report processor
//!
//! Watches an input folder for generation report XML files and writes a
//! result document per file: value totals, the peak emission day of each
//! fossil generator and coal heat rates.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, reference data, folder watch, etc.)
//!   2 - A file failed or was abandoned (--file and --no-watch runs)

mod analysis;
mod cli;
mod config;
mod error;
mod ingress;
mod models;
mod pipeline;
mod reference;
mod report;

use analysis::EngineOptions;
use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use ingress::{
    scan_existing, AbandonReason, DirectoryWatcher, Dispatcher, FileReport, InputFilter, Outcome,
    ProcessingSettings, RetryPolicy,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration first so its verbose setting reaches the logger
    let (mut config, config_path) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("GenReport v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default genreport.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE_NAME);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set folders, retry timing and grouping.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load settings and reference data, then process files. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    config.validate()?;

    // Reference data is loaded once and shared read-only
    let reference_path = &config.general.reference_data;
    let factors = Arc::new(reference::load_reference_factors(reference_path)?);
    info!("Loaded reference data from {}", reference_path.display());

    let output_dir = config.general.output_folder.clone();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output folder: {}", output_dir.display()))?;

    let settings = ProcessingSettings {
        output_dir: output_dir.clone(),
        policy: RetryPolicy::from(&config.ingress),
        engine: EngineOptions::from(&config.engine),
    };
    debug!("Processing settings: {:?}", settings);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut dispatcher = Dispatcher::new(factors, settings, cancel_rx);

    // Single file mode
    if let Some(ref file) = args.file {
        println!("📄 Processing {}", file.display());
        dispatcher.dispatch(file.clone());
        let reports = dispatcher.drain().await;
        print_summary(&reports);
        return Ok(exit_code(&reports));
    }

    let input_dir = config.general.input_folder.clone();
    if !input_dir.is_dir() {
        anyhow::bail!("Input folder does not exist: {}", input_dir.display());
    }
    let filter = InputFilter::new(config.extension(), &input_dir, &output_dir);

    // Sweep and exit
    if args.no_watch {
        let reports = sweep_existing(&mut dispatcher, &input_dir, &filter, !args.quiet).await?;
        print_summary(&reports);
        return Ok(exit_code(&reports));
    }

    // Start watching before the sweep so files arriving meanwhile are queued
    let mut watcher = DirectoryWatcher::start(&input_dir, filter.clone())?;

    if args.sweeps_existing() {
        let reports = sweep_existing(&mut dispatcher, &input_dir, &filter, !args.quiet).await?;
        print_summary(&reports);
    }

    println!(
        "\n👀 Watching {} for *.{} files. Results go to {}. Press Ctrl+C to quit.",
        input_dir.display(),
        config.extension(),
        output_dir.display()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            arrived = watcher.next_path() => match arrived {
                Some(path) => {
                    info!("New file: {}", path.display());
                    dispatcher.dispatch(path);
                }
                None => {
                    warn!("Folder watcher stopped");
                    break;
                }
            },
            Some(_) = dispatcher.next_finished(), if dispatcher.pending() > 0 => {}
            _ = &mut ctrl_c => {
                info!("Shutting down");
                let _ = cancel_tx.send(true);
                break;
            }
        }
    }

    let remaining = dispatcher.drain().await;
    if !remaining.is_empty() {
        print_summary(&remaining);
    }

    Ok(0)
}

/// Process files already in the input folder, with a progress bar.
async fn sweep_existing(
    dispatcher: &mut Dispatcher,
    input_dir: &Path,
    filter: &InputFilter,
    show_progress: bool,
) -> Result<Vec<FileReport>> {
    let files = scan_existing(input_dir, filter)?;

    if files.is_empty() {
        println!("   No existing files in {}", input_dir.display());
        return Ok(Vec::new());
    }

    println!(
        "📂 Processing {} existing file(s) in {}",
        files.len(),
        input_dir.display()
    );

    let progress = if show_progress {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    for file in files {
        dispatcher.dispatch(file);
    }

    let mut reports = Vec::new();
    while let Some(report) = dispatcher.next_finished().await {
        progress.inc(1);
        reports.push(report);
    }
    progress.finish_and_clear();

    Ok(reports)
}

/// Print a per-run summary.
fn print_summary(reports: &[FileReport]) {
    let done = reports.iter().filter(|r| r.outcome.is_done()).count();
    let failed = reports
        .iter()
        .filter(|r| matches!(r.outcome, Outcome::Failed { .. }))
        .count();
    let abandoned = reports.len() - done - failed;

    println!("\n📊 Processing Summary:");
    println!("   Files: {}", reports.len());
    println!(
        "   - ✅ Written: {} | ❌ Failed: {} | ⏳ Abandoned: {}",
        done, failed, abandoned
    );

    for report in reports {
        match &report.outcome {
            Outcome::Done { attempts, value } => {
                if *attempts > 1 {
                    println!(
                        "   {} -> {} ({} attempts)",
                        value.input.display(),
                        value.output.display(),
                        attempts
                    );
                } else {
                    println!("   {} -> {}", value.input.display(), value.output.display());
                }
                for diagnostic in value.diagnostics.iter().filter(|d| !d.is_warning()) {
                    println!("     ⚠️  {}", diagnostic);
                }
            }
            Outcome::Failed { attempts, error } => {
                println!(
                    "   {}: failed on attempt {} ({})",
                    report.path.display(),
                    attempts,
                    error
                );
            }
            Outcome::Abandoned { attempts, reason } => match reason {
                AbandonReason::RetriesExhausted(error) => println!(
                    "   {}: still in use after {} attempts ({})",
                    report.path.display(),
                    attempts,
                    error
                ),
                AbandonReason::Cancelled => {
                    println!("   {}: cancelled", report.path.display())
                }
            },
        }
    }
}

/// 2 when any file was not written, otherwise 0.
fn exit_code(reports: &[FileReport]) -> i32 {
    if reports.iter().all(|r| r.outcome.is_done()) {
        0
    } else {
        2
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go to stderr. Returns the
/// path the configuration was read from, if any.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, Some(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, Some(PathBuf::from(CONFIG_FILE_NAME)))),
        Ok(None) => Ok((Config::default(), None)),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}. Using defaults.", CONFIG_FILE_NAME, e);
            Ok((Config::default(), None))
        }
    }
}
