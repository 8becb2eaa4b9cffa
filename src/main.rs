// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! agesort: sort photos into folders by estimated facial age
//!
//! Each subcommand is a one-shot batch job over a single input directory.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use agesort::buckets::AgeBuckets;
use agesort::config::AppConfig;
use agesort::convert::{convert_all, ConvertOptions};
use agesort::estimator;
use agesort::history::History;
use agesort::organize::{rename_by_age, sort_into_buckets, Placement};
use agesort::pipeline::{estimate_all, BatchReport};
use agesort::scan::list_images;
use agesort::{AgesortError, Result};

/// agesort CLI - sort photos by estimated age
#[derive(Parser, Debug)]
#[command(name = "agesort")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Sort, rename and convert photos by estimated facial age", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "agesort.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json", "jsonl"])]
    format: String,

    /// Operation journal file (overrides config)
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the jobs that call an age estimator
#[derive(clap::Args, Debug)]
struct EstimateArgs {
    /// Folder with input images (overrides config)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Destination folder (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Images analysed in parallel (1 = sequential)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Show what would happen without touching any file
    #[arg(long)]
    dry_run: bool,

    /// Skip the estimator health check on startup
    #[arg(long)]
    skip_health_check: bool,
}

/// Options shared by the JPEG conversion jobs
#[derive(clap::Args, Debug)]
struct ConvertArgs {
    /// Folder with input images (overrides config)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Destination folder (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JPEG quality 1-100 (overrides config)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Show what would happen without writing any file
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Move images into age-bucket folders as {name}_{age}{ext}
    Sort(EstimateArgs),

    /// Copy images to the output folder as image{age}{ext}
    Rename(EstimateArgs),

    /// Convert images to JPEG
    Convert {
        #[command(flatten)]
        args: ConvertArgs,

        /// Strip extended attributes from inputs first
        #[arg(long)]
        strip_xattrs: bool,
    },

    /// Recompress images as lower-quality JPEG, stripping extended attributes
    Compress {
        #[command(flatten)]
        args: ConvertArgs,

        /// Leave extended attributes on the inputs
        #[arg(long)]
        keep_xattrs: bool,
    },

    /// Create the empty age-bucket folder tree
    Scaffold {
        /// Root folder for the buckets (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Operation journal and undo
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show age estimator status
    Status,
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// List recent journal entries
    List {
        /// Number of entries to show
        #[arg(long, default_value = "10")]
        count: usize,
    },

    /// Undo recent operations
    Undo {
        /// Number of operations to undo (0 for all)
        #[arg(long, default_value = "1")]
        count: usize,

        /// Dry run (show what would be undone)
        #[arg(long)]
        dry_run: bool,
    },

    /// Clear the journal
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "agesort.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)?;
    let history = History::new(
        cli.history
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.history.path)),
    );

    match cli.command {
        Commands::Sort(args) => {
            let report = run_estimate_job(&config, &history, args, Job::Sort).await?;
            print_report(&report, &cli.format)
        }
        Commands::Rename(args) => {
            let report = run_estimate_job(&config, &history, args, Job::Rename).await?;
            print_report(&report, &cli.format)
        }
        Commands::Convert { args, strip_xattrs } => {
            let quality = args.quality.unwrap_or(config.convert.quality);
            let report = run_convert_job(&config, &history, args, quality, strip_xattrs).await?;
            print_report(&report, &cli.format)
        }
        Commands::Compress { args, keep_xattrs } => {
            let quality = args.quality.unwrap_or(config.convert.compress_quality);
            let strip = config.convert.strip_xattrs && !keep_xattrs;
            let report = run_convert_job(&config, &history, args, quality, strip).await?;
            print_report(&report, &cli.format)
        }
        Commands::Scaffold { output } => run_scaffold(&config, output),
        Commands::History { action } => run_history_command(&history, action),
        Commands::Config { action } => run_config_command(&config, action, &cli.config),
        Commands::Status => run_status(&config, &history).await,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Sort,
    Rename,
}

/// Scan, estimate in parallel, then place results single-threaded
async fn run_estimate_job(config: &AppConfig, history: &History, args: EstimateArgs, job: Job) -> Result<BatchReport> {
    let input = args.input.unwrap_or_else(|| PathBuf::from(&config.input_dir));
    let output = args.output.unwrap_or_else(|| PathBuf::from(&config.output_dir));
    let workers = args.workers.unwrap_or(config.estimator.workers);
    if workers == 0 {
        return Err(AgesortError::Config("--workers must be at least 1".to_string()));
    }

    if args.dry_run {
        warn!("DRY RUN MODE - files will not be moved or copied");
    }

    let files = list_images(&input, &config.formats.estimate)?;
    if files.is_empty() {
        info!("No supported images found in {:?}", input);
        return Ok(BatchReport::default());
    }
    info!("Found {} images to process", files.len());

    let estimator = estimator::from_config(&config.estimator)?;
    if args.skip_health_check {
        warn!("Skipping estimator health check");
    } else {
        estimator.health_check().await?;
    }

    if !args.dry_run {
        tokio::fs::create_dir_all(&output).await?;
    }

    let outcomes = estimate_all(files, Arc::clone(&estimator), config.estimator.max_width, workers).await;
    info!("Processing complete. Organizing files...");

    let placement = Placement {
        output_dir: &output,
        history: Some(history),
        dry_run: args.dry_run,
    };
    let report = match job {
        Job::Sort => sort_into_buckets(&outcomes, &config.buckets, &placement),
        Job::Rename => rename_by_age(&outcomes, &placement),
    };

    info!("Done: {} placed, {} skipped", report.processed, report.skipped);
    Ok(report)
}

async fn run_convert_job(
    config: &AppConfig,
    history: &History,
    args: ConvertArgs,
    quality: u8,
    strip_xattrs: bool,
) -> Result<BatchReport> {
    let input = args.input.unwrap_or_else(|| PathBuf::from(&config.input_dir));
    let output = args.output.unwrap_or_else(|| PathBuf::from(&config.output_dir));

    info!("Scanning {:?} for images...", input);
    let files = list_images(&input, &config.formats.convert)?;
    if files.is_empty() {
        info!("No supported images found in {:?}", input);
        return Ok(BatchReport::default());
    }
    info!("Found {} images to process (quality {})", files.len(), quality);

    let options = ConvertOptions {
        quality,
        strip_xattrs,
        dry_run: args.dry_run,
    };
    let report = convert_all(files, &output, &options, Some(history)).await?;

    info!("Done: {} converted, {} failed", report.processed, report.skipped);
    Ok(report)
}

fn run_scaffold(config: &AppConfig, output: Option<PathBuf>) -> Result<()> {
    let root = output.unwrap_or_else(|| PathBuf::from(&config.output_dir));
    create_bucket_folders(&root, &config.buckets)?;
    println!("Folder structure created under {}", root.display());
    Ok(())
}

/// Create `root` and one folder per age bucket
fn create_bucket_folders(root: &Path, buckets: &AgeBuckets) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(root)?;
    let mut created = Vec::new();
    for bucket in buckets.all_buckets() {
        let folder = root.join(buckets.label(bucket));
        std::fs::create_dir_all(&folder)?;
        info!("Created folder: {}", folder.display());
        created.push(folder);
    }
    Ok(created)
}

/// Print per-file results in the requested format
fn print_report(report: &BatchReport, format: &str) -> Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report.files)?);
        }
        "jsonl" => {
            for file in &report.files {
                println!("{}", serde_json::to_string(file)?);
            }
        }
        _ => {
            for file in &report.files {
                match (&file.destination, &file.error) {
                    (Some(dest), _) => println!("{} -> {}", file.path.display(), dest.display()),
                    (None, Some(err)) => println!("{}: skipped ({})", file.path.display(), err),
                    (None, None) => println!("{}: skipped", file.path.display()),
                }
            }
            if !report.files.is_empty() {
                println!("\nProcessed {} files, skipped {}", report.processed, report.skipped);
            }
        }
    }
    Ok(())
}

/// Run history commands
fn run_history_command(history: &History, action: HistoryCommands) -> Result<()> {
    match action {
        HistoryCommands::List { count } => {
            let entries = history.get_recent(count)?;
            println!("Recent history ({} entries):", entries.len());
            for entry in entries {
                let status = if entry.undone { "[UNDONE]" } else { "" };
                println!("  {} {:?} {} -> {} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.action,
                    entry.source.display(),
                    entry.destination.display(),
                    status
                );
            }
        }
        HistoryCommands::Undo { count, dry_run } => {
            let report = history.undo(count, dry_run)?;
            if report.undone == 0 && report.skipped == 0 {
                println!("Nothing to undo");
            } else if dry_run {
                println!("Dry run complete. {} operation(s) would be undone, {} skipped.", report.undone, report.skipped);
            } else {
                println!("Done. {} undone, {} skipped.", report.undone, report.skipped);
            }
        }
        HistoryCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing history");
                return Ok(());
            }
            history.clear()?;
            println!("History cleared");
        }
    }

    Ok(())
}

/// Run config commands
fn run_config_command(config: &AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Input: {}", config.input_dir);
            println!("  Output: {}", config.output_dir);
            println!("  Estimator: {:?}", config.estimator.backend);
            println!("  Bucket width: {}", config.buckets.width);
        }
    }

    Ok(())
}

/// Run status check
async fn run_status(config: &AppConfig, history: &History) -> Result<()> {
    println!("agesort v{} Status", env!("CARGO_PKG_VERSION"));
    println!("======================");

    match estimator::from_config(&config.estimator) {
        Ok(estimator) => match estimator.health_check().await {
            Ok(()) => println!("Estimator ({}): Running", estimator.name()),
            Err(e) => println!("Estimator ({}): Error - {}", estimator.name(), e),
        },
        Err(e) => println!("Estimator: Error - {}", e),
    }

    match history.get_undoable() {
        Ok(entries) => println!("\nJournal ({}): {} undoable operations", history.path().display(), entries.len()),
        Err(e) => println!("\nJournal: Error - {}", e),
    }

    println!("\nConfiguration:");
    println!("  Input: {}", config.input_dir);
    println!("  Output: {}", config.output_dir);
    println!("  Backend: {:?}", config.estimator.backend);
    println!("  Model: {}", config.estimator.model);
    println!("  Workers: {}", config.estimator.workers);
    println!("  HEIC support: {}", cfg!(feature = "heic"));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_sort_command() {
        let cli = Cli::try_parse_from([
            "agesort", "sort", "--input", "/tmp/faces", "--workers", "2", "--dry-run"
        ]).unwrap();

        match cli.command {
            Commands::Sort(args) => {
                assert!(args.dry_run);
                assert_eq!(args.input, Some(PathBuf::from("/tmp/faces")));
                assert_eq!(args.workers, Some(2));
            }
            _ => panic!("Expected Sort command"),
        }
    }

    #[test]
    fn test_cli_compress_quality_range() {
        let cli = Cli::try_parse_from(["agesort", "compress", "--quality", "60"]).unwrap();
        match cli.command {
            Commands::Compress { args, keep_xattrs } => {
                assert_eq!(args.quality, Some(60));
                assert!(!keep_xattrs);
            }
            _ => panic!("Expected Compress command"),
        }

        assert!(Cli::try_parse_from(["agesort", "convert", "--quality", "0"]).is_err());
        assert!(Cli::try_parse_from(["agesort", "convert", "--quality", "101"]).is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from([
            "agesort", "history", "undo", "--count", "3", "--format", "json", "--history", "/tmp/j.jsonl"
        ]).unwrap();
        assert_eq!(cli.format, "json");
        assert_eq!(cli.history, Some(PathBuf::from("/tmp/j.jsonl")));
        match cli.command {
            Commands::History { action: HistoryCommands::Undo { count, dry_run } } => {
                assert_eq!(count, 3);
                assert!(!dry_run);
            }
            _ => panic!("Expected History Undo command"),
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["agesort"]).is_err());
    }

    #[test]
    fn test_scaffold_creates_bucket_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Organised");
        let buckets = AgeBuckets::default().with_prefix("age");

        let created = create_bucket_folders(&root, &buckets).unwrap();

        assert_eq!(created.len(), 20);
        assert!(root.join("age1-5").is_dir());
        assert!(root.join("age96-100").is_dir());
        // Second run is a no-op
        assert_eq!(create_bucket_folders(&root, &buckets).unwrap().len(), 20);
    }
}
