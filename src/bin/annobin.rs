//! annobin CLI - Command-line interface for annobin
//!
//! Commands:
//! - run: Run the configured batch over whole folders
//! - resample: Resample one tier of one export
//! - merge: OR-merge two channel series
//! - conjoin: AND a merged series with a reference series
//! - config: Print the default configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use annobin::grid::DEFAULT_BIN_WIDTH_MS;
use annobin::merger::{DEFAULT_PRIMARY_CHANNEL, DEFAULT_SECONDARY_CHANNEL};
use annobin::pipeline::{conjoin_files, merge_files, resample_file};
use annobin::storage;
use annobin::{
    ActivationRule, BatchProcessor, BinarizeError, ChannelMerger, ColumnLayout, GridResampler,
    OverlapPolicy, PipelineConfig, ANNOBIN_VERSION,
};

/// annobin - Interval annotations to binary time series
#[derive(Parser)]
#[command(name = "annobin")]
#[command(version = ANNOBIN_VERSION)]
#[command(about = "Resample coded annotation tiers into binary series and merge channels", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured stage over the input folders
    Run {
        /// Configuration file (JSON); defaults are used when absent
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory that relative folder names are resolved against
        #[arg(long)]
        root: Option<PathBuf>,

        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resample one tier of an annotation export
    Resample {
        /// Annotation export (whitespace-delimited text)
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Tier to extract (exact match)
        #[arg(long)]
        tier: String,

        /// Labels that mark a bin active (comma-separated)
        #[arg(long, value_delimiter = ',', required = true)]
        labels: Vec<String>,

        /// Column layout of the export
        #[arg(long, value_enum, default_value = "auto")]
        layout: LayoutArg,

        /// Bin width in milliseconds
        #[arg(long, default_value_t = DEFAULT_BIN_WIDTH_MS)]
        bin_width: i64,

        /// Tie-break between overlapping intervals
        #[arg(long, value_enum, default_value = "last-wins")]
        overlap: OverlapArg,
    },

    /// OR-merge two channel series of the same subject
    Merge {
        /// Primary channel CSV
        #[arg(long)]
        primary: PathBuf,

        /// Secondary channel CSV
        #[arg(long)]
        secondary: PathBuf,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Provenance tag of the primary channel
        #[arg(long, default_value = DEFAULT_PRIMARY_CHANNEL)]
        primary_name: String,

        /// Provenance tag of the secondary channel
        #[arg(long, default_value = DEFAULT_SECONDARY_CHANNEL)]
        secondary_name: String,
    },

    /// AND a merged series with a reference series (inner join)
    Conjoin {
        /// Merged series CSV
        #[arg(long)]
        merged: PathBuf,

        /// Reference series CSV
        #[arg(long)]
        reference: PathBuf,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the default configuration as JSON
    Config,
}

#[derive(Clone, ValueEnum)]
enum LayoutArg {
    /// Tier, start, end, duration, label
    Five,
    /// Tier, participant, start, end, duration, label
    Six,
    /// Detect from the widest row
    Auto,
}

impl From<LayoutArg> for ColumnLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Five => ColumnLayout::Five,
            LayoutArg::Six => ColumnLayout::Six,
            LayoutArg::Auto => ColumnLayout::Auto,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OverlapArg {
    /// Last interval in input order wins
    LastWins,
    /// First interval in input order wins
    FirstWins,
}

impl From<OverlapArg> for OverlapPolicy {
    fn from(arg: OverlapArg) -> Self {
        match arg {
            OverlapArg::LastWins => OverlapPolicy::LastWins,
            OverlapArg::FirstWins => OverlapPolicy::FirstWins,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AnnobinCliError> {
    match cli.command {
        Commands::Run { config, root, json } => cmd_run(config.as_deref(), root.as_deref(), json),

        Commands::Resample {
            input,
            output,
            tier,
            labels,
            layout,
            bin_width,
            overlap,
        } => {
            let resampler = GridResampler::new(ActivationRule::any_of(&labels))
                .with_bin_width(bin_width)
                .with_policy(overlap.into());
            if resampler.rule().is_empty() {
                return Err(BinarizeError::InvalidConfig("no activation labels given".to_string()).into());
            }
            let series = resample_file(&input, &tier, layout.into(), &resampler)?;
            storage::write_binary_series(&output, &series)?;
            info!(
                "Saved to {} ({} bins, {} active)",
                output.display(),
                series.len(),
                series.active_count()
            );
            Ok(())
        }

        Commands::Merge {
            primary,
            secondary,
            output,
            primary_name,
            secondary_name,
        } => {
            let merger = ChannelMerger::new(primary_name, secondary_name);
            let merged = merge_files(&primary, &secondary, &merger)?;
            storage::write_merged_series(&output, &merged)?;
            info!("Saved merged file: {} ({} rows)", output.display(), merged.len());
            Ok(())
        }

        Commands::Conjoin {
            merged,
            reference,
            output,
        } => {
            let series = conjoin_files(&merged, &reference)?;
            storage::write_binary_series(&output, &series)?;
            info!("Saved: {} ({} rows)", output.display(), series.len());
            Ok(())
        }

        Commands::Config => {
            println!("{}", PipelineConfig::default().to_json()?);
            Ok(())
        }
    }
}

fn cmd_run(config: Option<&Path>, root: Option<&Path>, json: bool) -> Result<(), AnnobinCliError> {
    let mut config = match config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = root {
        config = config.rooted_at(root);
    }

    let processor = BatchProcessor::new(config)?;
    let report = processor.run_all()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Batch Report");
        println!("============");
        println!("Run:      {}", report.run_id);
        println!("Finished: {}", report.finished_at.to_rfc3339());
        println!();
        for stage in &report.stages {
            println!(
                "  [{}] {} written, {} skipped",
                stage.stage,
                stage.processed(),
                stage.skipped.len()
            );
            for skipped in &stage.skipped {
                println!("    - {} ({}): {}", skipped.input, skipped.code, skipped.reason);
            }
        }
        println!();
        println!("Total files processed: {}", report.total_processed);
    }

    Ok(())
}

// Error types

#[derive(Debug)]
enum AnnobinCliError {
    Binarize(BinarizeError),
    Json(serde_json::Error),
}

impl From<BinarizeError> for AnnobinCliError {
    fn from(e: BinarizeError) -> Self {
        AnnobinCliError::Binarize(e)
    }
}

impl From<serde_json::Error> for AnnobinCliError {
    fn from(e: serde_json::Error) -> Self {
        AnnobinCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<AnnobinCliError> for CliError {
    fn from(e: AnnobinCliError) -> Self {
        match e {
            AnnobinCliError::Binarize(e) => {
                let hint = match &e {
                    BinarizeError::MissingTier { .. } => Some("Check the tier name; it is case-sensitive"),
                    BinarizeError::MalformedRow { .. } => {
                        Some("Check the column layout (--layout five|six) of the export")
                    }
                    BinarizeError::InvalidInterval { .. } => {
                        Some("Check the export for a stray end time; times are in milliseconds")
                    }
                    BinarizeError::InvalidConfig(_) => Some("Run 'annobin config' for a valid template"),
                    BinarizeError::Io { .. } => Some("Check file paths and permissions"),
                    BinarizeError::Csv(_) => {
                        Some("Series files need a time_ms,center_ms,binary_value header")
                    }
                    _ => None,
                };
                CliError {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
            AnnobinCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
        }
    }
}
