//! form4 CLI binary.
//!
//! Enriches insider-purchase tables with derived features and prepares them
//! for classification.

mod integration;

use clap::{ArgAction, Parser, Subcommand};
use form4_features::{DateAlignment, EnrichConfig, EnrichSummary, VolatilityWindow};
use form4_table::{LabelConfig, TransactionTable, label_file};
use indicatif::{ProgressBar, ProgressStyle};
use integration::cache_manager;
use integration::enrichment::{FetchConfig, enrich_records};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "form4")]
#[command(about = "form4: feature enrichment for insider purchase filings", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append derived features to a transaction table
    Enrich {
        /// Transaction table (CSV)
        #[arg(long)]
        input: PathBuf,

        /// Enriched table to write (CSV)
        #[arg(long)]
        output: PathBuf,

        /// Directory of <SYMBOL>.csv price files and sectors.csv
        #[arg(long)]
        data_dir: PathBuf,

        /// Run configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Maximum concurrent data requests
        #[arg(long)]
        concurrency: Option<usize>,

        /// Map non-trading dates to the nearest earlier trading day
        #[arg(long)]
        align_dates: bool,

        /// Use the 2-week window for both volatility figures
        #[arg(long)]
        legacy_volatility: bool,

        /// Disable caching (always read the data directory)
        #[arg(long)]
        no_cache: bool,

        /// Force refresh cached data
        #[arg(long)]
        refresh: bool,

        /// Summary format (json or text)
        #[arg(long, default_value = "text")]
        summary: String,
    },

    /// Prepare an enriched table for classification
    Label {
        /// Enriched table (CSV)
        #[arg(long)]
        input: PathBuf,

        /// Labelled dataset to write (CSV)
        #[arg(long)]
        output: PathBuf,

        /// Minimum open-exit return of a positive example
        #[arg(long, default_value = "0.07")]
        threshold: f64,
    },

    /// Show or clear the data cache
    Cache {
        /// Remove every cached entry of this symbol
        #[arg(long)]
        clear: Option<String>,
    },
}

/// Options of the `enrich` command.
struct EnrichArgs {
    input: PathBuf,
    output: PathBuf,
    data_dir: PathBuf,
    config: EnrichConfig,
    fetch: FetchConfig,
    summary: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Enrich {
            input,
            output,
            data_dir,
            config,
            concurrency,
            align_dates,
            legacy_volatility,
            no_cache,
            refresh,
            summary,
        } => {
            let mut enrich_config = match config {
                Some(path) => EnrichConfig::from_path(path)?,
                None => EnrichConfig::default(),
            };
            if let Some(concurrency) = concurrency {
                enrich_config.concurrency = concurrency;
            }
            if align_dates {
                enrich_config.date_alignment = DateAlignment::NearestEarlier;
            }
            if legacy_volatility {
                enrich_config.volatility_window = VolatilityWindow::Legacy;
            }

            let args = EnrichArgs {
                input,
                output,
                data_dir,
                config: enrich_config,
                fetch: FetchConfig {
                    use_cache: !no_cache,
                    force_refresh: refresh,
                },
                summary,
            };
            enrich_table(args).await?;
        }
        Commands::Label {
            input,
            output,
            threshold,
        } => {
            label_table(&input, &output, threshold)?;
        }
        Commands::Cache { clear } => {
            if let Some(symbol) = clear {
                cache_manager::clear_symbol(&symbol)?;
                println!("Cleared cached data for {}", symbol);
            }
            println!("Cache:");
            cache_manager::print_cache_info();
        }
    }

    Ok(())
}

async fn enrich_table(args: EnrichArgs) -> Result<(), Box<dyn std::error::Error>> {
    let table = TransactionTable::from_path(&args.input)?;
    let json_summary = args.summary.eq_ignore_ascii_case("json");

    if !json_summary {
        println!(
            "Enriching {} transactions from {}",
            table.len(),
            args.input.display()
        );
        println!("  Data directory: {}", args.data_dir.display());
        if args.fetch.use_cache {
            cache_manager::print_cache_info();
            if args.fetch.force_refresh {
                println!("  Mode: Force refresh (re-reading all data)");
            }
        } else {
            println!("  Cache: Disabled");
        }
        println!();
    }

    let pb = ProgressBar::new(table.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let features = enrich_records(
        &args.data_dir,
        table.records(),
        args.config,
        &args.fetch,
        Some(&pb),
    )
    .await?;
    pb.finish_and_clear();

    table.write_enriched_to_path(&features, &args.output)?;

    let summary = EnrichSummary::from_features(&features);
    if json_summary {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary);
        println!("\nWrote {}", args.output.display());
    }
    Ok(())
}

fn label_table(input: &Path, output: &Path, threshold: f64) -> Result<(), Box<dyn std::error::Error>> {
    let summary = label_file(input, output, &LabelConfig { threshold })?;

    println!("Rows read:     {}", summary.rows_read);
    println!("Rows written:  {}", summary.rows_written);
    println!("Rows dropped:  {}", summary.rows_dropped);
    println!(
        "Class balance: {} positive / {} negative ({:.1}% positive)",
        summary.positive,
        summary.negative,
        summary.positive_share() * 100.0
    );
    if !summary.sectors.is_empty() {
        println!("\nSector codes:");
        for (code, sector) in summary.sectors.iter().enumerate() {
            println!("  {:>3}  {}", code, sector);
        }
    }
    if !summary.skipped_columns.is_empty() {
        println!("\nSkipped columns: {}", summary.skipped_columns.join(", "));
    }
    println!("\nWrote {}", output.display());
    Ok(())
}
