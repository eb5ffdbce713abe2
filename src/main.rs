use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use sales_etl::config::Config;
use sales_etl::constants::{cleaned_name, PRODUCTS_FILE};
use sales_etl::infra::SqliteConnector;
use sales_etl::logging;
use sales_etl::metrics::{all_metrics_documentation, init_metrics, write_snapshot, METRICS_FILE_ENV};
use sales_etl::pipeline::numeric::{default_rules, normalize_file};
use sales_etl::pipeline::sanitize::sanitize_file;
use sales_etl::pipeline::{Pipeline, RunOptions, StoreStage};

#[derive(Parser)]
#[command(name = "sales_etl")]
#[command(about = "Split, sanitize and filter an e-commerce sales export for relational import")]
#[command(version)]
struct Cli {
    /// Path to the pipeline config file (defaults are used if it does not exist)
    #[arg(long, global = true, default_value = "pipeline.toml")]
    config: PathBuf,

    /// Override `paths.work_dir`
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage in order
    Run {
        /// Stop after the integrity check
        #[arg(long)]
        skip_store: bool,
    },
    /// Split the raw export into products, users and reviews
    Split {
        /// Override `paths.raw_input`
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Write cleaned_<name> copies of the given artifacts
    Sanitize {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Normalize price, count and percentage columns in place
    Normalize {
        /// Defaults to cleaned_products.csv in the work directory
        file: Option<PathBuf>,
    },
    /// Report orphaned foreign keys between the cleaned tables
    Check,
    /// Build the import-ready reviews file from the store's product keys
    Filter,
    /// List every metric the pipeline records
    Metrics,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(work_dir) = cli.work_dir {
        config.paths.work_dir = work_dir;
    }
    if let Commands::Split { input: Some(input) } = &cli.command {
        config.paths.raw_input = input.clone();
    }

    let _guard = logging::init_logging(&config.paths.log_dir);
    info!(config = ?config.paths, "Starting sales_etl");

    let metrics_file = std::env::var(METRICS_FILE_ENV).ok().map(PathBuf::from);
    if metrics_file.is_some() {
        init_metrics();
    }

    let connector = SqliteConnector;
    let pipeline = Pipeline::new(&config, &connector);

    match cli.command {
        Commands::Run { skip_store } => {
            let report = pipeline.run(RunOptions { skip_store }).context("pipeline run failed")?;
            match report.store_filter {
                StoreStage::Completed(_) => println!("\nPipeline completed."),
                StoreStage::Skipped => println!("\nPipeline completed (store stage skipped)."),
                StoreStage::Failed(reason) => {
                    error!("Store stage failed: {}", reason);
                    println!("\nPipeline completed without the import file: {}", reason);
                }
            }
        }
        Commands::Split { .. } => {
            pipeline.split().context("split failed")?;
        }
        Commands::Sanitize { files } => {
            let map = config.replacement_map()?;
            for file in files {
                let report = sanitize_file(&file, &map)
                    .with_context(|| format!("sanitizing {}", file.display()))?;
                println!(
                    "{}: {} of {} text cells changed",
                    file.display(),
                    report.cells_changed,
                    report.cells_seen
                );
            }
        }
        Commands::Normalize { file } => {
            let path = file.unwrap_or_else(|| config.artifact(&cleaned_name(PRODUCTS_FILE)));
            let report = normalize_file(&path, &default_rules(), config.currency.rate)
                .with_context(|| format!("normalizing {}", path.display()))?;
            for diagnostic in &report.diagnostics {
                println!("{} (column {}, row {})", diagnostic.reason, diagnostic.column, diagnostic.row);
            }
        }
        Commands::Check => {
            pipeline.check_integrity().context("integrity check failed")?;
        }
        Commands::Filter => {
            if let StoreStage::Failed(reason) = pipeline.filter_for_import() {
                anyhow::bail!("store filter failed: {}", reason);
            }
        }
        Commands::Metrics => {
            println!("📊 Pipeline metrics");
            for doc in all_metrics_documentation() {
                println!("  {:<45} {:<10} {}", doc.name, format!("{:?}", doc.metric_type), doc.help);
            }
        }
    }

    if let Some(path) = metrics_file {
        write_snapshot(&path).with_context(|| format!("writing metrics to {}", path.display()))?;
    }

    Ok(())
}
