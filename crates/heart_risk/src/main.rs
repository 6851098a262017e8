//! Heart-disease risk setup tool.
//!
//! Provisions the prediction store and trains the classifiers the serving
//! application loads.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::HeartConfig;
use heart_risk::commands;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Heart-disease risk setup tool
#[derive(Parser)]
#[command(name = "heart-risk")]
#[command(about = "Store schema setup and model training for the heart-disease risk demo")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Base directory for `database/`, `models/` and `data/` (overrides `HEART_BASE_DIR`)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop and recreate the predictions table
    InitDb,

    /// Train and evaluate all classifiers, then save the artifacts
    Train {
        /// Skip the remote dataset and read the local file only
        #[arg(long)]
        offline: bool,

        /// Remote dataset URL
        #[arg(long, conflicts_with = "offline")]
        dataset_url: Option<String>,

        /// Local dataset file (default: `data/heart.csv` under the base dir)
        #[arg(long)]
        data_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // --verbose wins over RUST_LOG; otherwise RUST_LOG wins over the default.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli).await {
        error!(error = %format!("{e:#}"), "Setup failed");
        eprintln!("[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = HeartConfig::from_env()?;
    if let Some(base_dir) = cli.base_dir {
        config = config.with_base_dir(base_dir);
    }

    match cli.command {
        Commands::InitDb => {
            commands::init_db::run(&config).await?;
        }
        Commands::Train {
            offline,
            dataset_url,
            data_file,
        } => {
            if let Some(url) = dataset_url {
                config = config.with_dataset_url(url);
            }
            if offline {
                config = config.offline();
            }
            if let Some(path) = data_file {
                config = config.with_data_file(path);
            }
            commands::train::run(&config).await?;
        }
    }

    Ok(())
}
