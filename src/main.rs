use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use human_bytes::human_bytes;
use memory_stats::memory_stats;
use tracing::{debug, error, info};

use es_bulk_loader::conf::Config;
use es_bulk_loader::connection::{connect, ConnectionSettings};
use es_bulk_loader::errors::{EsError, Result};
use es_bulk_loader::frame::parse_records;
use es_bulk_loader::indices;
use es_bulk_loader::loader::{BasicInfo, BulkLoader, LoaderOptions, SubmitMode};
use es_bulk_loader::logging;

#[derive(Parser, Debug)]
#[command(name = "es-bulk-loader", version, about)]
struct Args {
    /// Sets a config file (TOML, or JSON by extension)
    #[arg(short, long)]
    config: PathBuf,

    /// Enable debug mode
    #[arg(short, long, action = ArgAction::SetTrue)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bulk-load records from a JSON, JSON-lines or split-frame file
    Load {
        #[arg(short, long)]
        file: PathBuf,
        #[arg(short, long)]
        index: String,
        #[arg(long)]
        doc_id: String,
        /// Date string stored as date_str; defaults to today
        #[arg(long)]
        date: Option<String>,
        #[arg(short, long)]
        username: Option<String>,
        /// Submit each chunk as one blocking request
        #[arg(long, action = ArgAction::SetTrue)]
        sync: bool,
        #[arg(long)]
        chunk_size: Option<usize>,
        #[arg(long)]
        pause_secs: Option<u64>,
    },
    /// Check whether an index exists
    Exists {
        #[arg(short, long)]
        index: String,
    },
    /// Delete an index
    Delete {
        #[arg(short, long)]
        index: String,
        #[arg(long, action = ArgAction::SetTrue)]
        if_exists: bool,
    },
    /// Print cluster info
    Info,
}

fn log_memory_usage(prefix: &str) {
    if let Some(usage) = memory_stats() {
        info!(
            "{}: physical={}, virtual={}",
            prefix,
            human_bytes(usage.physical_mem as f64),
            human_bytes(usage.virtual_mem as f64)
        );
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = Config::load(&args.config)?;
    debug!("Config file loaded correctly ... {:?}", config.get_hostname());

    let settings = ConnectionSettings::from_config(&config);
    let client = connect(config.get_mode(), &settings).await?;

    match args.command {
        Commands::Load {
            file,
            index,
            doc_id,
            date,
            username,
            sync,
            chunk_size,
            pause_secs,
        } => {
            let content = tokio::fs::read_to_string(&file).await?;
            let records = parse_records(&content)?;
            info!("Read {} records from {:?}", records.len(), file);
            log_memory_usage("After reading records");

            let mut options = LoaderOptions::from_config(&config);
            if sync {
                options.mode = SubmitMode::Sync;
            }
            if let Some(chunk_size) = chunk_size {
                options.chunk_size = chunk_size;
            }
            if let Some(pause_secs) = pause_secs {
                options.pause = std::time::Duration::from_secs(pause_secs);
            }

            let now = Utc::now();
            let date = date.unwrap_or_else(|| now.format("%Y-%m-%d").to_string());
            let info = BasicInfo {
                doc_id: &doc_id,
                timestamp: now,
                date_and_time: &date,
                username: username.as_deref(),
            };
            let report = BulkLoader::new(&client, options)
                .bulk_load(&records, &index, &info)
                .await?;
            if report.is_complete() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Exists { index } => {
            if indices::index_exists(&client, &index).await? {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Delete { index, if_exists } => {
            if if_exists {
                indices::delete_index_if_exists(&client, &index).await?;
            } else {
                indices::delete_index(&client, &index).await?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Info => {
            client.print_server_info("Cluster").await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.debug);

    info!(
        "Application started! debug={:?}, config_path={:?}",
        args.debug, args.config
    );

    match run(args).await {
        Ok(code) => code,
        Err(err @ EsError::Connection { .. }) => {
            error!("{}", err);
            ExitCode::from(2)
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
