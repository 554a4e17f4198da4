//! csvload - bulk CSV loader

use anyhow::{Context, Result};
use clap::Parser;
use csvload::config::{
    LoaderConfig, DEFAULT_CSV_FILE, DEFAULT_DELIMITER, DEFAULT_PROGRESS_EVERY,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_RETRY_DELAY_MS, DEFAULT_TABLE, DEFAULT_WORKERS,
};
use csvload::db::{create_pool, DbConfig};
use csvload::sink::{MemorySink, PgRowSink};
use csvload::source::CsvRowSource;
use csvload::pipeline::secs_ceil;
use csvload::LoadReport;
use csvload_common::logging::{init_logging, LogConfig, LogLevel};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "csvload")]
#[command(author, version, about = "Bulk-load a CSV file into a database table")]
struct Cli {
    /// CSV file to load; its first record is the header
    #[arg(short, long, env = "CSVLOAD_FILE", default_value = DEFAULT_CSV_FILE)]
    file: PathBuf,

    /// Target table, optionally schema qualified
    #[arg(short, long, env = "CSVLOAD_TABLE", default_value = DEFAULT_TABLE)]
    table: String,

    /// Number of concurrent insert workers
    #[arg(short, long, env = "CSVLOAD_WORKERS", default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Jobs buffered between reader and workers (0 = unbounded)
    #[arg(long, env = "CSVLOAD_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Delay before retrying a failed insert, in milliseconds
    #[arg(long, env = "CSVLOAD_RETRY_DELAY_MS", default_value_t = DEFAULT_RETRY_DELAY_MS)]
    retry_delay_ms: u64,

    /// Log progress every N rows inserted by a worker (0 = off)
    #[arg(long, env = "CSVLOAD_PROGRESS_EVERY", default_value_t = DEFAULT_PROGRESS_EVERY)]
    progress_every: u64,

    /// Comma separated target columns, in insert order (default: file header)
    #[arg(long, env = "CSVLOAD_COLUMNS", value_delimiter = ',')]
    columns: Option<Vec<String>>,

    /// Field delimiter
    #[arg(short, long, env = "CSVLOAD_DELIMITER", default_value_t = DEFAULT_DELIMITER)]
    delimiter: char,

    /// Run the whole pipeline against an in-memory sink instead of the database
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            file: self.file.clone(),
            table: self.table.clone(),
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            retry_delay_ms: self.retry_delay_ms,
            progress_every: self.progress_every,
            columns: self.columns.clone(),
            delimiter: self.delimiter,
            dry_run: self.dry_run,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let started = Instant::now();
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("csvload")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        },
    };

    match load(cli.loader_config()).await {
        Ok(report) => {
            if let Some(ref source_error) = report.source_error {
                error!(error = %source_error, "Input was not read to the end");
            }
            info!(
                inserted = report.inserted,
                skipped = report.skipped,
                "Done in {} seconds",
                secs_ceil(started.elapsed())
            );
            ExitCode::SUCCESS
        },
        Err(e) => {
            error!(error = %format!("{:#}", e), "Load failed");
            ExitCode::FAILURE
        },
    }
}

async fn load(config: LoaderConfig) -> Result<LoadReport> {
    config.validate()?;

    info!(file = %config.file.display(), "Opening CSV file");
    let source = CsvRowSource::open(&config.file, config.delimiter_byte()?)
        .await
        .context("Failed to open CSV file")?;

    if config.dry_run {
        let sink = Arc::new(MemorySink::new());
        let report = csvload::run(source, sink.clone(), &config).await?;
        info!(rows = sink.len(), "Dry run complete, nothing was written to the database");
        return Ok(report);
    }

    let db_config = DbConfig::from_env().context("Invalid database configuration")?;
    config.check_pool_sizing(db_config.max_connections);

    let pool = create_pool(&db_config)
        .await
        .context("Failed to connect to database")?;
    let sink = PgRowSink::for_table(pool.clone(), &config.table)
        .await
        .context("Failed to inspect target table")?;

    let report = csvload::run(source, Arc::new(sink), &config).await?;
    pool.close().await;

    Ok(report)
}
