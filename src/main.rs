//! # NLQ Engine CLI (`nlq`)
//!
//! ## Usage
//!
//! ```bash
//! nlq --config ./config/nlq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nlq init [--demo]` | Create the document tables (and the sample dataset) |
//! | `nlq schema` | Print the discovered schema as JSON |
//! | `nlq ingest <path>...` | Ingest files or directories as one batch |
//! | `nlq query "<text>"` | Answer a question and print the result as JSON |
//! | `nlq serve` | Start the HTTP server |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `nlq_engine=info`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use nlq_engine::config::{self, Config};
use nlq_engine::progress::ProgressMode;
use nlq_engine::service::QueryService;
use nlq_engine::{db, files, migrate, server};

/// NLQ Engine: routes free-text questions to SQL or document search.
#[derive(Parser)]
#[command(
    name = "nlq",
    about = "Routes free-text questions across a relational dataset and uploaded documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/nlq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the `documents` and `doc_index` tables. Idempotent.
    Init {
        /// Also create and fill the `employees` / `departments` sample tables.
        #[arg(long)]
        demo: bool,
    },

    /// Print the discovered schema as JSON.
    Schema,

    /// Ingest files as one batch.
    ///
    /// Directories are walked using the `[ingest]` include/exclude globs.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Answer a free-text question.
    Query {
        /// The question.
        text: String,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init { demo } => run_init(&cfg, demo).await?,
        Commands::Schema => {
            let service = QueryService::open(&cfg).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(service.schema_snapshot())?
            );
            service.close().await;
        }
        Commands::Ingest { paths, progress } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            run_ingest(&cfg, &paths, mode).await?;
        }
        Commands::Query { text } => {
            let service = QueryService::open(&cfg).await?;
            let result = service.run_query(&text).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            service.close().await;
        }
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nlq_engine=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_init(cfg: &Config, demo: bool) -> Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::run_migrations(&pool).await?;
    println!("Database initialized successfully.");

    if demo {
        if migrate::seed_demo_dataset(&pool).await? {
            println!("Demo dataset created.");
        } else {
            println!("Demo dataset already present.");
        }
    }

    pool.close().await;
    Ok(())
}

async fn run_ingest(cfg: &Config, paths: &[PathBuf], mode: ProgressMode) -> Result<()> {
    let batch = files::collect_files(paths, &cfg.ingest)?;
    let service = QueryService::open(cfg).await?;
    let reporter = mode.reporter();

    let job_id = service.start_ingestion(batch);
    let mut last = None;
    let job = loop {
        let Some(job) = service.ingestion_status(&job_id) else {
            anyhow::bail!("ingestion job disappeared: {}", job_id);
        };
        if last.as_ref() != Some(&job) {
            reporter.report(&job);
            last = Some(job.clone());
        }
        if job.done {
            break job;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };

    println!("ingest {}", job.id);
    println!("  documents: {}", job.processed);
    println!("  failed: {}", job.failed);
    println!("ok");

    service.close().await;
    Ok(())
}
