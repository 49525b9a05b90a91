//! punmigrate: archived forum export to SQL migration

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use punmigrate::{
    config::{IngestConfig, SinkConfig},
    extract::{DateParser, Extractor},
    ingest::{collect_files, ConsoleProgress, Scheduler},
    sink::{RecordSink, SqliteSink},
};

#[derive(Parser)]
#[command(name = "punmigrate")]
#[command(about = "Migrate an archived forum HTML export into a SQL database")]
#[command(version)]
struct Cli {
    /// Directory containing the exported HTML pages
    directory: PathBuf,

    /// Database URL, e.g. sqlite:forum.db
    database_url: String,

    /// Write into an existing schema instead of provisioning a fresh one
    #[arg(long)]
    append: bool,

    /// Date format the export rendered timestamps with (strftime syntax)
    #[arg(long)]
    date_format: Option<String>,

    /// Table name prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Worker thread count (defaults to core count + 1)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Suppress the progress bar
    #[arg(short, long)]
    quiet: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = IngestConfig::default();
    if let Some(workers) = cli.workers {
        config.workers = workers.max(1);
    }
    if let Some(format) = cli.date_format {
        config.date_format = format;
    }

    let sink_config = SinkConfig {
        url: cli.database_url,
        table_prefix: cli.prefix,
        append: cli.append,
    };

    let files = collect_files(&cli.directory)
        .with_context(|| format!("couldn't read input directory {}", cli.directory.display()))?;
    anyhow::ensure!(
        !files.is_empty(),
        "no files found under {}",
        cli.directory.display()
    );

    let sink = SqliteSink::open(&sink_config.url, sink_config.table_prefix.as_deref())
        .with_context(|| format!("couldn't open database {}", sink_config.url))?;
    if !sink_config.append {
        sink.provision()
            .context("couldn't provision the database schema")?;
    }
    info!(
        files = files.len(),
        workers = config.workers,
        database = %sink_config.url,
        "starting migration"
    );

    let sink: Arc<dyn RecordSink> = Arc::new(sink);
    let progress = ConsoleProgress::new(files.len() as u64, cli.quiet);
    let extractor = Extractor::new(DateParser::with_format(&config.date_format));
    let scheduler = Scheduler::new(extractor, sink);

    let stats = scheduler.run(files, config.workers, config.queue_capacity, &progress)?;
    progress.finish(stats.orphans_flushed);

    // Per-record problems are already reported; a run that reaches the end
    // succeeded even if some records did not.
    Ok(())
}
