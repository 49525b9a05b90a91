//! Concurrent ingestion
//!
//! The scheduler fans discovered files out to a fixed worker pool, each
//! worker extracting records and driving them into the sink, deferring
//! posts whose topic is not yet known through the resolution table.

mod progress;
mod scheduler;
mod walk;

pub use progress::{ConsoleProgress, ProgressReporter, SilentProgress};
pub use scheduler::{IngestStats, Scheduler};
pub use walk::collect_files;

use thiserror::Error;

use crate::sink::SinkError;

/// Fatal setup failures. Everything that happens after workers start is
/// recovered per record and reported, never raised.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("couldn't list input directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Sink(#[from] SinkError),
}
