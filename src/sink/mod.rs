//! Persistence sink
//!
//! A sink accepts extracted records and writes each destination row at most
//! once (insert-if-absent by primary key), which is what makes whole runs
//! safely repeatable. Sinks serialize their writes internally; callers may
//! hammer them from any number of threads but must not assume calls overlap.

mod schema;
mod sqlite;

pub use schema::{provision_statements, Dialect};
pub use sqlite::SqliteSink;

use thiserror::Error;

use crate::model::{Post, Record};

/// Sink failures.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink is closed")]
    Closed,

    /// A post with an unresolved parent reached `insert`; posts must go
    /// through the resolution table first.
    #[error("post {0} still has an unresolved parent")]
    UnresolvedParent(u32),

    #[error("unsupported database url '{0}' (expected sqlite:PATH or a file path)")]
    UnsupportedUrl(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Idempotent, internally-serialized record gateway.
pub trait RecordSink: Send + Sync {
    /// Write one record. A row with the same primary key already present is
    /// a silent no-op. Posts must carry a resolved `ParentRef::Topic`.
    fn insert(&self, record: &Record) -> Result<(), SinkError>;

    /// Write a post under an explicitly resolved topic id, regardless of
    /// the `ParentRef` the post still carries.
    fn insert_post(&self, post: &Post, topic_id: u32) -> Result<(), SinkError>;

    /// Close the sink. Idempotent; any later insert fails fast with
    /// [`SinkError::Closed`].
    fn close(&self) -> Result<(), SinkError>;
}
