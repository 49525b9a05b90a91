//! punmigrate: archived forum export to SQL migration
//!
//! Turns a directory of archived PunBB-style HTML pages back into a
//! normalized database, featuring:
//! - Page-type dispatch over index, forum, topic, poll, and profile pages
//! - HTML-to-BBCode message reconstruction
//! - A concurrent worker pool behind a bounded file queue
//! - Deferred topic resolution for posts whose topic id never appears
//!   on their own page
//! - Idempotent, rerunnable writes through a serialized sink

pub mod config;
pub mod extract;
pub mod ingest;
pub mod model;
pub mod resolve;
pub mod sink;
pub mod util;

pub use config::{IngestConfig, SinkConfig};
pub use model::*;
