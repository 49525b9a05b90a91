//! Run configuration

use serde::{Deserialize, Serialize};

use crate::extract::DEFAULT_DATETIME_FORMAT;

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Worker thread count
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Maximum loaded-but-unparsed documents; bounds memory when files are
    /// read faster than they are parsed
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Display format the export rendered its dates with
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            date_format: default_date_format(),
        }
    }
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Database URL, e.g. `sqlite:forum.db`
    pub url: String,
    /// Optional table-name prefix
    #[serde(default)]
    pub table_prefix: Option<String>,
    /// Skip schema provisioning and write into the existing tables
    #[serde(default)]
    pub append: bool,
}

fn default_workers() -> usize {
    // One more worker than cores: some workers are usually parked on the
    // sink lock
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        + 1
}

fn default_queue_capacity() -> usize {
    16
}

fn default_date_format() -> String {
    DEFAULT_DATETIME_FORMAT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = IngestConfig::default();
        assert!(config.workers >= 2);
        assert_eq!(config.queue_capacity, 16);
        assert!(config.date_format.contains("%Y"));
    }
}
