//! Progress reporting
//!
//! Tasks report through an injected interface rather than writing to the
//! terminal themselves, so the pool stays testable and quiet runs stay
//! quiet.

use std::sync::atomic::{AtomicU64, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

/// Per-item progress consumer. Implementations must tolerate concurrent
/// calls from every worker.
pub trait ProgressReporter: Send + Sync {
    /// Called once per input item, with the errors that item accumulated
    /// (empty for a clean item).
    fn report(&self, item: &str, errors: &[String]);
}

/// Terminal progress: a bar plus per-file error lines, and a final
/// summary.
pub struct ConsoleProgress {
    bar: Option<ProgressBar>,
    processed: AtomicU64,
    items_with_errors: AtomicU64,
    total_errors: AtomicU64,
}

impl ConsoleProgress {
    pub fn new(goal: u64, quiet: bool) -> Self {
        let bar = if quiet {
            None
        } else {
            let bar = ProgressBar::new(goal);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(bar)
        };
        Self {
            bar,
            processed: AtomicU64::new(0),
            items_with_errors: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
        }
    }

    /// Finish the bar and print the per-run summary.
    pub fn finish(&self, orphans_flushed: u64) {
        let processed = self.processed.load(Ordering::Relaxed);
        let with_errors = self.items_with_errors.load(Ordering::Relaxed);
        let errors = self.total_errors.load(Ordering::Relaxed);
        let summary = format!(
            "{processed} files processed, {with_errors} with errors \
             ({errors} record errors), {orphans_flushed} orphaned posts flushed"
        );
        match &self.bar {
            Some(bar) => {
                bar.finish_with_message(summary);
            }
            None => warn!(
                processed,
                with_errors, errors, orphans_flushed, "ingestion finished"
            ),
        }
    }

    /// (processed, items with errors, total record errors)
    pub fn counts(&self) -> (u64, u64, u64) {
        (
            self.processed.load(Ordering::Relaxed),
            self.items_with_errors.load(Ordering::Relaxed),
            self.total_errors.load(Ordering::Relaxed),
        )
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, item: &str, errors: &[String]) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if !errors.is_empty() {
            self.items_with_errors.fetch_add(1, Ordering::Relaxed);
            self.total_errors
                .fetch_add(errors.len() as u64, Ordering::Relaxed);
        }
        match &self.bar {
            Some(bar) => {
                for error in errors {
                    bar.println(format!("{item}: {error}"));
                }
                bar.set_message(item.to_string());
                bar.inc(1);
            }
            None => {
                for error in errors {
                    warn!(item, "{error}");
                }
            }
        }
    }
}

/// Discards all reports. For tests and embedding.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn report(&self, _item: &str, _errors: &[String]) {}
}
