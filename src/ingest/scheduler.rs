//! Ingestion scheduling
//!
//! One task per input file, fanned out over a fixed pool of workers
//! through a bounded queue. The producer reads file bytes (cheap, keeps
//! unreadable-file reporting in one place); workers parse, extract, and
//! write. A task runs to completion once started; its failures are
//! accumulated and reported, never propagated to sibling tasks.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::bounded;
use scraper::Html;
use tracing::{error, info};

use super::{IngestError, ProgressReporter};
use crate::extract::{Extraction, Extractor};
use crate::model::{ParentRef, Post, Record, UNKNOWN_TOPIC_ID};
use crate::resolve::ResolutionTable;
use crate::sink::RecordSink;

/// End-of-run accounting.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    /// Files dispatched (including unreadable ones)
    pub files: u64,
    /// Files that could not be read at all
    pub unreadable_files: u64,
    /// Record-granularity errors (extraction or write)
    pub record_errors: u64,
    /// Posts written under the sentinel topic id at the final flush
    pub orphans_flushed: u64,
}

struct IngestTask {
    html: Vec<u8>,
    name: String,
}

/// Drives files through extraction, resolution, and the sink.
pub struct Scheduler {
    extractor: Extractor,
    table: ResolutionTable,
    sink: Arc<dyn RecordSink>,
}

impl Scheduler {
    pub fn new(extractor: Extractor, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            extractor,
            table: ResolutionTable::new(),
            sink,
        }
    }

    /// Process every file, block until all tasks finish, flush still-pending
    /// posts under the sentinel topic id, and close the sink.
    ///
    /// Returns fatal errors only; per-record failures surface through
    /// `progress` and the returned stats.
    pub fn run(
        &self,
        files: Vec<PathBuf>,
        workers: usize,
        queue_capacity: usize,
        progress: &dyn ProgressReporter,
    ) -> Result<IngestStats, IngestError> {
        let workers = workers.max(1);
        let (task_tx, task_rx) = bounded::<IngestTask>(queue_capacity.max(1));
        let record_errors = AtomicU64::new(0);
        let unreadable = AtomicU64::new(0);
        let total = files.len() as u64;

        info!(files = total, workers, "starting ingestion");

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let task_rx = task_rx.clone();
                let record_errors = &record_errors;
                scope.spawn(move || {
                    while let Ok(task) = task_rx.recv() {
                        let errors = self.process_task(&task);
                        record_errors.fetch_add(errors.len() as u64, Ordering::Relaxed);
                        progress.report(&task.name, &errors);
                    }
                });
            }
            drop(task_rx);

            for path in &files {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                match std::fs::read(path) {
                    Ok(html) => {
                        if task_tx.send(IngestTask { html, name }).is_err() {
                            // All workers gone; nothing will drain the queue
                            break;
                        }
                    }
                    Err(err) => {
                        unreadable.fetch_add(1, Ordering::Relaxed);
                        progress.report(&name, &[format!("couldn't read file: {err}")]);
                    }
                }
            }
            drop(task_tx);
        });

        // Workers are done; the pending set is final. Anything still in it
        // belongs to a topic the corpus never named.
        let sink = Arc::clone(&self.sink);
        let orphans_flushed = self
            .table
            .flush_all_remaining(UNKNOWN_TOPIC_ID, move |post, topic_id| {
                if let Err(err) = sink.insert_post(&post, topic_id) {
                    error!(post = post.id, "write failed at final flush: {err}");
                }
            }) as u64;
        self.sink.close()?;

        let stats = IngestStats {
            files: total,
            unreadable_files: unreadable.into_inner(),
            record_errors: record_errors.into_inner(),
            orphans_flushed,
        };
        info!(?stats, "ingestion finished");
        Ok(stats)
    }

    /// One file: parse, extract, write or defer each record in document
    /// order. Returns the human-readable errors this file accumulated.
    fn process_task(&self, task: &IngestTask) -> Vec<String> {
        let html = String::from_utf8_lossy(&task.html);
        let document = Html::parse_document(&html);
        let Extraction { records, errors } = self.extractor.extract(&document);

        let mut report: Vec<String> = errors
            .into_iter()
            .map(|error| format!("error in input data: {error}"))
            .collect();

        // Posts without an embedded topic id; they form one page and are
        // filed (or resolved) together after the rest of the records
        let mut deferred: Vec<Post> = Vec::new();

        for record in records {
            match record {
                Record::Topic(topic) => {
                    if let Err(err) = self.sink.insert(&Record::Topic(topic.clone())) {
                        report.push(format!("write failed for topic {}: {err}", topic.id));
                    }
                    // The topic row and the resolution entry are independent:
                    // a failed row write must not strand pending posts
                    let outcome = self.table.resolve_and_flush(
                        topic.last_post_id,
                        topic.id,
                        |post, topic_id| self.write_resolved(post, topic_id),
                    );
                    if let Err(err) = outcome {
                        report.push(format!("error in input data: {err}"));
                    }
                }
                Record::Post(post) => match post.topic {
                    ParentRef::Topic(topic_id) => {
                        if let Err(err) = self.sink.insert_post(&post, topic_id) {
                            report.push(format!("write failed for post {}: {err}", post.id));
                        }
                    }
                    ParentRef::LastPost(_) => deferred.push(post),
                },
                other => {
                    if let Err(err) = self.sink.insert(&other) {
                        report.push(format!("write failed for {other}: {err}"));
                    }
                }
            }
        }

        if !deferred.is_empty() {
            // The page is indexed under every post id it contains, so a
            // listing whose last-post id points anywhere in the page drains
            // it. Immediate resolution writes into this file's report.
            let keys: Vec<u32> = deferred.iter().map(|post| post.id).collect();
            self.table
                .file_page_if_unresolved(deferred, &keys, |post, topic_id| {
                    if let Err(err) = self.sink.insert_post(&post, topic_id) {
                        report.push(format!("write failed for post {}: {err}", post.id));
                    }
                });
        }

        report
    }

    /// Write a post drained out of the resolution table. The post may
    /// belong to a file reported long ago, so failures go to the log
    /// rather than to any one file's report.
    fn write_resolved(&self, post: Post, topic_id: u32) {
        if let Err(err) = self.sink.insert_post(&post, topic_id) {
            error!(post = post.id, topic_id, "write failed for resolved post: {err}");
        }
    }
}
