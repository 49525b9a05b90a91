//! Cross-file parent resolution
//!
//! Topic listing pages state "the most recent post in this topic is X";
//! topic pages without page links never state their own topic id. The table
//! bridges the two: it maps a last-post id (the derived key) to the real
//! topic id, and holds pages of posts that arrived before their mapping
//! did. A pending page is indexed under every post id it contains, so a
//! listing captured before the page's final reply still resolves it.
//!
//! All map mutation happens under one lock. Posts drained for writing are
//! handed to the caller after the lock is released, so the write function
//! may touch the sink without any lock-ordering hazard; ownership of the
//! drained posts guarantees each is written once.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

use crate::model::Post;

/// Resolution failures. Unresolved parents are not errors; only a derived
/// key claimed by two different topics is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Two topics claim the same last-post id. Well-formed exports never do
    /// this; refusing the remap keeps the earlier mapping authoritative and
    /// leaves any pending posts for the end-of-run flush.
    #[error(
        "derived key {key} already maps to topic {existing}; refusing remap to topic {conflicting}"
    )]
    DerivedKeyCollision {
        key: u32,
        existing: u32,
        conflicting: u32,
    },
}

#[derive(Default)]
struct State {
    /// derived key (a topic's last-post id) -> topic id
    parents: BTreeMap<u32, u32>,
    /// pending pages of posts, by table-assigned page id
    pages: BTreeMap<u64, Vec<Post>>,
    /// post id -> ids of pending pages containing that post. Entries go
    /// stale once their page drains through another key; stale page ids are
    /// skipped on lookup.
    by_key: BTreeMap<u32, Vec<u64>>,
    next_page: u64,
}

/// Thread-safe derived-key resolution table. Shared by all worker threads
/// for the duration of a run.
#[derive(Default)]
pub struct ResolutionTable {
    state: Mutex<State>,
}

impl ResolutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Non-blocking lookup of a derived key.
    pub fn try_resolve(&self, derived_key: u32) -> Option<u32> {
        self.lock().parents.get(&derived_key).copied()
    }

    /// Write `post` immediately if `derived_key` is already resolved,
    /// otherwise file it for later. Returns `true` if the post was written,
    /// `false` if it was filed.
    pub fn file_if_unresolved<F>(&self, post: Post, derived_key: u32, write: F) -> bool
    where
        F: FnMut(Post, u32),
    {
        self.file_page_if_unresolved(vec![post], &[derived_key], write)
    }

    /// Write a whole page of posts immediately if any of `keys` is already
    /// resolved, otherwise file the page under every key. Returns `true` if
    /// the posts were written, `false` if they were filed. The check and the
    /// filing happen under the table lock, so a concurrent
    /// `resolve_and_flush` either sees the page in the pending set or has
    /// already published the mapping read here.
    pub fn file_page_if_unresolved<F>(&self, posts: Vec<Post>, keys: &[u32], mut write: F) -> bool
    where
        F: FnMut(Post, u32),
    {
        let parent = {
            let mut state = self.lock();
            match keys.iter().find_map(|key| state.parents.get(key).copied()) {
                Some(parent) => parent,
                None => {
                    let page = state.next_page;
                    state.next_page += 1;
                    for &key in keys {
                        state.by_key.entry(key).or_default().push(page);
                    }
                    state.pages.insert(page, posts);
                    return false;
                }
            }
        };
        for post in posts {
            write(post, parent);
        }
        true
    }

    /// Publish `derived_key -> parent_id` and drain every pending page
    /// indexed under that key, invoking `write` for each post with the
    /// now-known parent id. Returns the number of posts drained.
    ///
    /// Re-publishing an identical mapping is an idempotent success
    /// (duplicate exports). A conflicting mapping is refused loudly.
    pub fn resolve_and_flush<F>(
        &self,
        derived_key: u32,
        parent_id: u32,
        mut write: F,
    ) -> Result<usize, ResolveError>
    where
        F: FnMut(Post, u32),
    {
        let drained = {
            let mut state = self.lock();
            if let Some(&existing) = state.parents.get(&derived_key) {
                if existing != parent_id {
                    warn!(
                        derived_key,
                        existing, conflicting = parent_id, "derived key collision"
                    );
                    return Err(ResolveError::DerivedKeyCollision {
                        key: derived_key,
                        existing,
                        conflicting: parent_id,
                    });
                }
            }
            state.parents.insert(derived_key, parent_id);
            let page_ids = state.by_key.remove(&derived_key).unwrap_or_default();
            let mut posts = Vec::new();
            for page in page_ids {
                // Already drained through another of its keys, if absent
                if let Some(mut page_posts) = state.pages.remove(&page) {
                    posts.append(&mut page_posts);
                }
            }
            posts
        };

        if !drained.is_empty() {
            debug!(
                derived_key,
                parent_id,
                count = drained.len(),
                "draining pending posts"
            );
        }
        let count = drained.len();
        for post in drained {
            write(post, parent_id);
        }
        Ok(count)
    }

    /// Drain every post still pending, writing each with `fallback_parent`.
    /// Called exactly once, after all workers have finished, so that no
    /// record is lost when its topic never turned up. Returns the number of
    /// posts flushed.
    pub fn flush_all_remaining<F>(&self, fallback_parent: u32, mut write: F) -> usize
    where
        F: FnMut(Post, u32),
    {
        let pages = {
            let mut state = self.lock();
            state.by_key.clear();
            std::mem::take(&mut state.pages)
        };
        let mut count = 0;
        for (page, posts) in pages {
            debug!(page, count = posts.len(), "flushing orphaned posts");
            for post in posts {
                write(post, fallback_parent);
                count += 1;
            }
        }
        count
    }

    /// Number of posts currently awaiting resolution.
    pub fn pending_posts(&self) -> usize {
        self.lock().pages.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParentRef, UNKNOWN_TOPIC_ID};
    use std::sync::Arc;

    fn post(id: u32, key: u32) -> Post {
        Post {
            id,
            poster: "someone".into(),
            poster_id: 3,
            message: "hello".into(),
            hide_smilies: true,
            posted: 1_000_000,
            edited: None,
            edited_by: None,
            topic: ParentRef::LastPost(key),
        }
    }

    #[test]
    fn post_filed_before_topic_resolves_with_correct_parent() {
        let table = ResolutionTable::new();
        let mut written = Vec::new();

        let wrote = table.file_if_unresolved(post(42, 42), 42, |p, t| written.push((p.id, t)));
        assert!(!wrote);
        assert!(written.is_empty());
        assert_eq!(table.pending_posts(), 1);

        let drained = table
            .resolve_and_flush(42, 7, |p, t| written.push((p.id, t)))
            .unwrap();
        assert_eq!(drained, 1);
        assert_eq!(written, vec![(42, 7)]);
        assert_eq!(table.pending_posts(), 0);
    }

    #[test]
    fn post_arriving_after_topic_writes_immediately() {
        let table = ResolutionTable::new();
        table.resolve_and_flush(42, 7, |_, _| unreachable!()).unwrap();

        let mut written = Vec::new();
        let wrote = table.file_if_unresolved(post(42, 42), 42, |p, t| written.push((p.id, t)));
        assert!(wrote);
        assert_eq!(written, vec![(42, 7)]);
        assert_eq!(table.pending_posts(), 0);
    }

    #[test]
    fn whole_page_drains_under_one_key() {
        let table = ResolutionTable::new();
        let mut written = Vec::new();
        // Three posts from one page, filed under every post id
        let filed = table.file_page_if_unresolved(
            vec![post(40, 42), post(41, 42), post(42, 42)],
            &[40, 41, 42],
            |_, _| unreachable!(),
        );
        assert!(!filed);
        let drained = table
            .resolve_and_flush(42, 7, |p, t| written.push((p.id, t)))
            .unwrap();
        assert_eq!(drained, 3);
        assert_eq!(written, vec![(40, 7), (41, 7), (42, 7)]);
    }

    #[test]
    fn mid_page_key_resolves_the_whole_page() {
        // The listing was captured before the page's final reply, so the
        // topic's last-post id points at a post in the middle of the page.
        let table = ResolutionTable::new();
        table.file_page_if_unresolved(
            vec![post(40, 42), post(41, 42), post(42, 42)],
            &[40, 41, 42],
            |_, _| unreachable!(),
        );

        let mut written = Vec::new();
        let drained = table
            .resolve_and_flush(41, 7, |p, t| written.push((p.id, t)))
            .unwrap();
        assert_eq!(drained, 3);
        assert_eq!(written, vec![(40, 7), (41, 7), (42, 7)]);
        assert_eq!(table.pending_posts(), 0);

        // The drained page's other keys are inert; nothing double-writes
        assert_eq!(table.resolve_and_flush(42, 9, |_, _| unreachable!()), Ok(0));
    }

    #[test]
    fn page_with_known_key_writes_immediately() {
        let table = ResolutionTable::new();
        table.resolve_and_flush(41, 7, |_, _| unreachable!()).unwrap();

        let mut written = Vec::new();
        let wrote = table.file_page_if_unresolved(
            vec![post(40, 42), post(41, 42), post(42, 42)],
            &[40, 41, 42],
            |p, t| written.push((p.id, t)),
        );
        assert!(wrote);
        assert_eq!(written, vec![(40, 7), (41, 7), (42, 7)]);
        assert_eq!(table.pending_posts(), 0);
    }

    #[test]
    fn same_mapping_twice_is_idempotent() {
        let table = ResolutionTable::new();
        table.resolve_and_flush(42, 7, |_, _| ()).unwrap();
        assert_eq!(table.resolve_and_flush(42, 7, |_, _| ()), Ok(0));
        assert_eq!(table.try_resolve(42), Some(7));
    }

    #[test]
    fn conflicting_mapping_is_refused() {
        let table = ResolutionTable::new();
        table.resolve_and_flush(42, 7, |_, _| ()).unwrap();
        table.file_if_unresolved(post(42, 42), 99, |_, _| unreachable!());

        let err = table
            .resolve_and_flush(42, 8, |_, _| unreachable!())
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::DerivedKeyCollision {
                key: 42,
                existing: 7,
                conflicting: 8
            }
        );
        // Earlier mapping survives; pending posts under other keys untouched
        assert_eq!(table.try_resolve(42), Some(7));
        assert_eq!(table.pending_posts(), 1);
    }

    #[test]
    fn final_flush_uses_sentinel_and_empties_table() {
        let table = ResolutionTable::new();
        table.file_if_unresolved(post(10, 10), 10, |_, _| unreachable!());
        table.file_if_unresolved(post(20, 20), 20, |_, _| unreachable!());

        let mut written = Vec::new();
        let flushed = table.flush_all_remaining(UNKNOWN_TOPIC_ID, |p, t| written.push((p.id, t)));
        assert_eq!(flushed, 2);
        assert_eq!(written, vec![(10, UNKNOWN_TOPIC_ID), (20, UNKNOWN_TOPIC_ID)]);
        assert_eq!(table.pending_posts(), 0);

        // Second flush finds nothing
        assert_eq!(table.flush_all_remaining(UNKNOWN_TOPIC_ID, |_, _| ()), 0);
    }

    #[test]
    fn concurrent_file_and_resolve_never_strands_a_post() {
        // Hammer the two operations from two threads; every post must be
        // written exactly once with parent 7, via either path.
        for _ in 0..50 {
            let table = Arc::new(ResolutionTable::new());
            let written = Arc::new(Mutex::new(Vec::new()));

            let t1 = {
                let table = Arc::clone(&table);
                let written = Arc::clone(&written);
                std::thread::spawn(move || {
                    table.file_if_unresolved(post(42, 42), 42, |p, t| {
                        written.lock().unwrap().push((p.id, t));
                    });
                })
            };
            let t2 = {
                let table = Arc::clone(&table);
                let written = Arc::clone(&written);
                std::thread::spawn(move || {
                    table
                        .resolve_and_flush(42, 7, |p, t| {
                            written.lock().unwrap().push((p.id, t));
                        })
                        .unwrap();
                })
            };
            t1.join().unwrap();
            t2.join().unwrap();

            let written = written.lock().unwrap();
            assert_eq!(written.as_slice(), &[(42, 7)]);
            assert_eq!(table.pending_posts(), 0);
        }
    }
}
