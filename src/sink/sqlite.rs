//! SQLite sink
//!
//! One `rusqlite::Connection` behind a mutex: SQLite allows a single
//! in-flight statement per connection, so every write takes the lock for
//! the duration of one statement and nothing more.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection};
use tracing::{debug, info};

use super::schema::{provision_statements, Dialect};
use super::{RecordSink, SinkError};
use crate::model::{Category, Forum, ParentRef, Post, Record, Topic, User};

struct Inner {
    conn: Connection,
    /// Sink-assigned category ids by name, filled on first insert so forum
    /// rows can reference a category regardless of file processing order
    categories: HashMap<String, i64>,
    closed: bool,
}

/// Sink writing to a SQLite database file.
pub struct SqliteSink {
    inner: Mutex<Inner>,
    prefix: String,
}

impl SqliteSink {
    /// Open (creating if needed) the database named by `url`. Accepted
    /// forms: `sqlite:PATH`, `sqlite://PATH`, or a bare path. Other
    /// schemes are refused up front.
    pub fn open(url: &str, table_prefix: Option<&str>) -> Result<Self, SinkError> {
        let path = if let Some(rest) = url.strip_prefix("sqlite://") {
            rest
        } else if let Some(rest) = url.strip_prefix("sqlite:") {
            rest
        } else if url.contains("://") {
            return Err(SinkError::UnsupportedUrl(url.to_string()));
        } else {
            url
        };

        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(30))?;
        info!(path, "opened sqlite database");

        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                categories: HashMap::new(),
                closed: false,
            }),
            prefix: table_prefix.unwrap_or_default().to_string(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, SinkError> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.closed {
            return Err(SinkError::Closed);
        }
        Ok(inner)
    }

    /// Drop and recreate the destination tables, indexes, and seed rows.
    /// Skipped entirely in append mode.
    pub fn provision(&self) -> Result<(), SinkError> {
        let inner = self.lock()?;
        for statement in provision_statements(Dialect::Sqlite, &self.prefix) {
            inner.conn.execute_batch(&statement)?;
        }
        info!(prefix = %self.prefix, "provisioned destination schema");
        Ok(())
    }

    /// Number of rows in a destination table. Used by the summary output
    /// and by tests asserting idempotence.
    pub fn row_count(&self, table: &str) -> Result<u64, SinkError> {
        let inner = self.lock()?;
        let count: u64 = inner.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}{table}", self.prefix),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Insert-if-absent on the category name, returning the sink-assigned
    /// id either way. The id is cached so repeat lookups skip the database.
    /// Rows created here are placeholders; `insert_category` fills in the
    /// display position when the index record arrives.
    fn category_id(&self, inner: &mut Inner, name: &str) -> Result<i64, SinkError> {
        if let Some(&id) = inner.categories.get(name) {
            return Ok(id);
        }
        inner.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {}categories (cat_name, disp_position) VALUES (?1, 0)",
                self.prefix
            ),
            params![name],
        )?;
        let id: i64 = inner.conn.query_row(
            &format!("SELECT id FROM {}categories WHERE cat_name = ?1", self.prefix),
            params![name],
            |row| row.get(0),
        )?;
        inner.categories.insert(name.to_string(), id);
        debug!(name, id, "cached category id");
        Ok(id)
    }

    fn insert_category(&self, category: &Category) -> Result<(), SinkError> {
        let mut inner = self.lock()?;
        // A forum row arriving first creates the category with position 0;
        // the real index record carries the position, so upsert it
        inner.conn.execute(
            &format!(
                "INSERT INTO {}categories (cat_name, disp_position) VALUES (?1, ?2) \
                 ON CONFLICT(cat_name) DO UPDATE SET disp_position = excluded.disp_position",
                self.prefix
            ),
            params![category.name, category.position],
        )?;
        let id: i64 = inner.conn.query_row(
            &format!("SELECT id FROM {}categories WHERE cat_name = ?1", self.prefix),
            params![category.name],
            |row| row.get(0),
        )?;
        inner.categories.insert(category.name.clone(), id);
        Ok(())
    }

    fn insert_forum(&self, forum: &Forum) -> Result<(), SinkError> {
        let mut inner = self.lock()?;
        let cat_id = self.category_id(&mut inner, &forum.category)?;
        inner.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {}forums \
                 (id, forum_name, forum_desc, redirect_url, num_topics, num_posts, \
                  last_post, last_post_id, last_poster, disp_position, cat_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                self.prefix
            ),
            params![
                forum.id,
                forum.name,
                forum.description,
                forum.redirect_url,
                forum.num_topics,
                forum.num_posts,
                forum.last_posted,
                forum.last_post_id,
                forum.last_poster,
                forum.position,
                cat_id,
            ],
        )?;
        Ok(())
    }

    fn insert_topic(&self, topic: &Topic) -> Result<(), SinkError> {
        let inner = self.lock()?;
        inner.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {}topics \
                 (id, poster, subject, posted, last_post, last_post_id, last_poster, \
                  num_views, num_replies, closed, sticky, forum_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                self.prefix
            ),
            params![
                topic.id,
                topic.poster,
                topic.subject,
                topic.posted,
                topic.last_posted,
                topic.last_post_id,
                topic.last_poster,
                topic.num_views,
                topic.num_replies,
                topic.closed,
                topic.sticky,
                topic.forum_id,
            ],
        )?;
        Ok(())
    }

    fn insert_user(&self, user: &User) -> Result<(), SinkError> {
        let inner = self.lock()?;
        inner.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {}users (id, username, title, signature, use_avatar) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                self.prefix
            ),
            params![
                user.id,
                user.username,
                user.title,
                user.signature,
                user.has_avatar
            ],
        )?;
        Ok(())
    }
}

impl RecordSink for SqliteSink {
    fn insert(&self, record: &Record) -> Result<(), SinkError> {
        match record {
            Record::Category(c) => self.insert_category(c),
            Record::Forum(f) => self.insert_forum(f),
            Record::Topic(t) => self.insert_topic(t),
            Record::User(u) => self.insert_user(u),
            Record::Post(p) => match p.topic {
                ParentRef::Topic(topic_id) => self.insert_post(p, topic_id),
                ParentRef::LastPost(_) => Err(SinkError::UnresolvedParent(p.id)),
            },
        }
    }

    fn insert_post(&self, post: &Post, topic_id: u32) -> Result<(), SinkError> {
        let inner = self.lock()?;
        inner.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {}posts \
                 (id, poster, poster_id, message, hide_smilies, posted, edited, \
                  edited_by, topic_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                self.prefix
            ),
            params![
                post.id,
                post.poster,
                post.poster_id,
                post.message,
                post.hide_smilies,
                post.posted,
                post.edited,
                post.edited_by,
                topic_id,
            ],
        )?;
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if !inner.closed {
            inner.closed = true;
            inner.conn.flush_prepared_statement_cache();
            info!("closed sink");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UNKNOWN_TOPIC_ID;
    use tempfile::TempDir;

    fn scratch_sink(dir: &TempDir) -> SqliteSink {
        let path = dir.path().join("out.db");
        let sink = SqliteSink::open(&format!("sqlite:{}", path.display()), None).unwrap();
        sink.provision().unwrap();
        sink
    }

    fn topic(id: u32, last_post_id: u32) -> Topic {
        Topic {
            id,
            poster: "alice".into(),
            subject: "subject".into(),
            posted: 0,
            last_posted: 1_200_000_000,
            last_post_id,
            last_poster: Some("bob".into()),
            num_views: 5,
            num_replies: 1,
            closed: false,
            sticky: false,
            forum_id: 3,
        }
    }

    fn post(id: u32) -> Post {
        Post {
            id,
            poster: "bob".into(),
            poster_id: 2,
            message: "[b]hi[/b]".into(),
            hide_smilies: true,
            posted: 1_200_000_000,
            edited: None,
            edited_by: None,
            topic: ParentRef::Topic(7),
        }
    }

    #[test]
    fn insert_is_idempotent_per_primary_key() {
        let dir = TempDir::new().unwrap();
        let sink = scratch_sink(&dir);

        sink.insert(&Record::Topic(topic(7, 42))).unwrap();
        sink.insert(&Record::Topic(topic(7, 42))).unwrap();
        assert_eq!(sink.row_count("topics").unwrap(), 1);

        sink.insert_post(&post(42), 7).unwrap();
        sink.insert_post(&post(42), 7).unwrap();
        assert_eq!(sink.row_count("posts").unwrap(), 1);
    }

    fn forum(category: &str) -> Forum {
        Forum {
            id: 3,
            name: "General".into(),
            description: None,
            redirect_url: None,
            num_topics: 10,
            num_posts: 100,
            last_posted: 1_200_000_000,
            last_post_id: 42,
            last_poster: Some("bob".into()),
            position: 0,
            category: category.into(),
        }
    }

    #[test]
    fn forum_insert_uses_cached_category_id() {
        let dir = TempDir::new().unwrap();
        let sink = scratch_sink(&dir);

        // Forum arrives before its category record
        sink.insert(&Record::Forum(forum("Announcements"))).unwrap();
        sink.insert(&Record::Category(Category {
            name: "Announcements".into(),
            position: 0,
        }))
        .unwrap();

        assert_eq!(sink.row_count("categories").unwrap(), 1);
        let inner = sink.inner.lock().unwrap();
        let (cat_id, forum_cat): (i64, i64) = inner
            .conn
            .query_row(
                "SELECT c.id, f.cat_id FROM categories c, forums f WHERE f.id = 3",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(cat_id, forum_cat);
    }

    #[test]
    fn late_category_record_fills_in_the_position() {
        let dir = TempDir::new().unwrap();
        let sink = scratch_sink(&dir);

        // The forum creates a placeholder category row with position 0
        sink.insert(&Record::Forum(forum("Announcements"))).unwrap();
        sink.insert(&Record::Category(Category {
            name: "Announcements".into(),
            position: 4,
        }))
        .unwrap();

        assert_eq!(sink.row_count("categories").unwrap(), 1);
        let inner = sink.inner.lock().unwrap();
        let position: u32 = inner
            .conn
            .query_row(
                "SELECT disp_position FROM categories WHERE cat_name = 'Announcements'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(position, 4);
    }

    #[test]
    fn user_signature_is_stored() {
        let dir = TempDir::new().unwrap();
        let sink = scratch_sink(&dir);

        sink.insert(&Record::User(User {
            id: 2,
            username: "bob".into(),
            title: Some("Member".into()),
            signature: Some("[i]ciao[/i]".into()),
            has_avatar: false,
        }))
        .unwrap();

        let inner = sink.inner.lock().unwrap();
        let signature: Option<String> = inner
            .conn
            .query_row("SELECT signature FROM users WHERE id = 2", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(signature.as_deref(), Some("[i]ciao[/i]"));
    }

    #[test]
    fn unresolved_post_is_rejected() {
        let dir = TempDir::new().unwrap();
        let sink = scratch_sink(&dir);
        let mut orphan = post(9);
        orphan.topic = ParentRef::LastPost(9);
        assert!(matches!(
            sink.insert(&Record::Post(orphan.clone())),
            Err(SinkError::UnresolvedParent(9))
        ));
        // Explicit topic id still works, e.g. at the sentinel flush
        sink.insert_post(&orphan, UNKNOWN_TOPIC_ID).unwrap();
        assert_eq!(sink.row_count("posts").unwrap(), 1);
    }

    #[test]
    fn close_is_idempotent_and_fails_fast_afterwards() {
        let dir = TempDir::new().unwrap();
        let sink = scratch_sink(&dir);
        sink.close().unwrap();
        sink.close().unwrap();
        assert!(matches!(
            sink.insert(&Record::Topic(topic(7, 42))),
            Err(SinkError::Closed)
        ));
    }

    #[test]
    fn provision_seeds_guest_user() {
        let dir = TempDir::new().unwrap();
        let sink = scratch_sink(&dir);
        assert_eq!(sink.row_count("users").unwrap(), 1);
    }
}
