//! Destination schema generation
//!
//! DDL differs across SQL dialects only in a handful of capabilities:
//! auto-increment syntax, the boolean/integer column types, and how an
//! insert is told to ignore an existing primary key. [`Dialect`] captures
//! those; everything else is shared templates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported SQL dialects. Only SQLite is executable through the bundled
/// driver; the others exist so provisioning SQL can be generated for
/// external application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Mysql,
    Postgres,
}

impl Dialect {
    /// Column definition for a sink-assigned auto-incrementing primary key.
    pub fn auto_increment_pk(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
            Dialect::Mysql => "INT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY",
            Dialect::Postgres => "SERIAL PRIMARY KEY",
        }
    }

    /// Column type for source-assigned integer primary keys.
    pub fn integer(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "INTEGER",
            Dialect::Mysql => "INT UNSIGNED",
            Dialect::Postgres => "INT",
        }
    }

    /// Column type for booleans.
    pub fn boolean(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "INTEGER",
            Dialect::Mysql => "TINYINT(1)",
            Dialect::Postgres => "SMALLINT",
        }
    }

    /// Leading keyword sequence for an insert that ignores duplicates.
    pub fn insert_ignore_prefix(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "INSERT OR IGNORE INTO",
            Dialect::Mysql => "INSERT IGNORE INTO",
            Dialect::Postgres => "INSERT INTO",
        }
    }

    /// Trailing clause for an insert that ignores duplicates.
    pub fn insert_ignore_suffix(&self) -> &'static str {
        match self {
            Dialect::Sqlite | Dialect::Mysql => "",
            Dialect::Postgres => " ON CONFLICT DO NOTHING",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Mysql => "mysql",
            Dialect::Postgres => "postgres",
        })
    }
}

/// Generate the statements that (re)provision the destination schema:
/// drop + create for the five record tables, their secondary indexes, and
/// seed rows. Statement order matters; execute in sequence.
pub fn provision_statements(dialect: Dialect, prefix: &str) -> Vec<String> {
    let int = dialect.integer();
    let boolean = dialect.boolean();
    let mut statements = Vec::new();

    for table in ["categories", "forums", "topics", "posts", "users"] {
        statements.push(format!("DROP TABLE IF EXISTS {prefix}{table};"));
    }

    statements.push(format!(
        "CREATE TABLE {prefix}categories (\
         id {}, \
         cat_name VARCHAR(80) NOT NULL UNIQUE, \
         disp_position {int} NOT NULL DEFAULT 0\
         );",
        dialect.auto_increment_pk()
    ));

    statements.push(format!(
        "CREATE TABLE {prefix}forums (\
         id {int} NOT NULL, \
         forum_name VARCHAR(80) NOT NULL DEFAULT 'New forum', \
         forum_desc TEXT, \
         redirect_url VARCHAR(100), \
         num_topics {int} NOT NULL DEFAULT 0, \
         num_posts {int} NOT NULL DEFAULT 0, \
         last_post {int}, \
         last_post_id {int}, \
         last_poster VARCHAR(200), \
         disp_position {int} NOT NULL DEFAULT 0, \
         cat_id {int} NOT NULL DEFAULT 0, \
         PRIMARY KEY (id)\
         );"
    ));

    statements.push(format!(
        "CREATE TABLE {prefix}topics (\
         id {int} NOT NULL, \
         poster VARCHAR(200) NOT NULL DEFAULT '', \
         subject VARCHAR(255) NOT NULL DEFAULT '', \
         posted {int} NOT NULL DEFAULT 0, \
         last_post {int} NOT NULL DEFAULT 0, \
         last_post_id {int} NOT NULL DEFAULT 0, \
         last_poster VARCHAR(200), \
         num_views {int} NOT NULL DEFAULT 0, \
         num_replies {int} NOT NULL DEFAULT 0, \
         closed {boolean} NOT NULL DEFAULT 0, \
         sticky {boolean} NOT NULL DEFAULT 0, \
         forum_id {int} NOT NULL DEFAULT 0, \
         PRIMARY KEY (id)\
         );"
    ));

    statements.push(format!(
        "CREATE TABLE {prefix}posts (\
         id {int} NOT NULL, \
         poster VARCHAR(200) NOT NULL DEFAULT '', \
         poster_id {int} NOT NULL DEFAULT 1, \
         message TEXT, \
         hide_smilies {boolean} NOT NULL DEFAULT 0, \
         posted {int} NOT NULL DEFAULT 0, \
         edited {int}, \
         edited_by VARCHAR(200), \
         topic_id {int} NOT NULL DEFAULT 0, \
         PRIMARY KEY (id)\
         );"
    ));

    statements.push(format!(
        "CREATE TABLE {prefix}users (\
         id {int} NOT NULL, \
         username VARCHAR(200) NOT NULL DEFAULT '', \
         title VARCHAR(50), \
         signature TEXT, \
         use_avatar {boolean} NOT NULL DEFAULT 0, \
         PRIMARY KEY (id)\
         );"
    ));

    statements.push(format!(
        "CREATE INDEX {prefix}posts_topic_id_idx ON {prefix}posts(topic_id);"
    ));
    statements.push(format!(
        "CREATE INDEX {prefix}topics_forum_id_idx ON {prefix}topics(forum_id);"
    ));
    statements.push(format!(
        "CREATE INDEX {prefix}users_username_idx ON {prefix}users(username);"
    ));

    // Guest user, present in every fresh schema
    statements.push(format!(
        "{} {prefix}users (id, username, title, use_avatar) \
         VALUES (1, 'Guest', NULL, 0){};",
        dialect.insert_ignore_prefix(),
        dialect.insert_ignore_suffix()
    ));

    statements
}
