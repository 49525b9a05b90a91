//! Value types for the destination schema
//!
//! Each struct mirrors one row of the normalized output schema. Records are
//! immutable once extracted; the only late-bound field is a post's topic id,
//! carried as a [`ParentRef`] until resolution.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Topic id assigned to posts whose topic could never be resolved.
pub const UNKNOWN_TOPIC_ID: u32 = 0;

/// A category row. Categories are the only records without a source-assigned
/// id; the sink assigns one on first insert and caches it by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category name as shown on the index page
    pub name: String,
    /// Ordinal position on the index page
    pub position: u32,
}

/// A forum row, parsed from an index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forum {
    /// Forum id, or 0 for redirect forums (which have no id of their own)
    pub id: u32,
    pub name: String,
    pub description: Option<String>,
    /// Destination URL when this "forum" is only a link
    pub redirect_url: Option<String>,
    pub num_topics: u32,
    pub num_posts: u32,
    /// Unix timestamp of the most recent post, 0 when the forum is empty
    pub last_posted: i64,
    /// Id of the most recent post, 0 when the forum is empty
    pub last_post_id: u32,
    pub last_poster: Option<String>,
    /// Ordinal position within the category
    pub position: u32,
    /// Name of the containing category; the sink maps it to the
    /// sink-assigned category id
    pub category: String,
}

impl Forum {
    /// True when this row is a link to somewhere else rather than a forum.
    pub fn is_redirect(&self) -> bool {
        self.redirect_url.is_some()
    }
}

/// A topic row, parsed from a forum listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: u32,
    /// Username of the topic starter
    pub poster: String,
    pub subject: String,
    /// Unix timestamp of the first post; listing pages do not show it, so
    /// this is 0 unless a future source supplies it
    pub posted: i64,
    /// Unix timestamp of the most recent post
    pub last_posted: i64,
    /// Id of the most recent post; doubles as the derived key that resolves
    /// pending posts to this topic
    pub last_post_id: u32,
    pub last_poster: Option<String>,
    pub num_views: u32,
    pub num_replies: u32,
    pub closed: bool,
    pub sticky: bool,
    pub forum_id: u32,
}

/// Reference from a post to its containing topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParentRef {
    /// Topic id read directly off the page
    Topic(u32),
    /// The page carried no topic id; the key is the id of the last post on
    /// the page, which equals some topic's `last_post_id` if this page is
    /// the topic's final page
    LastPost(u32),
}

impl ParentRef {
    /// The derived key, if this reference is unresolved.
    pub fn derived_key(&self) -> Option<u32> {
        match self {
            ParentRef::Topic(_) => None,
            ParentRef::LastPost(key) => Some(*key),
        }
    }
}

/// A post row, parsed from a topic page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u32,
    /// Username of the poster as displayed
    pub poster: String,
    pub poster_id: u32,
    /// Message body, transcoded from HTML to BBCode
    pub message: String,
    /// Set when the message contains no smiley images
    pub hide_smilies: bool,
    /// Unix timestamp
    pub posted: i64,
    /// Unix timestamp of the last edit, if the post is marked edited
    pub edited: Option<i64>,
    pub edited_by: Option<String>,
    pub topic: ParentRef,
}

/// A user row, parsed from the poster block of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub username: String,
    pub title: Option<String>,
    /// Signature, transcoded from HTML to BBCode
    pub signature: Option<String>,
    pub has_avatar: bool,
}

/// One extracted record, destined for exactly one destination row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    Category(Category),
    Forum(Forum),
    Topic(Topic),
    Post(Post),
    User(User),
}

impl Record {
    /// Short table-ish name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Record::Category(_) => "category",
            Record::Forum(_) => "forum",
            Record::Topic(_) => "topic",
            Record::Post(_) => "post",
            Record::User(_) => "user",
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Category(c) => write!(f, "category '{}'", c.name),
            Record::Forum(fo) => write!(f, "forum {} '{}'", fo.id, fo.name),
            Record::Topic(t) => write!(f, "topic {}", t.id),
            Record::Post(p) => write!(f, "post {}", p.id),
            Record::User(u) => write!(f, "user {}", u.id),
        }
    }
}
