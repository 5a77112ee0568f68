//! # Domain Models
//!
//! These structs represent the entities of the archive.
//! Post ids are assigned by the source site, never generated locally.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Format used to persist publication times. Lexical order equals
/// chronological order.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// An archived forum submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub author: String,
    /// Gallog id of the author; `None` for IP posters and rows archived
    /// before the column existed.
    pub author_id: Option<String>,
    /// Source-local publication time.
    pub time: NaiveDateTime,
    pub contents: String,
    /// Normalized media URLs in order of appearance.
    pub images: Vec<String>,
    pub is_deleted: bool,
    /// Moderation-hidden state. Read only.
    pub is_blinded: bool,
}

/// Row of the deleted-posts listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub author_id: Option<String>,
    pub time: NaiveDateTime,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            author: post.author.clone(),
            author_id: post.author_id.clone(),
            time: post.time,
        }
    }
}

/// Archive health counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub total_posts: i64,
    pub deleted_posts: i64,
    /// Highest archived ids, descending.
    pub recent_ids: Vec<i64>,
}

/// A post as served by the source site, before image normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub author_id: Option<String>,
    pub time: NaiveDateTime,
    pub contents: String,
    /// Raw image URLs exactly as they appear in the document.
    pub images: Vec<String>,
}

/// Outcome of re-requesting a post's public page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The source answered 403 or 404.
    Deleted,
    /// Any other status.
    Present,
    /// Transport failure. Handled exactly like `Present`.
    Unknown,
}

impl Verdict {
    /// Classifies the HTTP status of a post page.
    pub fn from_status(status: u16) -> Self {
        match status {
            403 | 404 => Verdict::Deleted,
            _ => Verdict::Present,
        }
    }

    pub fn is_deleted(self) -> bool {
        self == Verdict::Deleted
    }
}
