//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Post, PostSummary, SourceDocument};

/// Persistence contract for archived posts.
///
/// Implementations are shared between the crawl loop and every in-flight
/// verification, so all methods must be safe under concurrent calls.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// True iff a row with this id exists, deleted or not.
    async fn exists(&self, id: i64) -> Result<bool>;

    /// Inserts the post, or replaces the content of an existing row with the
    /// same id. Never touches the deleted/blinded flags of an existing row.
    async fn upsert(&self, post: &Post) -> Result<()>;

    /// Flags the row as deleted. Absent rows are not an error.
    async fn mark_deleted(&self, id: i64) -> Result<()>;

    async fn count_total(&self) -> Result<i64>;
    async fn count_deleted(&self) -> Result<i64>;

    /// Highest ids first.
    async fn recent_ids(&self, limit: u32) -> Result<Vec<i64>>;

    /// Deleted posts, newest `time` first. `page` is 1-based; pages past the
    /// end (and page 0) are empty.
    async fn page_deleted(&self, page: u32, page_size: u32) -> Result<Vec<PostSummary>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;
}

/// Read access to the forum being archived.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Ids of the `count` most recent posts on the board, in listing order.
    async fn list_recent(&self, board_id: &str, count: usize) -> anyhow::Result<Vec<i64>>;

    /// The full document, or `None` when the source no longer serves it.
    async fn fetch_document(&self, board_id: &str, id: i64)
        -> anyhow::Result<Option<SourceDocument>>;
}

/// Status-only probe of a post's public page.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PageProber: Send + Sync {
    /// HTTP status of the post page. `Err` means the request never produced
    /// a response.
    async fn probe(&self, board_id: &str, id: i64) -> anyhow::Result<u16>;
}
