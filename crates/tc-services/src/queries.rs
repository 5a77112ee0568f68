//! Read side of the archive, as served to the HTTP layer.

use std::sync::Arc;
use tc_core::error::{AppError, Result};
use tc_core::models::{Diagnostics, Post, PostSummary};
use tc_core::traits::ArchiveStore;

pub const DELETED_PAGE_SIZE: u32 = 20;
pub const DIAGNOSTIC_RECENT_IDS: u32 = 10;

#[derive(Clone)]
pub struct ArchiveQueries {
    store: Arc<dyn ArchiveStore>,
}

impl ArchiveQueries {
    pub fn new(store: Arc<dyn ArchiveStore>) -> Self {
        Self { store }
    }

    /// Deleted posts, newest first, twenty per 1-based page.
    pub async fn deleted_posts(&self, page: u32) -> Result<Vec<PostSummary>> {
        self.store.page_deleted(page, DELETED_PAGE_SIZE).await
    }

    pub async fn get_post(&self, id: i64) -> Result<Post> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::post_not_found(id))
    }

    pub async fn diagnostics(&self) -> Result<Diagnostics> {
        Ok(Diagnostics {
            total_posts: self.store.count_total().await?,
            deleted_posts: self.store.count_deleted().await?,
            recent_ids: self.store.recent_ids(DIAGNOSTIC_RECENT_IDS).await?,
        })
    }
}
