//! Crawl step: archive a single post the first time it is seen.

use tc_core::models::{Post, SourceDocument};
use tc_core::normalize::ImageNormalizer;
use tc_core::traits::{ArchiveStore, SourceClient};

/// What happened to one discovered id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// Stored now. The caller schedules its verification.
    Archived,
    /// Already in the store; nothing fetched.
    AlreadyArchived,
    /// The source no longer serves it. Nothing stored.
    Missing,
    /// Upstream or storage failure. Nothing stored.
    Failed,
}

impl CrawlOutcome {
    pub fn needs_verification(self) -> bool {
        self == CrawlOutcome::Archived
    }
}

/// Turns a fetched document into an archive row with canonical image URLs.
pub fn to_post(document: SourceDocument, normalizer: &ImageNormalizer) -> Post {
    let images = normalizer.normalize_all(&document.images);
    Post {
        id: document.id,
        title: document.title,
        author: document.author,
        author_id: document.author_id,
        time: document.time,
        contents: document.contents,
        images,
        is_deleted: false,
        is_blinded: false,
    }
}

/// Archives `id` unless it is already stored. Never returns an error: every
/// failure is logged and reported as [`CrawlOutcome::Failed`].
pub async fn crawl_post(
    source: &dyn SourceClient,
    store: &dyn ArchiveStore,
    normalizer: &ImageNormalizer,
    board_id: &str,
    id: i64,
) -> CrawlOutcome {
    match store.exists(id).await {
        Ok(true) => {
            log::debug!("post {} already archived, skipping", id);
            return CrawlOutcome::AlreadyArchived;
        }
        Ok(false) => {}
        Err(e) => {
            log::error!("could not check whether post {} is archived: {}", id, e);
            return CrawlOutcome::Failed;
        }
    }

    let document = match source.fetch_document(board_id, id).await {
        Ok(Some(document)) => document,
        Ok(None) => {
            log::info!("post {} vanished before it could be archived", id);
            return CrawlOutcome::Missing;
        }
        Err(e) => {
            log::warn!("fetching post {} failed: {:#}", id, e);
            return CrawlOutcome::Failed;
        }
    };

    let post = to_post(document, normalizer);
    match store.upsert(&post).await {
        Ok(()) => {
            log::info!("archived post {} ({} images)", id, post.images.len());
            CrawlOutcome::Archived
        }
        Err(e) => {
            log::error!("saving post {} failed: {}", id, e);
            CrawlOutcome::Failed
        }
    }
}
