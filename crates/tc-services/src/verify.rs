//! Verification step: one deferred re-check of an archived post.

use std::sync::Arc;
use tc_core::models::Verdict;
use tc_core::traits::{ArchiveStore, PageProber};

/// Re-requests post pages and flags the ones the source has removed.
pub struct Verifier {
    prober: Arc<dyn PageProber>,
    store: Arc<dyn ArchiveStore>,
}

impl Verifier {
    pub fn new(prober: Arc<dyn PageProber>, store: Arc<dyn ArchiveStore>) -> Self {
        Self { prober, store }
    }

    /// Probes the page once and marks the post deleted on 403/404.
    ///
    /// A transport failure is `Unknown` and leaves the row alone: a missed
    /// deletion is preferable to a false one. Never retried.
    pub async fn verify(&self, board_id: &str, id: i64) -> Verdict {
        let verdict = match self.prober.probe(board_id, id).await {
            Ok(status) => {
                log::debug!("post {} answered {}", id, status);
                Verdict::from_status(status)
            }
            Err(e) => {
                log::warn!("deletion check of post {} failed: {:#}", id, e);
                Verdict::Unknown
            }
        };

        if verdict.is_deleted() {
            match self.store.mark_deleted(id).await {
                Ok(()) => log::info!("post {} was deleted at the source", id),
                Err(e) => log::error!("flagging post {} as deleted failed: {}", id, e),
            }
        } else {
            log::debug!("post {} still present ({:?})", id, verdict);
        }

        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mockall::predicate::eq;
    use tc_core::error::AppError;
    use tc_core::models::Post;
    use tc_core::traits::{MockArchiveStore, MockPageProber};
    use tc_db_sqlite::SqliteArchiveStore;

    fn prober_answering(status: u16) -> MockPageProber {
        let mut prober = MockPageProber::new();
        prober.expect_probe().returning(move |_, _| Ok(status));
        prober
    }

    async fn store_with(id: i64) -> Arc<SqliteArchiveStore> {
        let store = SqliteArchiveStore::in_memory().await.unwrap();
        store
            .upsert(&Post {
                id,
                title: "t".to_string(),
                author: "a".to_string(),
                author_id: None,
                time: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                contents: String::new(),
                images: vec![],
                is_deleted: false,
                is_blinded: false,
            })
            .await
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn not_found_marks_the_post_deleted() {
        let store = store_with(101).await;
        let verifier = Verifier::new(Arc::new(prober_answering(404)), store.clone());

        assert_eq!(verifier.verify("b", 101).await, Verdict::Deleted);
        assert!(store.get_by_id(101).await.unwrap().unwrap().is_deleted);
    }

    #[tokio::test]
    async fn forbidden_marks_the_post_deleted() {
        let store = store_with(7).await;
        let verifier = Verifier::new(Arc::new(prober_answering(403)), store.clone());

        verifier.verify("b", 7).await;
        assert!(store.get_by_id(7).await.unwrap().unwrap().is_deleted);
    }

    #[tokio::test]
    async fn ok_status_leaves_the_post_alone() {
        let store = store_with(102).await;
        let verifier = Verifier::new(Arc::new(prober_answering(200)), store.clone());

        assert_eq!(verifier.verify("b", 102).await, Verdict::Present);
        assert!(!store.get_by_id(102).await.unwrap().unwrap().is_deleted);
    }

    #[tokio::test]
    async fn transport_failure_leaves_the_post_alone() {
        let mut prober = MockPageProber::new();
        prober
            .expect_probe()
            .with(eq("b"), eq(3))
            .returning(|_, _| Err(anyhow::anyhow!("dns error")));
        let mut store = MockArchiveStore::new();
        store.expect_mark_deleted().never();

        let verifier = Verifier::new(Arc::new(prober), Arc::new(store));
        assert_eq!(verifier.verify("b", 3).await, Verdict::Unknown);
    }

    #[tokio::test]
    async fn storage_failure_while_flagging_is_contained() {
        let mut store = MockArchiveStore::new();
        store
            .expect_mark_deleted()
            .times(1)
            .returning(|_| Err(AppError::Internal("busy".to_string())));

        let verifier = Verifier::new(Arc::new(prober_answering(404)), Arc::new(store));
        assert_eq!(verifier.verify("b", 3).await, Verdict::Deleted);
    }
}
