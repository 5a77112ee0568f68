//! Discovery of recent post ids.

use tc_core::traits::SourceClient;

/// Asks the source for the `count` most recent ids on `board_id`.
///
/// The result is ascending so older unseen posts are archived first. A
/// failing source yields an empty batch; the next cycle simply tries again.
pub async fn discover(source: &dyn SourceClient, board_id: &str, count: usize) -> Vec<i64> {
    match source.list_recent(board_id, count).await {
        Ok(mut ids) => {
            ids.sort_unstable();
            ids.dedup();
            log::debug!("discovered {} ids on {}: {:?}", ids.len(), board_id, ids);
            ids
        }
        Err(e) => {
            log::warn!("discovery on {} failed: {:#}", board_id, e);
            Vec::new()
        }
    }
}
