//! Supervised pool of deferred deletion checks.
//!
//! Every archived post gets exactly one check, `delay` after it was stored.
//! Checks run concurrently with the crawl loop and with each other. They are
//! held in a [`JoinSet`] so panics surface in the log and shutdown can cancel
//! the ones still waiting. Pending checks are not persisted.

use std::sync::Arc;
use std::time::Duration;
use tc_core::models::Verdict;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};

use crate::verify::Verifier;

/// `None` when the check was cancelled before its delay elapsed.
type CheckResult = (i64, Option<Verdict>);

pub struct VerificationScheduler {
    verifier: Arc<Verifier>,
    delay: Duration,
    tasks: JoinSet<CheckResult>,
    shutdown: watch::Sender<bool>,
}

impl VerificationScheduler {
    pub fn new(verifier: Arc<Verifier>, delay: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            verifier,
            delay,
            tasks: JoinSet::new(),
            shutdown,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Checks scheduled and not yet reaped.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Starts the deferred check of `id`. Returns immediately.
    pub fn schedule(&mut self, board_id: &str, id: i64) {
        let verifier = Arc::clone(&self.verifier);
        let board_id = board_id.to_string();
        let due = tokio::time::Instant::now() + self.delay;
        let mut shutdown = self.shutdown.subscribe();

        self.tasks.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(due) => {}
                _ = shutdown.wait_for(|stop| *stop) => return (id, None),
            }
            (id, Some(verifier.verify(&board_id, id).await))
        });
        log::debug!("deletion check of post {} scheduled in {:?}", id, self.delay);
    }

    /// Collects finished checks without waiting. Returns how many were
    /// collected.
    pub fn reap(&mut self) -> usize {
        let mut reaped = 0;
        while let Some(result) = self.tasks.try_join_next() {
            log_finished(result);
            reaped += 1;
        }
        reaped
    }

    /// Waits until every scheduled check has run, returning the verdicts in
    /// completion order.
    pub async fn drain(&mut self) -> Vec<(i64, Verdict)> {
        let mut verdicts = Vec::with_capacity(self.tasks.len());
        while let Some(result) = self.tasks.join_next().await {
            if let Ok((id, Some(verdict))) = result {
                verdicts.push((id, verdict));
            } else {
                log_finished(result);
            }
        }
        verdicts
    }

    /// Cancels checks still waiting out their delay and waits for the ones
    /// already probing.
    pub async fn shutdown(mut self) {
        self.shutdown.send_replace(true);
        let mut cancelled = 0;
        while let Some(result) = self.tasks.join_next().await {
            if matches!(result, Ok((_, None))) {
                cancelled += 1;
            } else {
                log_finished(result);
            }
        }
        if cancelled > 0 {
            log::info!("dropped {} pending deletion checks", cancelled);
        }
    }
}

fn log_finished(result: Result<CheckResult, JoinError>) {
    match result {
        Ok((id, Some(verdict))) => log::debug!("deletion check of post {} finished: {:?}", id, verdict),
        Ok((id, None)) => log::debug!("deletion check of post {} cancelled", id),
        Err(e) if e.is_panic() => log::error!("deletion check panicked: {}", e),
        Err(e) => log::debug!("deletion check aborted: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tc_core::traits::{MockArchiveStore, MockPageProber};

    fn scheduler(probes: Arc<AtomicUsize>, status: u16, delay: Duration) -> VerificationScheduler {
        let mut prober = MockPageProber::new();
        prober.expect_probe().returning(move |_, _| {
            probes.fetch_add(1, Ordering::SeqCst);
            Ok(status)
        });
        let mut store = MockArchiveStore::new();
        store.expect_mark_deleted().returning(|_| Ok(()));

        let verifier = Arc::new(Verifier::new(Arc::new(prober), Arc::new(store)));
        VerificationScheduler::new(verifier, delay)
    }

    #[tokio::test(start_paused = true)]
    async fn checks_wait_for_the_delay() {
        let probes = Arc::new(AtomicUsize::new(0));
        let mut scheduler = scheduler(probes.clone(), 200, Duration::from_secs(1800));

        scheduler.schedule("b", 1);
        scheduler.schedule("b", 2);
        assert_eq!(scheduler.pending(), 2);

        tokio::time::advance(Duration::from_secs(1799)).await;
        tokio::task::yield_now().await;
        assert_eq!(probes.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.reap(), 0);

        let mut verdicts = scheduler.drain().await;
        verdicts.sort_by_key(|(id, _)| *id);
        assert_eq!(verdicts, vec![(1, Verdict::Present), (2, Verdict::Present)]);
        assert_eq!(probes.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reap_collects_finished_checks() {
        let probes = Arc::new(AtomicUsize::new(0));
        let mut scheduler = scheduler(probes.clone(), 404, Duration::from_secs(10));

        scheduler.schedule("b", 1);
        tokio::time::sleep(Duration::from_secs(11)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(scheduler.reap(), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_waiting_checks() {
        let probes = Arc::new(AtomicUsize::new(0));
        let mut scheduler = scheduler(probes.clone(), 404, Duration::from_secs(1800));

        scheduler.schedule("b", 1);
        scheduler.schedule("b", 2);
        scheduler.shutdown().await;

        assert_eq!(probes.load(Ordering::SeqCst), 0);
    }
}
