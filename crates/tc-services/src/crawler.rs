//! The crawl loop.
//!
//! One logical worker: discover → crawl each id in ascending order →
//! schedule a deletion check for every newly archived post → sleep →
//! repeat, until told to stop.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tc_core::error::{AppError, Result};
use tc_core::normalize::ImageNormalizer;
use tc_core::traits::{ArchiveStore, PageProber, SourceClient};
use tokio::sync::watch;

use crate::crawl::{crawl_post, CrawlOutcome};
use crate::discovery::discover;
use crate::scheduler::VerificationScheduler;
use crate::verify::Verifier;

pub const DEFAULT_RECENT_COUNT: usize = 10;
pub const DEFAULT_CYCLE_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_VERIFY_DELAY: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlerSettings {
    pub board_id: String,
    pub recent_count: usize,
    pub cycle_delay: Duration,
    pub verify_delay: Duration,
}

impl CrawlerSettings {
    /// Fails when the board id is missing or blank; the crawler cannot start
    /// without one.
    pub fn new(board_id: Option<&str>) -> Result<Self> {
        let board_id = board_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::Configuration("GALLERY_ID is not set".to_string()))?;

        Ok(Self {
            board_id: board_id.to_string(),
            recent_count: DEFAULT_RECENT_COUNT,
            cycle_delay: DEFAULT_CYCLE_DELAY,
            verify_delay: DEFAULT_VERIFY_DELAY,
        })
    }

    pub fn with_recent_count(mut self, count: usize) -> Self {
        self.recent_count = count;
        self
    }

    pub fn with_cycle_delay(mut self, delay: Duration) -> Self {
        self.cycle_delay = delay;
        self
    }

    pub fn with_verify_delay(mut self, delay: Duration) -> Self {
        self.verify_delay = delay;
        self
    }
}

/// Per-cycle tallies, logged after every cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub discovered: usize,
    pub archived: usize,
    pub already_archived: usize,
    pub missing: usize,
    pub failed: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: CrawlOutcome) {
        match outcome {
            CrawlOutcome::Archived => self.archived += 1,
            CrawlOutcome::AlreadyArchived => self.already_archived += 1,
            CrawlOutcome::Missing => self.missing += 1,
            CrawlOutcome::Failed => self.failed += 1,
        }
    }
}

pub struct Crawler {
    settings: CrawlerSettings,
    source: Arc<dyn SourceClient>,
    store: Arc<dyn ArchiveStore>,
    normalizer: ImageNormalizer,
    scheduler: VerificationScheduler,
}

impl Crawler {
    pub fn new(
        settings: CrawlerSettings,
        source: Arc<dyn SourceClient>,
        store: Arc<dyn ArchiveStore>,
        prober: Arc<dyn PageProber>,
        normalizer: ImageNormalizer,
    ) -> Self {
        let verifier = Arc::new(Verifier::new(prober, Arc::clone(&store)));
        let scheduler = VerificationScheduler::new(verifier, settings.verify_delay);
        Self {
            settings,
            source,
            store,
            normalizer,
            scheduler,
        }
    }

    pub fn settings(&self) -> &CrawlerSettings {
        &self.settings
    }

    pub fn scheduler(&self) -> &VerificationScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut VerificationScheduler {
        &mut self.scheduler
    }

    /// One pass: discovery, then every id in ascending order. Ids are crawled
    /// sequentially; their deletion checks are only scheduled, not awaited.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.scheduler.reap();

        let board_id = self.settings.board_id.as_str();
        let ids = discover(self.source.as_ref(), board_id, self.settings.recent_count).await;
        let mut report = CycleReport {
            discovered: ids.len(),
            ..CycleReport::default()
        };

        for id in ids {
            let outcome = crawl_post(
                self.source.as_ref(),
                self.store.as_ref(),
                &self.normalizer,
                board_id,
                id,
            )
            .await;
            report.record(outcome);

            if outcome.needs_verification() {
                self.scheduler.schedule(board_id, id);
            }
        }

        report
    }

    /// Cycles until `shutdown` turns true (or its sender is dropped), then
    /// shuts the verification pool down.
    ///
    /// A panic inside a cycle is logged and the next cycle runs as usual.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        log::info!(
            "crawling board {} every {:?}, deletion checks after {:?}",
            self.settings.board_id,
            self.settings.cycle_delay,
            self.settings.verify_delay
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
                Ok(report) => {
                    if report.archived > 0 || report.failed > 0 {
                        log::info!("cycle finished: {:?}", report);
                    } else {
                        log::debug!("cycle finished: {:?}", report);
                    }
                }
                Err(_) => log::error!("crawl cycle panicked; continuing with the next cycle"),
            }

            log::debug!("waiting {:?} before the next cycle", self.settings.cycle_delay);
            tokio::select! {
                _ = tokio::time::sleep(self.settings.cycle_delay) => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }

        log::info!(
            "crawler stopping with {} deletion checks outstanding",
            self.scheduler.pending()
        );
        self.scheduler.shutdown().await;
    }
}
