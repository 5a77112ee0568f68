//! # tc-services
//!
//! The crawl-archive-verify lifecycle, written against the `tc-core` ports.

pub mod crawl;
pub mod crawler;
pub mod discovery;
pub mod queries;
pub mod scheduler;
pub mod verify;

pub use crawl::{crawl_post, CrawlOutcome};
pub use crawler::{Crawler, CrawlerSettings, CycleReport};
pub use discovery::discover;
pub use queries::ArchiveQueries;
pub use scheduler::VerificationScheduler;
pub use verify::Verifier;
