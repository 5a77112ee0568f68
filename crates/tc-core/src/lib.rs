//! trashcan/crates/tc-core/src/lib.rs
//!
//! The central domain types and interface definitions for the archive.

pub mod error;
pub mod models;
pub mod normalize;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use normalize::ImageNormalizer;
pub use traits::*;
