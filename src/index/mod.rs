//! Index building and reading
//!
//! This module ties the decoding, line-finding, and storage layers
//! together:
//!
//! - **checkpoint**: access-point emission policy and end-offset backfill
//! - **catalog**: registered key extractors and per-index key handling
//! - **builder**: the single-pass build over the compressed file
//! - **reader**: random-access line fetches and key lookups

pub mod builder;
pub mod catalog;
pub mod checkpoint;
pub mod reader;

pub use builder::{pretty_bytes, IndexBuilder};
pub use catalog::IndexCatalog;
pub use checkpoint::CheckpointManager;
pub use reader::IndexReader;
