//! Gallery Ingest
//!
//! Perceptual-hash similarity search and duplicate-aware batch import for a
//! curated artwork catalog. The library fingerprints incoming images,
//! matches them against everything already cataloged, and drives a
//! resumable import pipeline whose per-batch archive guarantees that
//! interrupted runs pick up exactly where they stopped.
//!
//! # Modules
//!
//! - `catalog` - catalog contract, metadata types, file-backed store
//! - `cli` - argument parsing and command handlers
//! - `core` - pipeline, batches, duplicate resolution, config, errors
//! - `phash` - fingerprint computation, codec, similarity index
//! - `source` - item sources (drop folders)

pub mod catalog;
pub mod cli;
pub mod core;
pub mod phash;
pub mod source;

#[cfg(test)]
pub mod test_images;

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const APP_NAME: &str = "gallery-ingest";
