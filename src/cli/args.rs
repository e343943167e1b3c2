//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Duplicate-aware batch importer for a curated artwork catalog
#[derive(Parser, Debug)]
#[command(name = "gallery-ingest")]
#[command(version = "0.3.0")]
#[command(
    about = "Import artwork batches with perceptual-hash duplicate detection",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import images from a drop folder into the catalog
    Import {
        /// Folder containing the downloaded images (and metadata sidecars)
        folder: PathBuf,

        /// Select batches under this locator (e.g. the account URL the
        /// folder was downloaded from) instead of the folder path
        #[arg(long)]
        locator: Option<String>,

        /// Reopen a specific batch by name instead of selecting automatically
        #[arg(short, long)]
        batch: Option<String>,

        /// Always start a fresh batch, even if an open one exists
        #[arg(long)]
        new: bool,

        /// Ask before importing or skipping near-duplicates
        #[arg(short, long)]
        interactive: bool,

        /// Similarity threshold in bits (overrides config)
        #[arg(short, long)]
        threshold: Option<u32>,

        /// Report what would happen without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// List known batches, newest first
    Batches {
        /// Only show batches for this locator
        #[arg(short, long)]
        locator: Option<String>,
    },

    /// Close a batch so it is no longer reused automatically
    Close {
        /// Batch name as shown by `batches`
        batch: String,
    },

    /// Find catalog entries visually similar to an entry or an image file
    Similar {
        /// Catalog entry id to search around
        #[arg(long, conflicts_with = "file")]
        id: Option<u64>,

        /// Image file to search around
        #[arg(long)]
        file: Option<PathBuf>,

        /// Similarity threshold in bits (overrides config)
        #[arg(short, long)]
        threshold: Option<u32>,
    },

    /// Rebuild the similarity index from the catalog
    Rebuild {
        /// Also compute fingerprints for entries that are missing one
        #[arg(long)]
        backfill: bool,
    },

    /// Show current configuration
    ShowConfig,
}
