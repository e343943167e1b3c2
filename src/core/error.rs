//! Error types for the gallery ingestion engine
//!
//! This module defines the error types used throughout the crate. Per-item
//! problems (undecodable images, transient fetch failures) are handled inside
//! the pipeline loop and never surface here; the variants below are the ones
//! callers actually see.

use crate::core::importer::{AbortReason, RunSummary};
use thiserror::Error;

/// Main error type for the gallery ingestion engine
#[derive(Error, Debug)]
pub enum IngestError {
    /// Image bytes are a recognized format the decoder cannot handle
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Image bytes could not be decoded as a raster image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Stored fingerprint text does not match the expected length/alphabet
    #[error("Malformed fingerprint '{text}': {reason}")]
    MalformedFingerprint { text: String, reason: String },

    /// An explicitly named batch does not exist
    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    /// Another run currently holds the lock for this batch
    #[error("Batch '{0}' is locked by another run")]
    BatchLocked(String),

    /// Retrieving the bytes for a remote item failed
    #[error("Fetch failed for '{remote_id}': {message}")]
    Fetch { remote_id: String, message: String },

    /// The run stopped early; all commits made before the abort point stand
    #[error("Pipeline aborted ({reason}): {} committed, {} fetched", summary.committed, summary.fetched)]
    PipelineAborted {
        reason: AbortReason,
        summary: RunSummary,
    },

    /// Catalog collaborator rejected an operation
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// State file could not be serialized or deserialized
    #[error("State file error: {0}")]
    State(#[from] serde_json::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, IngestError>;
