//! Core ingestion functionality
//!
//! # Submodules
//!
//! - `batch` - batch directories, fetch archive, resumable state
//! - `config` - TOML configuration with full defaults
//! - `error` - crate-wide error type and result alias
//! - `importer` - the batch import pipeline
//! - `resolver` - duplicate resolution policy (auto / interactive)

pub mod batch;
pub mod config;
pub mod error;
pub mod importer;
pub mod resolver;
