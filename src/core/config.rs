//! Configuration handling
//!
//! TOML configuration with serde defaults on every section, so a partial
//! file (or none at all) still yields a fully usable [`Config`]. Lookup
//! order: an explicit `--config` path, `./config.toml`, then the per-user
//! config directory.

use crate::core::importer::RetryPolicy;
use crate::core::resolver::ResolverMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub dedupe: DedupeConfig,
    pub fetch: FetchConfig,
    pub import: ImportConfig,
    pub logging: LoggingConfig,
}

/// Where catalog and batch state live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Catalog state file
    pub catalog_file: PathBuf,
    /// Root for batch working directories
    pub batches_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            catalog_file: PathBuf::from("catalog.json"),
            batches_dir: PathBuf::from("batches"),
        }
    }
}

/// Similarity thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupeConfig {
    /// Hamming distance treated as "same image" during automatic imports
    pub strict_threshold: u32,
    /// Wider distance used for `similar` queries
    pub loose_threshold: u32,
    /// Cap on reported matches per query
    pub max_results: usize,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            strict_threshold: 1,
            loose_threshold: 10,
            max_results: 50,
        }
    }
}

/// Fetch retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_factor: f64,
    /// Abort the run after this many items fail in a row
    pub max_consecutive_failures: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            retry_factor: 2.0,
            max_consecutive_failures: 3,
        }
    }
}

impl FetchConfig {
    /// The pipeline-facing view of this section
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            base_delay_ms: self.retry_base_delay_ms,
            factor: self.retry_factor,
            max_consecutive_failures: self.max_consecutive_failures,
        }
    }
}

/// Import behavior defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Duplicate resolution mode when the CLI does not override it
    pub mode: ResolverMode,
}

/// Logging setup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// error | warn | info | debug | trace
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load from the default locations, falling back to built-in defaults
    ///
    /// Checks `./config.toml` first, then the platform config directory.
    pub fn load_default() -> Result<Self, ConfigError> {
        let local = PathBuf::from("config.toml");
        if local.exists() {
            return Self::load(&local);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user = config_dir.join("gallery-ingest").join("config.toml");
            if user.exists() {
                return Self::load(&user);
            }
        }

        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.dedupe.strict_threshold, 1);
        assert_eq!(config.dedupe.loose_threshold, 10);
        assert_eq!(config.dedupe.max_results, 50);
        assert_eq!(config.fetch.retry_attempts, 3);
        assert_eq!(config.import.mode, ResolverMode::Auto);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[dedupe]
loose_threshold = 6

[import]
mode = "interactive"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.dedupe.loose_threshold, 6);
        assert_eq!(config.dedupe.strict_threshold, 1); // untouched section field
        assert_eq!(config.import.mode, ResolverMode::Interactive);
        assert_eq!(config.storage.batches_dir, PathBuf::from("batches"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Config::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "not [ valid toml").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_retry_policy_mirrors_fetch_section() {
        let fetch = FetchConfig {
            retry_attempts: 5,
            retry_base_delay_ms: 250,
            retry_factor: 3.0,
            max_consecutive_failures: 10,
        };
        let policy = fetch.retry_policy();
        assert_eq!(policy.attempts, 5);
        assert_eq!(policy.backoff_ms(2), 750);
    }
}
