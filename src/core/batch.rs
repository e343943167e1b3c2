//! Import batches and resumable fetch state
//!
//! A batch is one named working set for one source locator. Its state file
//! records the locator, lifecycle status, and the fetch archive: the
//! append-only set of remote item identifiers already retrieved for the
//! batch. An identifier present in the archive is never fetched again by a
//! later run against the same batch, which is what makes runs resumable.
//!
//! Batch directories live under a configured root, one subdirectory per
//! batch, each holding a hidden state file. A lock file per batch keeps two
//! concurrent runs from interleaving fetch-then-archive on the same batch.

use crate::core::error::{IngestError, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Batch state file name inside each batch directory
const STATE_FILE: &str = ".batch_state.json";

/// Lock file guarding a batch against concurrent runs
const LOCK_FILE: &str = ".batch.lock";

/// Current state file format version
const STATE_VERSION: u32 = 1;

/// Lifecycle status of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Accepting further runs
    Open,
    /// Finalized by the operator
    Closed,
}

/// Persistent state of one batch
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BatchState {
    version: u32,
    name: String,
    locator: String,
    created_at: DateTime<Utc>,
    status: BatchStatus,
    /// Remote identifiers already retrieved; grows monotonically
    archive: BTreeSet<String>,
}

/// Lightweight view of a batch for listings and selection
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub name: String,
    pub locator: String,
    pub created_at: DateTime<Utc>,
    pub status: BatchStatus,
    pub archived_items: usize,
}

/// How a run should obtain its batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchSelection {
    /// Reopen the named existing batch
    Reopen(String),
    /// Create a fresh batch for the locator
    CreateNew,
}

/// Decide which batch a run targets
///
/// Precedence: an explicitly requested name wins (and must exist); an
/// explicit "new batch" request forces creation; otherwise the most recent
/// open batch for the locator is reused, falling back to creation.
///
/// Pure with respect to the filesystem so the policy is testable on its own.
pub fn select_batch(
    existing: &[BatchSummary],
    locator: &str,
    requested_name: Option<&str>,
    force_new: bool,
) -> Result<BatchSelection> {
    if let Some(name) = requested_name {
        if existing.iter().any(|b| b.name == name) {
            return Ok(BatchSelection::Reopen(name.to_string()));
        }
        return Err(IngestError::BatchNotFound(name.to_string()));
    }

    if force_new {
        return Ok(BatchSelection::CreateNew);
    }

    let newest_open = existing
        .iter()
        .filter(|b| b.locator == locator && b.status == BatchStatus::Open)
        .max_by(|a, b| (a.created_at, &a.name).cmp(&(b.created_at, &b.name)));

    Ok(match newest_open {
        Some(batch) => BatchSelection::Reopen(batch.name.clone()),
        None => BatchSelection::CreateNew,
    })
}

/// Derive a readable slug from a source locator
///
/// Account pages become the account name, searches and hashtags get a
/// prefixed query slug, and local paths use their final component. Anything
/// unrecognized is sanitized wholesale.
pub fn slug_from_locator(locator: &str) -> String {
    if let Some(rest) = locator.split("://").nth(1) {
        let without_query = rest.split(['?', '#']).next().unwrap_or(rest);
        let segments: Vec<&str> = without_query
            .split('/')
            .skip(1) // host
            .filter(|s| !s.is_empty())
            .collect();

        if let Some(pos) = segments.iter().position(|s| *s == "hashtag") {
            if let Some(tag) = segments.get(pos + 1) {
                return format!("hashtag_{}", sanitize(tag));
            }
        }

        if segments.first().is_some_and(|s| *s == "search") {
            if let Some(query) = rest.split("q=").nth(1) {
                let query = query.split('&').next().unwrap_or("");
                let short: String = query.chars().take(20).collect();
                return format!("search_{}", sanitize(&short));
            }
            return "search".to_string();
        }

        // Account page: first path segment, as long as it is not a post link
        if !segments.contains(&"status") {
            if let Some(account) = segments.first() {
                return sanitize(account);
            }
        }

        return sanitize(without_query);
    }

    // Local folder locator: use the final path component
    let name = Path::new(locator)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| locator.to_string());
    sanitize(&name)
}

fn sanitize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "batch".to_string()
    } else {
        cleaned
    }
}

/// Exclusive hold on a batch for the duration of a run
///
/// Backed by a `create_new` lock file; released on drop. The lock is the
/// mutual-exclusion point for the fetch archive.
#[derive(Debug)]
struct BatchLock {
    path: PathBuf,
}

impl BatchLock {
    fn acquire(dir: &Path, batch_name: &str) -> Result<Self> {
        let path = dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(IngestError::BatchLocked(batch_name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for BatchLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to release batch lock {:?}: {}", self.path, e);
        }
    }
}

/// An opened batch: state plus the exclusive lock
#[derive(Debug)]
pub struct BatchHandle {
    dir: PathBuf,
    state: BatchState,
    _lock: BatchLock,
}

impl BatchHandle {
    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn locator(&self) -> &str {
        &self.state.locator
    }

    /// Collaborator-managed working directory of this batch
    pub fn working_dir(&self) -> &Path {
        &self.dir
    }

    pub fn archived_items(&self) -> usize {
        self.state.archive.len()
    }

    /// Whether a remote identifier was already retrieved for this batch
    pub fn contains(&self, remote_id: &str) -> bool {
        self.state.archive.contains(remote_id)
    }

    /// Record a retrieved remote identifier
    ///
    /// Idempotent: appending an identifier that is already archived is a
    /// no-op and does not rewrite the state file.
    pub fn append(&mut self, remote_id: &str) -> Result<()> {
        if self.state.archive.insert(remote_id.to_string()) {
            self.save()?;
        }
        Ok(())
    }

    /// Finalize the batch (operator action; never done automatically)
    pub fn close(&mut self) -> Result<()> {
        self.state.status = BatchStatus::Closed;
        self.save()
    }

    fn save(&self) -> Result<()> {
        let path = self.dir.join(STATE_FILE);
        let tmp = self.dir.join(format!("{}.tmp", STATE_FILE));
        let content = serde_json::to_string_pretty(&self.state)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Store managing all batch directories under one root
#[derive(Debug, Clone)]
pub struct BatchStore {
    root: PathBuf,
}

impl BatchStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Summaries of all known batches, newest first
    ///
    /// Pass a locator to restrict the listing to batches for that source.
    pub fn list(&self, locator: Option<&str>) -> Vec<BatchSummary> {
        let mut summaries = Vec::new();

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return summaries, // no batches yet
        };

        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let state_path = dir.join(STATE_FILE);
            if !state_path.exists() {
                continue;
            }
            match Self::load_state(&state_path) {
                Ok(state) => {
                    if locator.is_some_and(|l| l != state.locator) {
                        continue;
                    }
                    summaries.push(BatchSummary {
                        name: state.name,
                        locator: state.locator,
                        created_at: state.created_at,
                        status: state.status,
                        archived_items: state.archive.len(),
                    });
                }
                Err(e) => warn!("Skipping unreadable batch state {:?}: {}", state_path, e),
            }
        }

        summaries.sort_by(|a, b| (b.created_at, &b.name).cmp(&(a.created_at, &a.name)));
        summaries
    }

    /// Reopen an existing batch by name
    ///
    /// A closed batch reopens when named explicitly; fails with
    /// [`IngestError::BatchNotFound`] if the batch does not exist.
    pub fn open(&self, name: &str) -> Result<BatchHandle> {
        let dir = self.root.join(name);
        let state_path = dir.join(STATE_FILE);
        if !state_path.exists() {
            return Err(IngestError::BatchNotFound(name.to_string()));
        }

        let lock = BatchLock::acquire(&dir, name)?;
        let mut state = Self::load_state(&state_path)?;
        if state.status == BatchStatus::Closed {
            debug!("Reopening closed batch '{}'", name);
            state.status = BatchStatus::Open;
        }

        let handle = BatchHandle {
            dir,
            state,
            _lock: lock,
        };
        handle.save()?;
        Ok(handle)
    }

    /// Create a fresh batch for a locator
    ///
    /// The name combines the locator slug with a creation timestamp, with a
    /// numeric suffix if two batches are created within the same second.
    pub fn create(&self, locator: &str) -> Result<BatchHandle> {
        let base = format!(
            "{}_{}",
            slug_from_locator(locator),
            Utc::now().format("%Y%m%d_%H%M%S")
        );

        let mut name = base.clone();
        let mut counter = 2;
        while self.root.join(&name).exists() {
            name = format!("{}_{}", base, counter);
            counter += 1;
        }

        let dir = self.root.join(&name);
        fs::create_dir_all(&dir)?;
        let lock = BatchLock::acquire(&dir, &name)?;

        let handle = BatchHandle {
            dir,
            state: BatchState {
                version: STATE_VERSION,
                name: name.clone(),
                locator: locator.to_string(),
                created_at: Utc::now(),
                status: BatchStatus::Open,
                archive: BTreeSet::new(),
            },
            _lock: lock,
        };
        handle.save()?;
        debug!("Created batch '{}' for locator '{}'", name, locator);
        Ok(handle)
    }

    /// Resolve and open the batch a run should target
    pub fn resolve(
        &self,
        locator: &str,
        requested_name: Option<&str>,
        force_new: bool,
    ) -> Result<BatchHandle> {
        let existing = self.list(None);
        match select_batch(&existing, locator, requested_name, force_new)? {
            BatchSelection::Reopen(name) => self.open(&name),
            BatchSelection::CreateNew => self.create(locator),
        }
    }

    fn load_state(path: &Path) -> Result<BatchState> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
