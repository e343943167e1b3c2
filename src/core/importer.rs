//! Batch import pipeline
//!
//! Single-threaded cooperative loop over a source's items: skip what the
//! batch archive already holds, fetch with retry, fingerprint, run the
//! duplicate check, commit survivors to the catalog, and archive every item
//! whose fetch succeeded so the next run resumes where this one stopped.
//!
//! Items fail individually without stopping the run; only an operator abort,
//! a shutdown signal, or a streak of consecutive fetch failures ends it
//! early, and those surface as [`IngestError::PipelineAborted`] carrying the
//! partial [`RunSummary`] so completed commits are never hidden.

use crate::catalog::{resolve_series_title, Catalog};
use crate::core::batch::BatchStore;
use crate::core::error::{IngestError, Result};
use crate::core::resolver::{DuplicateResolver, MatchDetail, Outcome};
use crate::phash::{codec, Fingerprint, SharedIndex};
use crate::source::{ItemSource, SourceItem};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Why a run stopped before exhausting its source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Operator answered "abort" at a duplicate prompt
    OperatorRequest,
    /// Interrupt signal observed between items
    ShutdownSignal,
    /// Too many fetch failures in a row; the source is likely down
    FetchFailures(u32),
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OperatorRequest => write!(f, "operator request"),
            Self::ShutdownSignal => write!(f, "shutdown signal"),
            Self::FetchFailures(n) => write!(f, "{} consecutive fetch failures", n),
        }
    }
}

/// Per-run counters, reported whether the run completes or aborts
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Name of the batch the run targeted
    pub batch: String,
    /// Items whose bytes were retrieved this run
    pub fetched: usize,
    /// Items skipped because the archive already held them
    pub skipped_archived: usize,
    /// Items suppressed by the duplicate check
    pub skipped_duplicate: usize,
    /// Items whose bytes could not be decoded as an image
    pub skipped_invalid: usize,
    /// Items committed to the catalog (or counted as would-commit in a dry run)
    pub committed: usize,
    /// Items whose fetch failed after all retries
    pub failed: usize,
}

/// Retry behavior for per-item fetches
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per item, including the first
    pub attempts: u32,
    /// Delay before the second attempt
    pub base_delay_ms: u64,
    /// Multiplier applied per further attempt
    pub factor: f64,
    /// Run aborts after this many items fail in a row
    pub max_consecutive_failures: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 1000,
            factor: 2.0,
            max_consecutive_failures: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after a failed attempt (1-based)
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1) as i32;
        (self.base_delay_ms as f64 * self.factor.powi(exponent)) as u64
    }
}

/// Per-run knobs
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Hamming distance at or below which a stored entry counts as a match
    pub threshold: u32,
    /// Count and report without touching catalog, index, or archive
    pub dry_run: bool,
    /// Reopen this batch instead of selecting one by locator
    pub batch: Option<String>,
    /// Always start a fresh batch
    pub force_new: bool,
    /// Select batches under this locator instead of the source's own
    ///
    /// Lets a local drop folder continue the batch of the account it was
    /// downloaded from.
    pub locator: Option<String>,
}

/// Uncommitted sibling from earlier in a dry run; reported with id 0
/// since no catalog identifier exists yet
struct DrySibling {
    fingerprint: Fingerprint,
    artist: String,
    title: String,
}

/// The import pipeline
pub struct BatchImporter<'a> {
    catalog: &'a mut dyn Catalog,
    index: SharedIndex,
    batches: &'a BatchStore,
    resolver: DuplicateResolver,
    retry: RetryPolicy,
    shutdown: Arc<AtomicBool>,
}

impl<'a> BatchImporter<'a> {
    pub fn new(
        catalog: &'a mut dyn Catalog,
        index: SharedIndex,
        batches: &'a BatchStore,
        resolver: DuplicateResolver,
        retry: RetryPolicy,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            catalog,
            index,
            batches,
            resolver,
            retry,
            shutdown,
        }
    }

    /// Run the pipeline over every item the source enumerates
    ///
    /// Committed entries stand regardless of how the run ends. An early stop
    /// returns [`IngestError::PipelineAborted`] with the partial summary.
    pub fn run(&mut self, source: &mut dyn ItemSource, options: &ImportOptions) -> Result<RunSummary> {
        let locator = options
            .locator
            .clone()
            .unwrap_or_else(|| source.locator().to_string());
        let mut batch =
            self.batches
                .resolve(&locator, options.batch.as_deref(), options.force_new)?;

        let mut summary = RunSummary {
            batch: batch.name().to_string(),
            ..Default::default()
        };

        info!(
            "Importing '{}' into batch '{}' (threshold {}, {} already archived{})",
            source.locator(),
            batch.name(),
            options.threshold,
            batch.archived_items(),
            if options.dry_run { ", dry run" } else { "" }
        );

        let mut dry_siblings: Vec<DrySibling> = Vec::new();
        let mut consecutive_failures = 0u32;

        for mut item in source.items()? {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("Shutdown requested, stopping after {} commits", summary.committed);
                return Err(IngestError::PipelineAborted {
                    reason: AbortReason::ShutdownSignal,
                    summary,
                });
            }

            if batch.contains(&item.remote_id) {
                debug!("'{}' already archived, skipping", item.remote_id);
                summary.skipped_archived += 1;
                continue;
            }

            let bytes = match self.fetch_with_retry(&mut item) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Giving up on '{}': {}", item.remote_id, e);
                    summary.failed += 1;
                    consecutive_failures += 1;
                    if consecutive_failures >= self.retry.max_consecutive_failures {
                        return Err(IngestError::PipelineAborted {
                            reason: AbortReason::FetchFailures(consecutive_failures),
                            summary,
                        });
                    }
                    continue;
                }
            };
            consecutive_failures = 0;
            summary.fetched += 1;

            let fingerprint = match codec::compute(&bytes) {
                Ok(fingerprint) => fingerprint,
                Err(e)
                    if matches!(
                        e,
                        IngestError::Decode(_) | IngestError::UnsupportedFormat(_)
                    ) =>
                {
                    warn!("'{}' is not an importable image: {}", item.remote_id, e);
                    summary.skipped_invalid += 1;
                    // Archived anyway: refetching won't make it decodable
                    if !options.dry_run {
                        batch.append(&item.remote_id)?;
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            let matches = self.find_matches(&fingerprint, &dry_siblings, options.threshold);
            let decision = self.resolver.resolve(&item.remote_id, matches);

            match decision.outcome {
                Outcome::AbortRequested => {
                    info!("Operator aborted at '{}'", item.remote_id);
                    // Deliberately not archived: the item stays pending
                    return Err(IngestError::PipelineAborted {
                        reason: AbortReason::OperatorRequest,
                        summary,
                    });
                }
                Outcome::Skipped | Outcome::AskedAndSkipped => {
                    debug!(
                        "'{}' suppressed as duplicate of {} match(es)",
                        item.remote_id,
                        decision.matches.len()
                    );
                    summary.skipped_duplicate += 1;
                    if !options.dry_run {
                        batch.append(&item.remote_id)?;
                    }
                }
                Outcome::Accepted | Outcome::AskedAndKept => {
                    if options.dry_run {
                        dry_siblings.push(DrySibling {
                            fingerprint,
                            artist: item.meta.artist.clone(),
                            title: item.meta.title.clone(),
                        });
                        summary.committed += 1;
                        continue;
                    }
                    self.commit(&item, &fingerprint)?;
                    batch.append(&item.remote_id)?;
                    summary.committed += 1;
                }
            }
        }

        info!(
            "Run complete: {} committed, {} duplicates, {} archived skips, {} invalid, {} failed",
            summary.committed,
            summary.skipped_duplicate,
            summary.skipped_archived,
            summary.skipped_invalid,
            summary.failed
        );
        Ok(summary)
    }

    fn fetch_with_retry(&self, item: &mut SourceItem) -> Result<Vec<u8>> {
        let attempts = self.retry.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match item.fetch() {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    warn!(
                        "Fetch attempt {}/{} for '{}' failed: {}",
                        attempt, attempts, item.remote_id, e
                    );
                    if attempt < attempts {
                        thread::sleep(Duration::from_millis(self.retry.backoff_ms(attempt)));
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| IngestError::Fetch {
            remote_id: item.remote_id.clone(),
            message: "no fetch attempts configured".to_string(),
        }))
    }

    /// Catalog matches plus same-run dry siblings, one sorted list
    ///
    /// During a real run committed items enter the shared index immediately,
    /// so earlier siblings come back from the index query like any other
    /// catalog entry. Dry runs commit nothing; their would-be commits are
    /// tracked separately and surface with id 0.
    fn find_matches(
        &self,
        fingerprint: &Fingerprint,
        dry_siblings: &[DrySibling],
        threshold: u32,
    ) -> Vec<MatchDetail> {
        let index = self.index.read().unwrap_or_else(|e| e.into_inner());

        let mut details: Vec<MatchDetail> = index
            .query(fingerprint, threshold)
            .into_iter()
            .map(|m| {
                let entry = self.catalog.get(m.id);
                MatchDetail {
                    id: m.id,
                    distance: m.distance,
                    artist: entry
                        .as_ref()
                        .map(|e| e.meta.artist.clone())
                        .unwrap_or_default(),
                    title: entry.map(|e| e.meta.title).unwrap_or_default(),
                }
            })
            .collect();

        for sibling in dry_siblings {
            let distance = fingerprint.distance(&sibling.fingerprint);
            if distance <= threshold {
                details.push(MatchDetail {
                    id: 0,
                    distance,
                    artist: sibling.artist.clone(),
                    title: sibling.title.clone(),
                });
            }
        }

        details.sort_by(|a, b| (a.distance, a.id).cmp(&(b.distance, b.id)));
        details
    }

    fn commit(&mut self, item: &SourceItem, fingerprint: &Fingerprint) -> Result<()> {
        let title = resolve_series_title(
            self.catalog,
            &item.meta.platform,
            &item.meta.artist,
            &item.meta.title,
        );

        let mut meta = item.meta.clone();
        meta.title = title;

        let id = self
            .catalog
            .create(&meta, item.local_path.as_deref(), Some(fingerprint))?;
        self.index
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .put(id, *fingerprint);

        info!("Committed '{}' as entry {} ('{}')", item.remote_id, id, meta.title);
        Ok(())
    }
}
