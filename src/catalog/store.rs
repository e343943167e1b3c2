//! File-backed catalog store
//!
//! A serde_json catalog kept in a single state file, written atomically
//! (temp file + rename) so a crash mid-save never corrupts it. This is the
//! default [`Catalog`](super::Catalog) implementation for the CLI; a real
//! deployment can swap in anything else behind the trait.

use crate::catalog::{ArtworkId, ArtworkMeta, Catalog, CatalogEntry};
use crate::core::error::{IngestError, Result};
use crate::phash::codec;
use crate::phash::Fingerprint;
use chrono::Utc;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Current state file format version
const CATALOG_VERSION: u32 = 1;

/// Outcome of a fingerprint backfill pass
#[derive(Debug, Clone, Copy, Default)]
pub struct BackfillStats {
    /// Entries that received a freshly computed fingerprint
    pub computed: usize,
    /// Entries whose image bytes could not be read or decoded
    pub failed: usize,
    /// Entries with no stored file path to read from
    pub skipped_no_file: usize,
}

/// On-disk catalog state
#[derive(Debug, Serialize, Deserialize)]
struct CatalogState {
    version: u32,
    next_id: ArtworkId,
    entries: BTreeMap<ArtworkId, CatalogEntry>,
}

impl Default for CatalogState {
    fn default() -> Self {
        Self {
            version: CATALOG_VERSION,
            next_id: 1,
            entries: BTreeMap::new(),
        }
    }
}

/// JSON-file catalog
pub struct JsonCatalog {
    path: PathBuf,
    state: CatalogState,
}

impl JsonCatalog {
    /// Load the catalog at `path`, or start an empty one if absent
    pub fn load_or_create<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();

        let state = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let state: CatalogState = serde_json::from_str(&content)?;
            debug!(
                "Loaded catalog from {:?} ({} entries)",
                path,
                state.entries.len()
            );
            state
        } else {
            debug!("No catalog at {:?}, starting empty", path);
            CatalogState::default()
        };

        Ok(Self { path, state })
    }

    /// Persist the catalog atomically
    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&self.state)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// All entries, ascending by id
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.state.entries.values()
    }

    /// Recompute missing fingerprints from stored image files
    ///
    /// Entries that already carry a fingerprint are untouched. Hashing runs
    /// in parallel; `progress` is invoked with (done, total) as work
    /// completes.
    pub fn backfill_fingerprints<F>(&mut self, progress: F) -> Result<BackfillStats>
    where
        F: Fn(usize, usize) + Sync,
    {
        let pending: Vec<(ArtworkId, PathBuf)> = self
            .state
            .entries
            .values()
            .filter(|e| e.phash.is_none())
            .filter_map(|e| e.file_path.clone().map(|p| (e.id, p)))
            .collect();

        let mut stats = BackfillStats {
            skipped_no_file: self
                .state
                .entries
                .values()
                .filter(|e| e.phash.is_none() && e.file_path.is_none())
                .count(),
            ..Default::default()
        };

        if pending.is_empty() {
            return Ok(stats);
        }

        info!("Backfilling fingerprints for {} entries", pending.len());
        let total = pending.len();
        let done = AtomicUsize::new(0);

        let results: Vec<(ArtworkId, Result<Fingerprint>)> = pending
            .into_par_iter()
            .map(|(id, path)| {
                let result = fs::read(&path)
                    .map_err(IngestError::Io)
                    .and_then(|bytes| codec::compute(&bytes));
                progress(done.fetch_add(1, Ordering::Relaxed) + 1, total);
                (id, result)
            })
            .collect();

        for (id, result) in results {
            match result {
                Ok(fingerprint) => {
                    if let Some(entry) = self.state.entries.get_mut(&id) {
                        entry.phash = Some(codec::encode(&fingerprint));
                        stats.computed += 1;
                    }
                }
                Err(e) => {
                    warn!("Backfill failed for entry {}: {}", id, e);
                    stats.failed += 1;
                }
            }
        }

        self.save()?;
        info!(
            "Backfill complete: {} computed, {} failed, {} without files",
            stats.computed, stats.failed, stats.skipped_no_file
        );
        Ok(stats)
    }
}

impl Catalog for JsonCatalog {
    fn create(
        &mut self,
        meta: &ArtworkMeta,
        file_path: Option<&Path>,
        fingerprint: Option<&Fingerprint>,
    ) -> Result<ArtworkId> {
        if meta.artist.is_empty() || meta.platform.is_empty() {
            return Err(IngestError::Catalog(
                "artist and platform are required".to_string(),
            ));
        }

        let id = self.state.next_id;
        self.state.next_id += 1;

        let entry = CatalogEntry {
            id,
            meta: meta.clone(),
            phash: fingerprint.map(codec::encode),
            file_path: file_path.map(Path::to_path_buf),
            imported_at: Utc::now(),
        };
        self.state.entries.insert(id, entry);
        self.save()?;
        Ok(id)
    }

    fn update_fingerprint(&mut self, id: ArtworkId, fingerprint: &Fingerprint) -> Result<()> {
        let entry = self
            .state
            .entries
            .get_mut(&id)
            .ok_or_else(|| IngestError::Catalog(format!("no entry with id {}", id)))?;
        entry.phash = Some(codec::encode(fingerprint));
        self.save()
    }

    fn find_candidates_by(&self, platform: &str, artist: &str, title: &str) -> Vec<CatalogEntry> {
        self.state
            .entries
            .values()
            .filter(|e| {
                e.meta.platform == platform && e.meta.artist == artist && e.meta.title == title
            })
            .cloned()
            .collect()
    }

    fn get(&self, id: ArtworkId) -> Option<CatalogEntry> {
        self.state.entries.get(&id).cloned()
    }

    fn fingerprints(&self) -> Vec<(ArtworkId, String)> {
        self.state
            .entries
            .values()
            .filter_map(|e| e.phash.clone().map(|h| (e.id, h)))
            .collect()
    }

    fn len(&self) -> usize {
        self.state.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_images::png_ramp;
    use tempfile::TempDir;

    fn meta(artist: &str, title: &str) -> ArtworkMeta {
        ArtworkMeta {
            artist: artist.to_string(),
            platform: "twitter".to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_assigns_sequential_ids_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");

        let mut catalog = JsonCatalog::load_or_create(&path).unwrap();
        let a = catalog.create(&meta("judy", "One"), None, None).unwrap();
        let b = catalog.create(&meta("judy", "Two"), None, None).unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);

        // Reload from disk and verify everything survived
        let reloaded = JsonCatalog::load_or_create(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get(a).unwrap().meta.title, "One");

        let mut reloaded = reloaded;
        let c = reloaded.create(&meta("judy", "Three"), None, None).unwrap();
        assert_eq!(c, 3);
    }

    #[test]
    fn test_create_requires_artist_and_platform() {
        let dir = TempDir::new().unwrap();
        let mut catalog = JsonCatalog::load_or_create(dir.path().join("c.json")).unwrap();

        let bad = ArtworkMeta {
            title: "untitled".to_string(),
            ..Default::default()
        };
        assert!(catalog.create(&bad, None, None).is_err());
    }

    #[test]
    fn test_update_fingerprint_and_listing() {
        let dir = TempDir::new().unwrap();
        let mut catalog = JsonCatalog::load_or_create(dir.path().join("c.json")).unwrap();

        let fp = Fingerprint::from_bytes([1, 2, 3, 4, 5, 6, 7, 8]);
        let id = catalog.create(&meta("nick", "Pawpsicle"), None, None).unwrap();
        assert!(catalog.fingerprints().is_empty());

        catalog.update_fingerprint(id, &fp).unwrap();
        let listed = catalog.fingerprints();
        assert_eq!(listed, vec![(id, codec::encode(&fp))]);

        assert!(catalog.update_fingerprint(999, &fp).is_err());
    }

    #[test]
    fn test_find_candidates_matches_full_key() {
        let dir = TempDir::new().unwrap();
        let mut catalog = JsonCatalog::load_or_create(dir.path().join("c.json")).unwrap();

        catalog.create(&meta("judy", "Sunrise"), None, None).unwrap();
        catalog.create(&meta("nick", "Sunrise"), None, None).unwrap();

        assert_eq!(catalog.find_candidates_by("twitter", "judy", "Sunrise").len(), 1);
        assert_eq!(catalog.find_candidates_by("twitter", "judy", "Sunset").len(), 0);
        assert_eq!(catalog.find_candidates_by("pixiv", "judy", "Sunrise").len(), 0);
    }

    #[test]
    fn test_backfill_computes_missing_fingerprints() {
        let dir = TempDir::new().unwrap();
        let image_path = dir.path().join("ramp.png");
        fs::write(&image_path, png_ramp()).unwrap();

        let mut catalog = JsonCatalog::load_or_create(dir.path().join("c.json")).unwrap();
        let with_file = catalog
            .create(&meta("judy", "Ramp"), Some(&image_path), None)
            .unwrap();
        let without_file = catalog.create(&meta("judy", "Lost"), None, None).unwrap();

        let stats = catalog.backfill_fingerprints(|_done, _total| {}).unwrap();
        assert_eq!(stats.computed, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.skipped_no_file, 1);

        assert!(catalog.get(with_file).unwrap().phash.is_some());
        assert!(catalog.get(without_file).unwrap().phash.is_none());
    }
}
