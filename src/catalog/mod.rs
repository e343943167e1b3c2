//! Catalog collaborator contract
//!
//! The catalog owns artwork metadata and identifiers; this crate only reads
//! the duplicate-key heuristic fields (platform, artist, title) and reads or
//! writes the stored fingerprint text. [`Catalog`] is the seam the pipeline
//! talks through; [`store::JsonCatalog`] is the file-backed default
//! implementation.

pub mod store;

pub use store::JsonCatalog;

use crate::core::error::Result;
use crate::phash::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Stable catalog entry identifier, assigned by the catalog on create
pub type ArtworkId = u64;

/// Collaborator-owned metadata for one artwork
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtworkMeta {
    pub artist: String,
    pub platform: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
}

/// One catalog record as this crate sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: ArtworkId,
    pub meta: ArtworkMeta,
    /// Encoded fingerprint text, absent until computed
    #[serde(default)]
    pub phash: Option<String>,
    /// Where the image bytes live, for fingerprint backfill
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    pub imported_at: DateTime<Utc>,
}

/// What the ingestion core requires of the catalog
pub trait Catalog {
    /// Insert a new entry, returning its assigned identifier
    fn create(
        &mut self,
        meta: &ArtworkMeta,
        file_path: Option<&Path>,
        fingerprint: Option<&Fingerprint>,
    ) -> Result<ArtworkId>;

    /// Set or replace the fingerprint of an existing entry
    fn update_fingerprint(&mut self, id: ArtworkId, fingerprint: &Fingerprint) -> Result<()>;

    /// Entries whose (platform, artist, title) key matches exactly
    fn find_candidates_by(&self, platform: &str, artist: &str, title: &str) -> Vec<CatalogEntry>;

    /// Look up a single entry
    fn get(&self, id: ArtworkId) -> Option<CatalogEntry>;

    /// All (id, encoded fingerprint) pairs, for index rebuild
    fn fingerprints(&self) -> Vec<(ArtworkId, String)>;

    /// Total number of entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pick a collision-free title for a new entry
///
/// Candidates sharing (platform, artist, title) are expected — multi-image
/// posts are one title repeated — so same-key entries collapse into a
/// numbered series ("Title (1)", "Title (2)", ...) instead of being treated
/// as duplicates. The base title is kept when free; otherwise the lowest
/// free series number is taken.
pub fn resolve_series_title(
    catalog: &dyn Catalog,
    platform: &str,
    artist: &str,
    title: &str,
) -> String {
    if catalog.find_candidates_by(platform, artist, title).is_empty() {
        return title.to_string();
    }

    for n in 1u32.. {
        let candidate = format!("{} ({})", title, n);
        if catalog
            .find_candidates_by(platform, artist, &candidate)
            .is_empty()
        {
            return candidate;
        }
    }
    unreachable!("series numbering exhausted u32 range");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(artist: &str, platform: &str, title: &str) -> ArtworkMeta {
        ArtworkMeta {
            artist: artist.to_string(),
            platform: platform.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_series_title_keeps_free_base() {
        let dir = TempDir::new().unwrap();
        let catalog = JsonCatalog::load_or_create(dir.path().join("catalog.json")).unwrap();

        let title = resolve_series_title(&catalog, "twitter", "judy", "Carrot Field");
        assert_eq!(title, "Carrot Field");
    }

    #[test]
    fn test_series_title_numbers_collisions() {
        let dir = TempDir::new().unwrap();
        let mut catalog = JsonCatalog::load_or_create(dir.path().join("catalog.json")).unwrap();

        catalog
            .create(&meta("judy", "twitter", "Carrot Field"), None, None)
            .unwrap();
        assert_eq!(
            resolve_series_title(&catalog, "twitter", "judy", "Carrot Field"),
            "Carrot Field (1)"
        );

        catalog
            .create(&meta("judy", "twitter", "Carrot Field (1)"), None, None)
            .unwrap();
        assert_eq!(
            resolve_series_title(&catalog, "twitter", "judy", "Carrot Field"),
            "Carrot Field (2)"
        );
    }

    #[test]
    fn test_series_title_is_scoped_to_key() {
        let dir = TempDir::new().unwrap();
        let mut catalog = JsonCatalog::load_or_create(dir.path().join("catalog.json")).unwrap();

        catalog
            .create(&meta("judy", "twitter", "Carrot Field"), None, None)
            .unwrap();

        // Different artist, same title: no collision
        assert_eq!(
            resolve_series_title(&catalog, "twitter", "nick", "Carrot Field"),
            "Carrot Field"
        );
    }
}
