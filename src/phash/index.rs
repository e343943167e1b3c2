//! In-memory fingerprint index
//!
//! Maps catalog entry identifiers to fingerprints and answers "everything
//! within Hamming distance T" queries with a full scan. The index is a
//! derived cache: it can be rebuilt from the catalog at any time and is never
//! the source of truth.
//!
//! A linear scan is fine at catalog scale (tens of thousands of entries,
//! one XOR + popcount each). Should the catalog outgrow that, a BK-tree can
//! replace the map as long as result ordering and completeness hold.

use crate::catalog::ArtworkId;
use crate::core::error::Result;
use crate::phash::codec::{self, Fingerprint};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A single query hit: entry identifier plus its distance from the probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub id: ArtworkId,
    pub distance: u32,
}

/// Outcome of a rebuild pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    /// Records loaded into the index
    pub loaded: usize,
    /// Records excluded because their stored fingerprint text was malformed
    pub skipped_malformed: usize,
}

/// Index shared between an active import run (writer) and similarity
/// searches (readers); puts under the write lock are atomic from a
/// reader's point of view.
pub type SharedIndex = Arc<RwLock<HashIndex>>;

/// Mapping from catalog entry id to perceptual fingerprint
#[derive(Debug, Default)]
pub struct HashIndex {
    entries: HashMap<ArtworkId, Fingerprint>,
}

impl HashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh index for shared use
    pub fn shared() -> SharedIndex {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Upsert the fingerprint for an entry
    pub fn put(&mut self, id: ArtworkId, fingerprint: Fingerprint) {
        self.entries.insert(id, fingerprint);
    }

    /// Remove an entry; no-op if absent
    pub fn remove(&mut self, id: ArtworkId) {
        self.entries.remove(&id);
    }

    pub fn get(&self, id: ArtworkId) -> Option<&Fingerprint> {
        self.entries.get(&id)
    }

    /// All entries within `threshold` bits of `fingerprint`
    ///
    /// Results are ordered by ascending distance, ties broken by ascending
    /// identifier.
    pub fn query(&self, fingerprint: &Fingerprint, threshold: u32) -> Vec<Match> {
        let mut matches: Vec<Match> = self
            .entries
            .iter()
            .filter_map(|(&id, stored)| {
                let distance = fingerprint.distance(stored);
                (distance <= threshold).then_some(Match { id, distance })
            })
            .collect();

        matches.sort_by_key(|m| (m.distance, m.id));
        matches
    }

    /// Clear and repopulate from stored (id, encoded fingerprint) pairs
    ///
    /// Used for cold start and consistency repair. Malformed fingerprint
    /// records are logged, counted, and excluded from the rebuilt index.
    pub fn rebuild<I>(&mut self, records: I) -> Result<RebuildStats>
    where
        I: IntoIterator<Item = (ArtworkId, String)>,
    {
        self.entries.clear();
        let mut stats = RebuildStats::default();

        for (id, text) in records {
            match codec::decode(&text) {
                Ok(fingerprint) => {
                    self.entries.insert(id, fingerprint);
                    stats.loaded += 1;
                }
                Err(e) => {
                    warn!("Skipping fingerprint for entry {}: {}", id, e);
                    stats.skipped_malformed += 1;
                }
            }
        }

        debug!(
            "Hash index rebuilt: {} loaded, {} malformed records skipped",
            stats.loaded, stats.skipped_malformed
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(first_byte: u8) -> Fingerprint {
        Fingerprint::from_bytes([first_byte, 0, 0, 0, 0, 0, 0, 0])
    }

    #[test]
    fn test_put_remove_and_len() {
        let mut index = HashIndex::new();
        assert!(index.is_empty());

        index.put(1, fp(0b0000_0000));
        index.put(2, fp(0b1111_1111));
        assert_eq!(index.len(), 2);

        // Upsert does not grow the index
        index.put(1, fp(0b0000_0001));
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(1), Some(&fp(0b0000_0001)));

        index.remove(2);
        index.remove(2); // idempotent
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_query_orders_by_distance_then_id() {
        let mut index = HashIndex::new();
        index.put(10, fp(0b0000_0011)); // distance 2
        index.put(3, fp(0b0000_0001)); // distance 1
        index.put(7, fp(0b0000_0010)); // distance 1, higher id than 3
        index.put(99, fp(0b1111_1111)); // distance 8, out of range

        let matches = index.query(&fp(0), 2);
        let ids: Vec<_> = matches.iter().map(|m| m.id).collect();
        let distances: Vec<_> = matches.iter().map(|m| m.distance).collect();

        assert_eq!(ids, vec![3, 7, 10]);
        assert_eq!(distances, vec![1, 1, 2]);
    }

    #[test]
    fn test_query_exact_match_is_distance_zero() {
        let mut index = HashIndex::new();
        index.put(5, fp(0b1010_1010));

        let matches = index.query(&fp(0b1010_1010), 0);
        assert_eq!(matches, vec![Match { id: 5, distance: 0 }]);
    }

    #[test]
    fn test_query_monotonic_over_threshold() {
        let mut index = HashIndex::new();
        for id in 0..16u64 {
            index.put(id, fp(id as u8));
        }

        let probe = fp(0);
        let narrow = index.query(&probe, 1);
        let wide = index.query(&probe, 4);

        for m in &narrow {
            assert!(wide.contains(m), "narrow result {:?} missing at wider threshold", m);
        }
        assert!(wide.len() >= narrow.len());
    }

    #[test]
    fn test_rebuild_skips_malformed_records() {
        let mut index = HashIndex::new();
        index.put(42, fp(1)); // should be cleared by rebuild

        let records = vec![
            (1, "0000000000000000".to_string()),
            (2, "not-a-fingerprint".to_string()),
            (3, "00000000000000ff".to_string()),
        ];

        let stats = index.rebuild(records).unwrap();
        assert_eq!(stats.loaded, 2);
        assert_eq!(stats.skipped_malformed, 1);
        assert_eq!(index.len(), 2);
        assert!(index.get(42).is_none());
        assert!(index.get(2).is_none());
    }
}
