//! Perceptual hashing
//!
//! Fingerprint computation and codec plus the in-memory similarity index.
//!
//! # Submodules
//!
//! - `codec` - fingerprint computation, hex codec, Hamming distance
//! - `index` - id -> fingerprint map with threshold queries

pub mod codec;
pub mod index;

pub use codec::{compute, decode, distance, encode, Fingerprint};
pub use index::{HashIndex, Match, RebuildStats, SharedIndex};
