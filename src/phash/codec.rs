//! Perceptual fingerprint codec
//!
//! Computes a fixed-width perceptual fingerprint from raw image bytes and
//! converts fingerprints to and from their compact hex text form (the shape
//! the catalog stores).
//!
//! The fingerprint is a 64-bit vector produced by a gradient hash: the image
//! is normalized to a small grayscale grid and each bit records whether a
//! cell's intensity exceeds its horizontal neighbor. Identical decoded pixels
//! always produce the identical fingerprint; minor recompression or resaving
//! moves only a few bits, so visually similar images sit at a small Hamming
//! distance.

use crate::core::error::{IngestError, Result};
use img_hash::image::ImageError;
use img_hash::{HashAlg, HasherConfig};
use std::fmt;
use std::str::FromStr;

/// Width of a fingerprint in bits
pub const FINGERPRINT_BITS: usize = 64;

/// Width of a fingerprint in bytes
pub const FINGERPRINT_BYTES: usize = FINGERPRINT_BITS / 8;

/// Length of the encoded hex text form
pub const ENCODED_LEN: usize = FINGERPRINT_BYTES * 2;

/// Grid edge length fed to the hasher (8x8 comparisons = 64 bits)
const HASH_GRID: u32 = 8;

/// A fixed-width perceptual fingerprint of an image's visual content
///
/// Immutable once computed. Compared by Hamming distance; see
/// [`Fingerprint::distance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; FINGERPRINT_BYTES]);

impl Fingerprint {
    /// Construct a fingerprint from raw bytes (primarily for tests)
    pub fn from_bytes(bytes: [u8; FINGERPRINT_BYTES]) -> Self {
        Self(bytes)
    }

    /// Raw bit-vector bytes
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_BYTES] {
        &self.0
    }

    /// Hamming distance to another fingerprint (count of differing bits)
    ///
    /// Symmetric, and zero iff the fingerprints are equal.
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(self))
    }
}

impl FromStr for Fingerprint {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        decode(s)
    }
}

/// Compute the perceptual fingerprint of an image from its raw bytes
///
/// Fails with [`IngestError::UnsupportedFormat`] when the bytes are a
/// recognized but unhandled format, and [`IngestError::Decode`] for anything
/// that is not a readable raster image.
pub fn compute(image_bytes: &[u8]) -> Result<Fingerprint> {
    let img = img_hash::image::load_from_memory(image_bytes).map_err(|e| match e {
        ImageError::Unsupported(u) => IngestError::UnsupportedFormat(u.to_string()),
        other => IngestError::Decode(other.to_string()),
    })?;

    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::Gradient)
        .hash_size(HASH_GRID, HASH_GRID)
        .to_hasher();
    let hash = hasher.hash_image(&img);

    let bytes: [u8; FINGERPRINT_BYTES] = hash.as_bytes().try_into().map_err(|_| {
        IngestError::Decode(format!(
            "hasher produced {} bytes, expected {}",
            hash.as_bytes().len(),
            FINGERPRINT_BYTES
        ))
    })?;

    Ok(Fingerprint(bytes))
}

/// Encode a fingerprint as its 16-character lowercase hex text form
pub fn encode(fingerprint: &Fingerprint) -> String {
    let mut out = String::with_capacity(ENCODED_LEN);
    for byte in fingerprint.as_bytes() {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Decode the hex text form back into a fingerprint
///
/// Lossless inverse of [`encode`]. Fails with
/// [`IngestError::MalformedFingerprint`] on any text that is not exactly
/// [`ENCODED_LEN`] hex characters.
pub fn decode(text: &str) -> Result<Fingerprint> {
    if text.len() != ENCODED_LEN {
        return Err(IngestError::MalformedFingerprint {
            text: text.to_string(),
            reason: format!("expected {} characters, got {}", ENCODED_LEN, text.len()),
        });
    }

    // from_str_radix tolerates signs and whitespace; only hex digits pass
    if !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(IngestError::MalformedFingerprint {
            text: text.to_string(),
            reason: "contains non-hex characters".to_string(),
        });
    }

    let mut bytes = [0u8; FINGERPRINT_BYTES];
    for (i, chunk) in text.as_bytes().chunks(2).enumerate() {
        let pair = std::str::from_utf8(chunk).map_err(|_| IngestError::MalformedFingerprint {
            text: text.to_string(),
            reason: "not valid ASCII hex".to_string(),
        })?;
        bytes[i] = u8::from_str_radix(pair, 16).map_err(|_| IngestError::MalformedFingerprint {
            text: text.to_string(),
            reason: format!("invalid hex pair '{}'", pair),
        })?;
    }

    Ok(Fingerprint(bytes))
}

/// Hamming distance between two fingerprints
pub fn distance(a: &Fingerprint, b: &Fingerprint) -> u32 {
    a.distance(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_images::{png_ramp, png_solid, solid_pixels_as_bmp, solid_pixels_as_png};

    #[test]
    fn test_distance_symmetric_and_zero_on_self() {
        let a = Fingerprint::from_bytes([0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77]);
        let b = Fingerprint::from_bytes([0xff, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x78]);

        assert_eq!(distance(&a, &b), distance(&b, &a));
        assert_eq!(distance(&a, &a), 0);
        assert_eq!(distance(&b, &b), 0);
    }

    #[test]
    fn test_distance_counts_differing_bits() {
        let a = Fingerprint::from_bytes([0b0000_0000; 8]);
        let b = Fingerprint::from_bytes([0b0000_0011, 0, 0, 0, 0, 0, 0, 0]);

        assert_eq!(distance(&a, &b), 2);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let fp = Fingerprint::from_bytes([0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0x7f, 0x80]);
        let text = encode(&fp);

        assert_eq!(text.len(), ENCODED_LEN);
        assert_eq!(decode(&text).unwrap(), fp);
    }

    #[test]
    fn test_compute_round_trips_through_text() {
        let fp = compute(&png_ramp()).unwrap();
        assert_eq!(decode(&encode(&fp)).unwrap(), fp);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let err = decode("abcd").unwrap_err();
        assert!(matches!(err, IngestError::MalformedFingerprint { .. }));

        let err = decode("0123456789abcdef00").unwrap_err();
        assert!(matches!(err, IngestError::MalformedFingerprint { .. }));
    }

    #[test]
    fn test_decode_rejects_non_hex() {
        let err = decode("0123456789abcdeg").unwrap_err();
        assert!(matches!(err, IngestError::MalformedFingerprint { .. }));
    }

    #[test]
    fn test_decode_rejects_signed_or_padded_pairs() {
        // Correct length, but the pairs smuggle in signs and whitespace
        for text in ["+1+1+1+1+1+1+1+1", "-1-1-1-1-1-1-1-1", " 1 1 1 1 1 1 1 1"] {
            let err = decode(text).unwrap_err();
            assert!(matches!(err, IngestError::MalformedFingerprint { .. }));
        }
    }

    #[test]
    fn test_compute_is_deterministic() {
        let bytes = png_ramp();
        assert_eq!(compute(&bytes).unwrap(), compute(&bytes).unwrap());
    }

    #[test]
    fn test_identical_pixels_identical_fingerprint_across_containers() {
        // Same decoded pixels, two different lossless containers
        let png = solid_pixels_as_png(120, 40, 200);
        let bmp = solid_pixels_as_bmp(120, 40, 200);

        assert_eq!(compute(&png).unwrap(), compute(&bmp).unwrap());
    }

    #[test]
    fn test_distinct_content_distinct_fingerprints() {
        let ramp = compute(&png_ramp()).unwrap();
        let solid = compute(&png_solid(60)).unwrap();

        // A horizontal ramp sets every gradient bit; a flat image sets none.
        assert!(ramp.distance(&solid) > 10);
    }

    #[test]
    fn test_compute_rejects_garbage_bytes() {
        let err = compute(b"definitely not an image").unwrap_err();
        assert!(matches!(
            err,
            IngestError::Decode(_) | IngestError::UnsupportedFormat(_)
        ));
    }
}
