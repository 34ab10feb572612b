//! Perceptual fingerprints: a 64-bit difference hash ("dHash").
//!
//! The image is converted to luminance, resized to 9×8 pixels and each row
//! is compared pixel-by-pixel: bit = 1 when a pixel is brighter than its
//! left neighbour. Resizing and recompression barely move the gradient
//! signs, so copies of the same picture at different sizes usually share a
//! fingerprint, while a cryptographic hash would not.
//!
//! Only exact equality of fingerprints is ever used for deduplication.

use image::imageops::{self, FilterType};
use std::fmt;
use std::str::FromStr;

const HASH_WIDTH: u32 = 8;
const HASH_HEIGHT: u32 = 8;

/// A 64-bit difference hash, displayed as 16 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Error returned when a string is not a 16-digit hex fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a 16-digit hex fingerprint")]
pub struct ParseFingerprintError(String);

impl FromStr for Fingerprint {
    type Err = ParseFingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseFingerprintError(s.to_string()));
        }
        u64::from_str_radix(s, 16)
            .map(Fingerprint)
            .map_err(|_| ParseFingerprintError(s.to_string()))
    }
}

/// Decode raw image bytes (PNG or JPEG) and compute their fingerprint.
pub fn fingerprint_bytes(bytes: &[u8]) -> Result<Fingerprint, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    Ok(fingerprint_image(&img))
}

/// Compute the difference hash of a decoded image.
pub fn fingerprint_image(img: &image::DynamicImage) -> Fingerprint {
    let gray = img.to_luma8();
    let small = imageops::resize(&gray, HASH_WIDTH + 1, HASH_HEIGHT, FilterType::Lanczos3);

    let mut bits = 0u64;
    for y in 0..HASH_HEIGHT {
        for x in 0..HASH_WIDTH {
            let left = small.get_pixel(x, y)[0];
            let right = small.get_pixel(x + 1, y)[0];
            bits = (bits << 1) | u64::from(right > left);
        }
    }
    Fingerprint(bits)
}
