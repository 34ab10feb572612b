//! Output types returned by the conversion entry points.

use crate::error::ConversionWarning;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a single embedded image was resolved against the wiki.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// The fingerprint was already indexed; no upload happened.
    Existing(String),
    /// The image was uploaded and recorded in the index.
    Uploaded(String),
    /// Dry run: the image would need an upload.
    Pending,
}

impl Resolution {
    /// The remote identifier, if the image exists (or now exists) on the wiki.
    pub fn remote_id(&self) -> Option<&str> {
        match self {
            Resolution::Existing(id) | Resolution::Uploaded(id) => Some(id),
            Resolution::Pending => None,
        }
    }
}

/// The result of converting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Wikitext ready to be saved to the target page.
    pub markup: String,
    /// Sequence number → remote identifier for every resolved image.
    pub resolved_images: BTreeMap<u32, String>,
    /// Sequence numbers of images that still need an upload, in order.
    pub unresolved_images: Vec<u32>,
    /// Sequence numbers of images uploaded during this run, in order.
    pub uploaded_images: Vec<u32>,
    /// Non-fatal problems that need manual cleanup.
    pub warnings: Vec<ConversionWarning>,
    pub stats: ConversionStats,
}

/// Counters and timings for a conversion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_images: usize,
    pub matched_images: usize,
    pub uploaded_images: usize,
    pub unresolved_images: usize,
    pub citations_resolved: usize,
    pub tables: usize,
    pub load_duration_ms: u64,
    pub image_duration_ms: u64,
    pub total_duration_ms: u64,
}
