//! Error types for the docx2wiki library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Docx2WikiError`] — **Fatal**: the conversion cannot proceed (the
//!   document is malformed, an image has no ALT text, the wiki rejected an
//!   upload, the fingerprint index is unreadable). Returned as
//!   `Err(Docx2WikiError)` from the top-level `convert*` functions, and
//!   nothing is published.
//!
//! * [`ConversionWarning`] — **Non-fatal**: a single construct could not be
//!   transformed (a citation link without a payload, a table without a
//!   header row). The affected content is emitted as-is and the warning is
//!   stored in [`crate::output::ConversionResult`] for manual cleanup.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docx2wiki library.
#[derive(Debug, Error)]
pub enum Docx2WikiError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but does not start with a ZIP local-file header.
    #[error("File is not a .docx document: '{path}'\nFirst bytes: {magic:?}")]
    NotADocx { path: PathBuf, magic: [u8; 4] },

    /// The container or its main document part is malformed.
    #[error("Could not load document: {detail}")]
    Load { detail: String },

    // ── Image errors ──────────────────────────────────────────────────────
    /// An image with no index match has no ALT text, so it cannot be uploaded.
    #[error("Abort: Must set ALT text for image {sequence}.")]
    MissingAltText { sequence: u32 },

    /// Image bytes could not be decoded for fingerprinting.
    #[error("Could not fingerprint {subject}: {detail}")]
    Fingerprint { subject: String, detail: String },

    // ── Remote store errors ───────────────────────────────────────────────
    /// The wiki rejected an upload or could not be reached.
    #[error("Upload of '{filename}' failed: {reason}")]
    Upload { filename: String, reason: String },

    /// A remote asset could not be downloaded during reconciliation.
    #[error("Could not download {title}: {reason}")]
    Download { title: String, reason: String },

    /// Any other failed call to the remote wiki (login, listing, tokens).
    #[error("Wiki API error: {0}")]
    Remote(String),

    /// Saving the converted page failed.
    #[error("Could not save page '{page}': {reason}")]
    Publish { page: String, reason: String },

    // ── Index errors ──────────────────────────────────────────────────────
    /// The fingerprint index is missing, unreadable or corrupt.
    #[error("Fingerprint index '{path}': {detail}")]
    Store { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output wikitext file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Docx2WikiError {
    pub(crate) fn load(detail: impl std::fmt::Display) -> Self {
        Docx2WikiError::Load {
            detail: detail.to_string(),
        }
    }

    pub(crate) fn store(path: impl Into<PathBuf>, detail: impl std::fmt::Display) -> Self {
        Docx2WikiError::Store {
            path: path.into(),
            detail: detail.to_string(),
        }
    }
}

/// A non-fatal problem found while converting.
///
/// Logged at `warn` level and returned in
/// [`crate::output::ConversionResult::warnings`]. The document is still
/// converted; the affected construct needs manual post-editing.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ConversionWarning {
    /// A citation-service link did not carry a parseable CSL payload.
    #[error("Citation link left unchanged: {detail}")]
    UnparsableCitation { detail: String },

    /// A table had no header cells; only data rows were emitted.
    #[error("Table {table} has no header row")]
    MalformedTable { table: usize },

    /// An image reference pointed at no embedded media and was dropped.
    #[error("Image reference '{target}' has no embedded media")]
    UnsupportedImage { target: String },

    /// Dry run: the image is not in the index and was not uploaded.
    #[error("Image {sequence} is not on the wiki and was not uploaded")]
    UnresolvedImage { sequence: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_alt_text_display() {
        let e = Docx2WikiError::MissingAltText { sequence: 3 };
        assert_eq!(e.to_string(), "Abort: Must set ALT text for image 3.");
    }

    #[test]
    fn store_helper_keeps_path() {
        let e = Docx2WikiError::store("/tmp/images", "line 4 is not valid JSON");
        let msg = e.to_string();
        assert!(msg.contains("/tmp/images"), "got: {msg}");
        assert!(msg.contains("line 4"), "got: {msg}");
    }

    #[test]
    fn upload_display() {
        let e = Docx2WikiError::Upload {
            filename: "report_2.png".into(),
            reason: "fileexists-no-change".into(),
        };
        assert!(e.to_string().contains("report_2.png"));
    }

    #[test]
    fn warning_round_trips_through_json() {
        let w = ConversionWarning::MalformedTable { table: 2 };
        let json = serde_json::to_string(&w).unwrap();
        let back: ConversionWarning = serde_json::from_str(&json).unwrap();
        assert_eq!(back, w);
    }
}
