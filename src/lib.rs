//! # docx2wiki
//!
//! Import Word documents (`.docx`) into a MediaWiki site.
//!
//! A document's text becomes wikitext (headings, lists, tables, emphasis,
//! links, Zotero citations), and each embedded image becomes a link to a
//! file on the wiki. Images are matched against the wiki's existing files
//! by a perceptual fingerprint kept in a local index, so an image that is
//! already on the wiki is reused instead of uploaded again.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .docx
//!  │
//!  ├─ 1. Input      validate the path and ZIP magic
//!  ├─ 2. Load       document.xml + rels + styles + numbering → node tree, images
//!  ├─ 3. Reconcile  fingerprint wiki images the index does not know yet
//!  ├─ 4. Dedup      per image: index hit → reuse, else upload (ALT text required)
//!  ├─ 5. Citations  Zotero CSL links → <ref>{{Zotero|…}}</ref>
//!  ├─ 6. Emit       node tree → wikitext
//!  ├─ 7. Polish     whitespace and invisible-character cleanup
//!  └─ 8. Publish    save the page with an "Imported from docx file …" summary
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docx2wiki::{convert_and_publish, ConversionConfig, MediaWikiClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .page_name("Harbour survey")
//!         .build()?;
//!     let client = MediaWikiClient::from_config("https://wiki.example.org/w/api.php", &config)?;
//!     client.login("Importer@docx2wiki", "bot-password").await?;
//!
//!     let result = convert_and_publish("survey.docx", "/home/me/DFM_images", &client, &config).await?;
//!     eprintln!(
//!         "{} images reused, {} uploaded",
//!         result.stats.matched_images, result.stats.uploaded_images
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docx2wiki` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! docx2wiki = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod index;
pub mod mediawiki;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod remote;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert, convert_and_publish, convert_bytes, dump_index, write_output};
pub use document::{EmphasisKind, ImageRef, Node};
pub use error::{ConversionWarning, Docx2WikiError};
pub use index::{FingerprintIndex, FingerprintRecord, IndexMode, ReconcileReport};
pub use mediawiki::MediaWikiClient;
pub use output::{ConversionResult, ConversionStats, Resolution};
pub use pipeline::dedup::{ImageResolver, UploadPolicy};
pub use pipeline::fingerprint::Fingerprint;
pub use pipeline::load::{load_document, ImagePayload, LoadedDocument};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use remote::{OfflineStore, Publisher, RemoteImage, RemoteStore, UploadRequest};
