//! Pipeline stages for docx-to-wikitext conversion.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//!                 ┌──▶ fingerprint ──▶ dedup ──────────────┐
//! input ──▶ load ─┤     (dHash)       (index/upload)       ├──▶ wikitext ──▶ postprocess
//! (path)   (zip)  └──▶ citations ──────────────────────────┘    (emit)        (cleanup)
//! ```
//!
//! 1. [`input`]       — validate the user-supplied path and read the bytes
//! 2. [`load`]        — unpack the `.docx` into a node tree and image payloads
//! 3. [`fingerprint`] — 64-bit difference hash of an image; CPU-bound, so
//!    callers run it in `spawn_blocking`
//! 4. [`dedup`]       — match each image against the index, upload the rest;
//!    the only stage with network I/O
//! 5. [`citations`]   — rewrite Zotero citation links into `<ref>` markup
//! 6. [`wikitext`]    — emit MediaWiki markup from the tree
//! 7. [`postprocess`] — deterministic whitespace and invisible-character cleanup

pub mod citations;
pub mod dedup;
pub mod fingerprint;
pub mod input;
pub mod load;
pub mod postprocess;
pub mod wikitext;
