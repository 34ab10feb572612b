//! Conversion entry points.
//!
//! [`convert_bytes`] is the core: it runs every pipeline stage over an
//! in-memory `.docx` against an index handle and a remote store supplied by
//! the caller. [`convert`] adds input validation, and [`convert_and_publish`]
//! owns the whole run the way the CLI needs it: open the index in the right
//! mode, convert, close the index, save the page.
//!
//! Any fatal error aborts before the page is saved, so a wiki page never
//! receives half a document.

use crate::config::ConversionConfig;
use crate::document::{walk_body_mut, Node};
use crate::error::{ConversionWarning, Docx2WikiError};
use crate::index::{FingerprintIndex, FingerprintRecord, IndexMode};
use crate::output::{ConversionResult, ConversionStats, Resolution};
use crate::pipeline::dedup::{ImageResolver, UploadPolicy};
use crate::pipeline::{citations, input, load, postprocess, wikitext};
use crate::remote::{Publisher, RemoteStore};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a `.docx` file to wikitext.
///
/// Images are resolved against `index` and, when allowed by the config,
/// uploaded to `store`. The page itself is not saved; see
/// [`convert_and_publish`].
///
/// # Errors
/// Returns `Err(Docx2WikiError)` only for fatal errors:
/// - File not found / permission denied / not a `.docx`
/// - Malformed container or document XML
/// - An image with no index match and no ALT text
/// - A failed upload, download or index write
pub async fn convert<S: RemoteStore>(
    input_path: impl AsRef<Path>,
    index: &mut FingerprintIndex,
    store: &S,
    config: &ConversionConfig,
) -> Result<ConversionResult, Docx2WikiError> {
    let resolved = input::resolve_input(input_path).await?;
    let base = config
        .upload_base
        .clone()
        .unwrap_or_else(|| resolved.stem());
    convert_bytes(resolved.bytes, &base, index, store, config).await
}

/// Convert in-memory `.docx` bytes to wikitext.
///
/// `upload_base` names uploaded files (`<upload_base>_<n>.<ext>`).
pub async fn convert_bytes<S: RemoteStore>(
    bytes: Vec<u8>,
    upload_base: &str,
    index: &mut FingerprintIndex,
    store: &S,
    config: &ConversionConfig,
) -> Result<ConversionResult, Docx2WikiError> {
    let total_start = Instant::now();
    let progress = config.progress();
    info!("Starting conversion ({} bytes)", bytes.len());

    // ── Step 1: Load the document ────────────────────────────────────────
    let load_start = Instant::now();
    let loaded = tokio::task::spawn_blocking(move || load::load_document(&bytes))
        .await
        .map_err(|e| Docx2WikiError::Internal(format!("Load task panicked: {}", e)))??;
    let load_duration_ms = load_start.elapsed().as_millis() as u64;
    let load::LoadedDocument {
        mut body,
        images,
        mut warnings,
    } = loaded;

    // ── Step 2: Bring the index up to date ───────────────────────────────
    let policy = config.upload_policy();
    if config.reconcile {
        if index.mode() == IndexMode::ReadWrite {
            index.reconcile(store, progress.as_ref()).await?;
        } else {
            info!("Index is read-only; skipping reconciliation");
        }
    }

    // ── Step 3: Resolve images ───────────────────────────────────────────
    let image_start = Instant::now();
    let total_images = images.len();
    let mut resolved_images = BTreeMap::new();
    let mut unresolved_images = Vec::new();
    let mut uploaded_images = Vec::new();

    let dedup_stats = {
        let mut resolver = ImageResolver::new(index, store, upload_base, policy);
        for payload in images {
            let sequence = payload.sequence_number;
            progress.on_image_start(sequence, total_images);
            let resolution = resolver.resolve(payload).await?;
            match &resolution {
                Resolution::Existing(id) => {
                    resolved_images.insert(sequence, id.clone());
                }
                Resolution::Uploaded(id) => {
                    resolved_images.insert(sequence, id.clone());
                    uploaded_images.push(sequence);
                }
                Resolution::Pending => {
                    warn!("Image {} is not on the wiki and was not uploaded", sequence);
                    unresolved_images.push(sequence);
                    warnings.push(ConversionWarning::UnresolvedImage { sequence });
                }
            }
            progress.on_image_resolved(sequence, &resolution);
        }
        resolver.stats()
    };
    let image_duration_ms = image_start.elapsed().as_millis() as u64;
    debug!("Image resolution: {:?}", dedup_stats);

    attach_remote_ids(&mut body, &resolved_images);

    // ── Step 4: Citations ────────────────────────────────────────────────
    let mut citations_resolved = 0;
    if config.resolve_citations {
        citations::remove_transfer_notices(&mut body);
        warnings.extend(citations::resolve_citations(&mut body));
        citations_resolved = count_nodes(&mut body, |n| {
            matches!(n, Node::Link { is_citation: true, .. })
        });
    }

    // ── Step 5: Emit and clean wikitext ──────────────────────────────────
    let tables = count_nodes(&mut body, |n| matches!(n, Node::Table { .. }));
    let (raw, render_warnings) = wikitext::render_wikitext(&body);
    warnings.extend(render_warnings);
    let markup = postprocess::clean_wikitext(&raw);

    let stats = ConversionStats {
        total_images,
        matched_images: dedup_stats.matched,
        uploaded_images: dedup_stats.uploaded,
        unresolved_images: dedup_stats.pending,
        citations_resolved,
        tables,
        load_duration_ms,
        image_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Conversion complete: {} images ({} matched, {} uploaded, {} unresolved), {} citations, {} warnings, {}ms",
        stats.total_images,
        stats.matched_images,
        stats.uploaded_images,
        stats.unresolved_images,
        stats.citations_resolved,
        warnings.len(),
        stats.total_duration_ms
    );

    Ok(ConversionResult {
        markup,
        resolved_images,
        unresolved_images,
        uploaded_images,
        warnings,
        stats,
    })
}

/// Run a whole import: convert against the index at `<index_base>.idx` and
/// save the page, unless the config asks for a dry run.
///
/// The index is opened read-write for real runs and read-only for dry runs
/// (a missing index then counts as empty), and is closed before the page is
/// saved.
pub async fn convert_and_publish<C: RemoteStore + Publisher>(
    input_path: impl AsRef<Path>,
    index_base: impl AsRef<Path>,
    client: &C,
    config: &ConversionConfig,
) -> Result<ConversionResult, Docx2WikiError> {
    let input_path = input_path.as_ref();
    let page = match (&config.page_name, config.dry_run) {
        (Some(page), _) => Some(page.as_str()),
        (None, true) => None,
        (None, false) => {
            return Err(Docx2WikiError::InvalidConfig(
                "A page name is required unless this is a dry run".into(),
            ))
        }
    };

    // A dry run on a machine without an index still converts; every image
    // then comes back pending.
    let mut index = match config.upload_policy() {
        UploadPolicy::Upload => FingerprintIndex::open(index_base, IndexMode::ReadWrite)?,
        UploadPolicy::DryRun => FingerprintIndex::open_or_empty(index_base)?,
    };
    let result = convert(input_path, &mut index, client, config).await?;
    index.close()?;

    match page {
        Some(page) if !config.dry_run => {
            let summary = config.summary_for(&input::file_name(input_path));
            client.publish(page, &result.markup, &summary).await?;
        }
        _ => info!("Dry run: page not saved"),
    }
    Ok(result)
}

/// Write converted wikitext to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_output(path: impl AsRef<Path>, markup: &str) -> Result<(), Docx2WikiError> {
    let path = path.as_ref();
    let fail = |e: std::io::Error| Docx2WikiError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    let tmp_path = path.with_extension("wiki.tmp");
    tokio::fs::write(&tmp_path, markup).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    Ok(())
}

/// All records of the index at `<index_base>.idx`, in insertion order.
pub fn dump_index(index_base: impl AsRef<Path>) -> Result<Vec<FingerprintRecord>, Docx2WikiError> {
    let index = FingerprintIndex::open(index_base, IndexMode::ReadOnly)?;
    Ok(index.records().collect())
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn attach_remote_ids(body: &mut [Node], resolved: &BTreeMap<u32, String>) {
    walk_body_mut(body, &mut |node| {
        if let Node::Image(image) = node {
            image.remote_id = resolved.get(&image.sequence_number).cloned();
        }
    });
}

fn count_nodes(body: &mut [Node], pred: impl Fn(&Node) -> bool) -> usize {
    let mut count = 0;
    walk_body_mut(body, &mut |node| {
        if pred(&*node) {
            count += 1;
        }
    });
    count
}
