//! The persistent fingerprint index.
//!
//! ## On-disk format
//!
//! The store lives at `<path>.idx` (the caller passes the path without an
//! extension). Each line is a JSON object `{"remote_id": ..., "fingerprint":
//! ...}`; the file is keyed by remote identifier and only ever appended to.
//! Replaying the lines in order gives the current state: a later line for the
//! same remote identifier or the same fingerprint replaces the earlier one.
//!
//! Opening the store builds the inverted `fingerprint → remote_id` map that
//! [`FingerprintIndex::lookup`] answers from in O(1).
//!
//! ## Scoped acquisition
//!
//! A [`FingerprintIndex`] is opened for one run in either
//! [`IndexMode::ReadOnly`] or [`IndexMode::ReadWrite`]. Every insert is
//! appended and flushed immediately, so an upload that succeeded is on disk
//! before the next image is processed. [`FingerprintIndex::close`] syncs the
//! file; dropping the handle on an error path still flushes it.

use crate::error::Docx2WikiError;
use crate::pipeline::fingerprint::{fingerprint_bytes, Fingerprint};
use crate::progress::ConversionProgressCallback;
use crate::remote::{RemoteImage, RemoteStore};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File suffix appended to the caller's store path.
pub const INDEX_SUFFIX: &str = "idx";

/// Access intent for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Lookups only. The store file must exist.
    ReadOnly,
    /// Lookups and inserts. The store file is created if missing.
    ReadWrite,
}

/// One fingerprint ↔ remote identifier pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintRecord {
    pub fingerprint: Fingerprint,
    pub remote_id: String,
}

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    remote_id: String,
    fingerprint: String,
}

/// Outcome of a successful [`FingerprintIndex::reconcile`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Images listed by the wiki.
    pub listed: usize,
    /// Skipped because the extension is not jpeg/png.
    pub skipped_format: usize,
    /// Skipped because the remote identifier is already indexed.
    pub already_known: usize,
    /// Newly fingerprinted and inserted.
    pub indexed: usize,
}

/// Persistent fingerprint ↔ remote identifier store.
#[derive(Debug)]
pub struct FingerprintIndex {
    path: PathBuf,
    mode: IndexMode,
    by_fingerprint: HashMap<Fingerprint, String>,
    by_remote: HashMap<String, Fingerprint>,
    /// Remote identifiers in first-seen order, for stable dumps.
    order: Vec<String>,
    writer: Option<BufWriter<File>>,
    writes: usize,
}

impl FingerprintIndex {
    /// Open the store at `<base>.idx`.
    ///
    /// # Errors
    /// [`Docx2WikiError::Store`] if the file is missing in read-only mode,
    /// cannot be opened, or contains a line that is not a valid record.
    pub fn open(base: impl AsRef<Path>, mode: IndexMode) -> Result<Self, Docx2WikiError> {
        let path = store_path(base.as_ref());

        let mut index = Self {
            path: path.clone(),
            mode,
            by_fingerprint: HashMap::new(),
            by_remote: HashMap::new(),
            order: Vec::new(),
            writer: None,
            writes: 0,
        };

        match File::open(&path) {
            Ok(file) => index.replay(file)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && mode == IndexMode::ReadWrite => {
                debug!("Creating new fingerprint index at {}", path.display());
            }
            Err(e) => return Err(Docx2WikiError::store(&path, e)),
        }

        if mode == IndexMode::ReadWrite {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| Docx2WikiError::store(&path, e))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| Docx2WikiError::store(&path, e))?;
            index.writer = Some(BufWriter::new(file));
        }

        info!(
            "Opened fingerprint index {} ({} records, {:?})",
            path.display(),
            index.len(),
            mode
        );
        Ok(index)
    }

    /// Open `<base>.idx` read-only, treating a missing file as an empty
    /// index. Nothing is created on disk.
    ///
    /// # Errors
    /// As [`FingerprintIndex::open`], except for a missing file.
    pub fn open_or_empty(base: impl AsRef<Path>) -> Result<Self, Docx2WikiError> {
        let base = base.as_ref();
        let path = store_path(base);
        if path.exists() {
            return Self::open(base, IndexMode::ReadOnly);
        }
        debug!("No fingerprint index at {}; starting empty", path.display());
        Ok(Self {
            path,
            mode: IndexMode::ReadOnly,
            by_fingerprint: HashMap::new(),
            by_remote: HashMap::new(),
            order: Vec::new(),
            writer: None,
            writes: 0,
        })
    }

    fn replay(&mut self, file: File) -> Result<(), Docx2WikiError> {
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| Docx2WikiError::store(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let stored: StoredRecord = serde_json::from_str(&line).map_err(|e| {
                Docx2WikiError::store(&self.path, format!("line {}: {}", lineno + 1, e))
            })?;
            let fingerprint: Fingerprint = stored.fingerprint.parse().map_err(|e| {
                Docx2WikiError::store(&self.path, format!("line {}: {}", lineno + 1, e))
            })?;
            self.apply(fingerprint, stored.remote_id);
        }
        Ok(())
    }

    /// Update both maps; later writes win on either key.
    fn apply(&mut self, fingerprint: Fingerprint, remote_id: String) {
        if let Some(old) = self.by_remote.get(&remote_id).copied() {
            if old != fingerprint && self.by_fingerprint.get(&old) == Some(&remote_id) {
                self.by_fingerprint.remove(&old);
            }
        } else {
            self.order.push(remote_id.clone());
        }
        self.by_remote.insert(remote_id.clone(), fingerprint);
        self.by_fingerprint.insert(fingerprint, remote_id);
    }

    /// Path of the underlying store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> IndexMode {
        self.mode
    }

    /// Number of distinct remote identifiers in the store.
    pub fn len(&self) -> usize {
        self.by_remote.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_remote.is_empty()
    }

    /// Number of records written through this handle.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Remote identifier for a fingerprint, if indexed.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<&str> {
        self.by_fingerprint.get(fingerprint).map(String::as_str)
    }

    /// Whether a remote identifier has ever been fingerprinted.
    pub fn contains_remote(&self, remote_id: &str) -> bool {
        self.by_remote.contains_key(remote_id)
    }

    /// All records keyed by remote identifier, in first-insertion order.
    pub fn records(&self) -> impl Iterator<Item = FingerprintRecord> + '_ {
        self.order.iter().filter_map(|remote_id| {
            self.by_remote.get(remote_id).map(|fp| FingerprintRecord {
                fingerprint: *fp,
                remote_id: remote_id.clone(),
            })
        })
    }

    /// Record that `fingerprint` is stored remotely as `remote_id`.
    ///
    /// Inserting a pair that is already present is a no-op. A different
    /// remote identifier for a known fingerprint replaces the old one.
    pub fn insert(
        &mut self,
        fingerprint: Fingerprint,
        remote_id: impl Into<String>,
    ) -> Result<(), Docx2WikiError> {
        let remote_id = remote_id.into();
        if self.lookup(&fingerprint) == Some(remote_id.as_str())
            && self.by_remote.get(&remote_id) == Some(&fingerprint)
        {
            return Ok(());
        }

        let path = self.path.clone();
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Docx2WikiError::store(&path, "index is open read-only"))?;

        if let Some(previous) = self.by_fingerprint.get(&fingerprint) {
            warn!(
                "Fingerprint {} re-pointed from {} to {}",
                fingerprint, previous, remote_id
            );
        }

        let line = serde_json::to_string(&StoredRecord {
            remote_id: remote_id.clone(),
            fingerprint: fingerprint.to_string(),
        })
        .map_err(|e| Docx2WikiError::store(&path, e))?;
        writeln!(writer, "{line}").map_err(|e| Docx2WikiError::store(&path, e))?;
        writer.flush().map_err(|e| Docx2WikiError::store(&path, e))?;

        self.writes += 1;
        self.apply(fingerprint, remote_id);
        Ok(())
    }

    /// Fingerprint every wiki image that is not indexed yet.
    ///
    /// Non-raster titles are skipped. A failed download or an undecodable
    /// image aborts the pass before anything is written, so the index never
    /// holds half of a reconciliation.
    pub async fn reconcile<S: RemoteStore>(
        &mut self,
        store: &S,
        progress: &dyn ConversionProgressCallback,
    ) -> Result<ReconcileReport, Docx2WikiError> {
        if self.mode != IndexMode::ReadWrite {
            return Err(Docx2WikiError::store(
                &self.path,
                "reconciliation requires a read-write index",
            ));
        }

        let inventory = store.list_images().await?;
        progress.on_reconcile_start(inventory.len());
        info!("Wiki lists {} images", inventory.len());

        let mut report = ReconcileReport {
            listed: inventory.len(),
            ..Default::default()
        };
        let mut staged: Vec<(Fingerprint, String)> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for image in &inventory {
            if !image.is_raster() {
                report.skipped_format += 1;
                progress.on_asset_processed(&image.title, None);
                continue;
            }
            if self.contains_remote(&image.title) || !seen.insert(image.title.as_str()) {
                report.already_known += 1;
                progress.on_asset_processed(&image.title, None);
                continue;
            }

            debug!("Not in index: {}", image.title);
            let fingerprint = fingerprint_remote(store, image).await?;
            debug!("{} → {}", image.title, fingerprint);
            progress.on_asset_processed(&image.title, Some(&fingerprint.to_string()));
            staged.push((fingerprint, image.title.clone()));
        }

        for (fingerprint, title) in staged {
            self.insert(fingerprint, title)?;
            report.indexed += 1;
        }

        info!(
            "Reconciled index: {} new, {} known, {} non-raster",
            report.indexed, report.already_known, report.skipped_format
        );
        progress.on_reconcile_complete(&report);
        Ok(report)
    }

    /// Flush and sync the store file.
    pub fn close(mut self) -> Result<(), Docx2WikiError> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| Docx2WikiError::store(&self.path, e))?;
            writer
                .get_ref()
                .sync_all()
                .map_err(|e| Docx2WikiError::store(&self.path, e))?;
        }
        debug!("Closed fingerprint index {}", self.path.display());
        Ok(())
    }
}

impl Drop for FingerprintIndex {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                warn!("Failed to flush {}: {}", self.path.display(), e);
            }
        }
    }
}

/// `<base>.idx`
pub fn store_path(base: &Path) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(INDEX_SUFFIX);
    PathBuf::from(name)
}

async fn fingerprint_remote<S: RemoteStore>(
    store: &S,
    image: &RemoteImage,
) -> Result<Fingerprint, Docx2WikiError> {
    let bytes = store.download(image).await?;
    let title = image.title.clone();
    tokio::task::spawn_blocking(move || fingerprint_bytes(&bytes))
        .await
        .map_err(|e| Docx2WikiError::Internal(format!("Hash task panicked: {}", e)))?
        .map_err(|e| Docx2WikiError::Fingerprint {
            subject: title,
            detail: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgressCallback;
    use crate::remote::UploadRequest;
    use image::{DynamicImage, GrayImage, Luma};
    use std::io::Cursor;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn fp(bits: u64) -> Fingerprint {
        Fingerprint::from_bits(bits)
    }

    fn png(seed: u32) -> Vec<u8> {
        let img = DynamicImage::ImageLuma8(GrayImage::from_fn(32, 32, |x, y| {
            Luma([((x * seed + y * 7) % 251) as u8])
        }));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    struct FakeWiki {
        images: Vec<RemoteImage>,
        files: HashMap<String, Vec<u8>>,
        downloads: Mutex<Vec<String>>,
    }

    impl FakeWiki {
        fn new(entries: Vec<(&str, Vec<u8>)>) -> Self {
            let images = entries
                .iter()
                .map(|(title, _)| RemoteImage {
                    title: title.to_string(),
                    download_url: format!("https://wiki.test/{title}"),
                })
                .collect();
            let files = entries
                .into_iter()
                .map(|(title, bytes)| (title.to_string(), bytes))
                .collect();
            Self {
                images,
                files,
                downloads: Mutex::new(Vec::new()),
            }
        }
    }

    impl RemoteStore for FakeWiki {
        async fn list_images(&self) -> Result<Vec<RemoteImage>, Docx2WikiError> {
            Ok(self.images.clone())
        }

        async fn download(&self, image: &RemoteImage) -> Result<Vec<u8>, Docx2WikiError> {
            self.downloads.lock().unwrap().push(image.title.clone());
            self.files
                .get(&image.title)
                .cloned()
                .ok_or_else(|| Docx2WikiError::Download {
                    title: image.title.clone(),
                    reason: "404".into(),
                })
        }

        async fn upload(&self, _request: UploadRequest<'_>) -> Result<String, Docx2WikiError> {
            unreachable!("reconcile never uploads")
        }
    }

    #[test]
    fn read_only_open_of_missing_store_fails() {
        let dir = TempDir::new().unwrap();
        let err = FingerprintIndex::open(dir.path().join("images"), IndexMode::ReadOnly)
            .unwrap_err();
        assert!(matches!(err, Docx2WikiError::Store { .. }));
    }

    #[test]
    fn open_or_empty_tolerates_missing_store() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("fresh");
        let index = FingerprintIndex::open_or_empty(&base).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.mode(), IndexMode::ReadOnly);
        assert!(!store_path(&base).exists());
    }

    #[test]
    fn open_or_empty_reads_existing_store() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("images");
        {
            let mut index = FingerprintIndex::open(&base, IndexMode::ReadWrite).unwrap();
            index.insert(fp(0xAB), "File:A.png").unwrap();
            index.close().unwrap();
        }
        let mut index = FingerprintIndex::open_or_empty(&base).unwrap();
        assert_eq!(index.lookup(&fp(0xAB)), Some("File:A.png"));
        assert!(index.insert(fp(0xCD), "File:B.png").is_err());
    }

    #[test]
    fn insert_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("images");

        let mut index = FingerprintIndex::open(&base, IndexMode::ReadWrite).unwrap();
        index.insert(fp(0xabc123), "File:Existing.png").unwrap();
        index.close().unwrap();

        let index = FingerprintIndex::open(&base, IndexMode::ReadOnly).unwrap();
        assert_eq!(index.lookup(&fp(0xabc123)), Some("File:Existing.png"));
        assert!(index.path().ends_with("images.idx"));
    }

    #[test]
    fn insert_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut index = FingerprintIndex::open(dir.path().join("db"), IndexMode::ReadWrite).unwrap();

        index.insert(fp(1), "File:A.png").unwrap();
        index.insert(fp(1), "File:A.png").unwrap();

        assert_eq!(index.lookup(&fp(1)), Some("File:A.png"));
        assert_eq!(index.writes(), 1);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn later_insert_wins_for_same_fingerprint() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("db");
        let mut index = FingerprintIndex::open(&base, IndexMode::ReadWrite).unwrap();
        index.insert(fp(7), "File:Old.png").unwrap();
        index.insert(fp(7), "File:New.png").unwrap();
        assert_eq!(index.lookup(&fp(7)), Some("File:New.png"));
        drop(index);

        let index = FingerprintIndex::open(&base, IndexMode::ReadOnly).unwrap();
        assert_eq!(index.lookup(&fp(7)), Some("File:New.png"));
        // The old remote id is still recorded, just no longer the answer.
        assert!(index.contains_remote("File:Old.png"));
    }

    #[test]
    fn re_fingerprinted_remote_drops_stale_mapping() {
        let dir = TempDir::new().unwrap();
        let mut index = FingerprintIndex::open(dir.path().join("db"), IndexMode::ReadWrite).unwrap();
        index.insert(fp(1), "File:A.png").unwrap();
        index.insert(fp(2), "File:A.png").unwrap();
        assert_eq!(index.lookup(&fp(1)), None);
        assert_eq!(index.lookup(&fp(2)), Some("File:A.png"));
    }

    #[test]
    fn read_only_rejects_insert() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("db");
        FingerprintIndex::open(&base, IndexMode::ReadWrite)
            .unwrap()
            .close()
            .unwrap();

        let mut index = FingerprintIndex::open(&base, IndexMode::ReadOnly).unwrap();
        assert!(index.insert(fp(1), "File:A.png").is_err());
        assert_eq!(index.lookup(&fp(1)), None);
    }

    #[test]
    fn corrupt_line_is_a_store_error() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("db");
        std::fs::write(
            store_path(&base),
            "{\"remote_id\":\"File:A.png\",\"fingerprint\":\"00000000000000ff\"}\nnot json\n",
        )
        .unwrap();

        let err = FingerprintIndex::open(&base, IndexMode::ReadOnly).unwrap_err();
        assert!(err.to_string().contains("line 2"), "got: {err}");
    }

    #[test]
    fn records_come_back_in_insertion_order() {
        let dir = TempDir::new().unwrap();
        let mut index = FingerprintIndex::open(dir.path().join("db"), IndexMode::ReadWrite).unwrap();
        index.insert(fp(3), "File:C.png").unwrap();
        index.insert(fp(1), "File:A.png").unwrap();
        let ids: Vec<String> = index.records().map(|r| r.remote_id).collect();
        assert_eq!(ids, vec!["File:C.png", "File:A.png"]);
    }

    #[tokio::test]
    async fn reconcile_indexes_unknown_raster_images() {
        let dir = TempDir::new().unwrap();
        let mut index = FingerprintIndex::open(dir.path().join("db"), IndexMode::ReadWrite).unwrap();
        let known = png(3);
        index
            .insert(fingerprint_bytes(&known).unwrap(), "File:Known.png")
            .unwrap();

        let wiki = FakeWiki::new(vec![
            ("File:Known.png", known),
            ("File:New.JPG", png(5)),
            ("File:Logo.svg", b"<svg/>".to_vec()),
        ]);
        // The JPG title carries PNG bytes; decoding sniffs the content.
        let report = index.reconcile(&wiki, &NoopProgressCallback).await.unwrap();

        assert_eq!(
            report,
            ReconcileReport {
                listed: 3,
                skipped_format: 1,
                already_known: 1,
                indexed: 1,
            }
        );
        assert_eq!(*wiki.downloads.lock().unwrap(), vec!["File:New.JPG"]);
        let new_fp = fingerprint_bytes(&png(5)).unwrap();
        assert_eq!(index.lookup(&new_fp), Some("File:New.JPG"));
    }

    #[tokio::test]
    async fn reconcile_is_all_or_nothing() {
        let dir = TempDir::new().unwrap();
        let mut index = FingerprintIndex::open(dir.path().join("db"), IndexMode::ReadWrite).unwrap();

        let wiki = FakeWiki::new(vec![
            ("File:Good.png", png(5)),
            ("File:Broken.png", b"truncated".to_vec()),
        ]);
        let err = index
            .reconcile(&wiki, &NoopProgressCallback)
            .await
            .unwrap_err();

        assert!(matches!(err, Docx2WikiError::Fingerprint { .. }));
        assert!(index.is_empty());
        assert_eq!(index.writes(), 0);
    }

    #[tokio::test]
    async fn reconcile_requires_read_write() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("db");
        FingerprintIndex::open(&base, IndexMode::ReadWrite)
            .unwrap()
            .close()
            .unwrap();
        let mut index = FingerprintIndex::open(&base, IndexMode::ReadOnly).unwrap();
        let wiki = FakeWiki::new(vec![]);
        assert!(index.reconcile(&wiki, &NoopProgressCallback).await.is_err());
    }
}
