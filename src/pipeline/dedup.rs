//! Image deduplication: match each embedded image against the fingerprint
//! index and upload only what the wiki does not already have.
//!
//! [`ImageResolver`] holds everything one run needs (the index handle, the
//! remote store, the filename base, the upload policy) and is driven once
//! per image in document order. Decision order for an image:
//!
//! 1. fingerprint it (on the blocking pool);
//! 2. exact index hit → [`Resolution::Existing`], nothing else happens;
//! 3. no ALT text → [`Docx2WikiError::MissingAltText`], before any upload;
//! 4. dry run → [`Resolution::Pending`];
//! 5. upload as `<base>_<n>.<ext>`, record the pair in the index, and
//!    return [`Resolution::Uploaded`].

use crate::error::Docx2WikiError;
use crate::index::FingerprintIndex;
use crate::output::Resolution;
use crate::pipeline::fingerprint::{fingerprint_bytes, Fingerprint};
use crate::pipeline::load::ImagePayload;
use crate::remote::{RemoteStore, UploadRequest};
use tracing::{debug, info};

/// What to do with images the index does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadPolicy {
    /// Upload them and record the new fingerprints.
    #[default]
    Upload,
    /// Leave them unresolved; never touch the wiki or the index.
    DryRun,
}

/// Counters kept across one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub matched: usize,
    pub uploaded: usize,
    pub pending: usize,
}

/// Resolves embedded images to remote identifiers.
pub struct ImageResolver<'a, S> {
    index: &'a mut FingerprintIndex,
    store: &'a S,
    upload_base: String,
    policy: UploadPolicy,
    stats: DedupStats,
}

impl<'a, S: RemoteStore> ImageResolver<'a, S> {
    pub fn new(
        index: &'a mut FingerprintIndex,
        store: &'a S,
        upload_base: impl Into<String>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            index,
            store,
            upload_base: upload_base.into(),
            policy,
            stats: DedupStats::default(),
        }
    }

    pub fn stats(&self) -> DedupStats {
        self.stats
    }

    /// Resolve one image. Consumes the payload.
    ///
    /// # Errors
    /// * [`Docx2WikiError::Fingerprint`] if the bytes cannot be decoded.
    /// * [`Docx2WikiError::MissingAltText`] for an unknown image with no ALT
    ///   text; nothing has been uploaded or written for it.
    /// * [`Docx2WikiError::Upload`] / [`Docx2WikiError::Store`] if the
    ///   upload or the index write fails.
    pub async fn resolve(&mut self, payload: ImagePayload) -> Result<Resolution, Docx2WikiError> {
        let sequence = payload.sequence_number;
        let fingerprint = self.fingerprint(&payload).await?;
        debug!("Image {} fingerprint {}", sequence, fingerprint);

        if let Some(remote_id) = self.index.lookup(&fingerprint) {
            debug!("Image {} already on the wiki as {}", sequence, remote_id);
            self.stats.matched += 1;
            return Ok(Resolution::Existing(remote_id.to_string()));
        }

        let alt_text = match payload.alt_text.as_deref() {
            Some(alt) if !alt.trim().is_empty() => alt,
            _ => return Err(Docx2WikiError::MissingAltText { sequence }),
        };

        if self.policy == UploadPolicy::DryRun {
            debug!("Image {} would be uploaded (dry run)", sequence);
            self.stats.pending += 1;
            return Ok(Resolution::Pending);
        }

        let filename = format!("{}_{}.{}", self.upload_base, sequence, payload.extension());
        let remote_id = self
            .store
            .upload(UploadRequest {
                bytes: &payload.raw_bytes,
                content_type: &payload.content_type,
                description: alt_text,
                filename: &filename,
                keep_original_filename: true,
            })
            .await?;
        info!("Uploaded image {} as {}", sequence, remote_id);

        self.index.insert(fingerprint, remote_id.clone())?;
        self.stats.uploaded += 1;
        Ok(Resolution::Uploaded(remote_id))
    }

    async fn fingerprint(&self, payload: &ImagePayload) -> Result<Fingerprint, Docx2WikiError> {
        let bytes = payload.raw_bytes.clone();
        let subject = format!("image {}", payload.sequence_number);
        tokio::task::spawn_blocking(move || fingerprint_bytes(&bytes))
            .await
            .map_err(|e| Docx2WikiError::Internal(format!("Hash task panicked: {}", e)))?
            .map_err(|e| Docx2WikiError::Fingerprint {
                subject,
                detail: e.to_string(),
            })
    }
}
