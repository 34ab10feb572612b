//! Boundaries to the remote wiki.
//!
//! The pipeline never talks HTTP itself. Everything it needs from the wiki
//! goes through two traits: [`RemoteStore`] (inventory, download, upload)
//! and [`Publisher`] (save the converted page). [`crate::mediawiki`] ships an
//! implementation of both; tests substitute in-memory fakes.

use crate::error::Docx2WikiError;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// An image known to the wiki.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteImage {
    /// Remote identifier, e.g. `File:Harbour map.png`.
    pub title: String,
    pub download_url: String,
}

impl RemoteImage {
    /// Whether the title carries a raster extension that can be fingerprinted.
    pub fn is_raster(&self) -> bool {
        let ext = self
            .title
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        matches!(ext.as_str(), "jpeg" | "jpg" | "png")
    }
}

/// Everything the upload collaborator needs to create a new file page.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub bytes: &'a [u8],
    pub content_type: &'a str,
    /// Human-authored description (the image's ALT text).
    pub description: &'a str,
    /// Suggested file name, e.g. `report_3.png`.
    pub filename: &'a str,
    /// Upload under `filename` rather than letting the wiki pick a name.
    pub keep_original_filename: bool,
}

/// The wiki's media repository.
pub trait RemoteStore {
    /// All raster and non-raster images currently on the wiki.
    fn list_images(&self) -> impl Future<Output = Result<Vec<RemoteImage>, Docx2WikiError>> + Send;

    /// Download one image's original bytes.
    fn download(
        &self,
        image: &RemoteImage,
    ) -> impl Future<Output = Result<Vec<u8>, Docx2WikiError>> + Send;

    /// Upload a new file and return its remote identifier.
    fn upload(
        &self,
        request: UploadRequest<'_>,
    ) -> impl Future<Output = Result<String, Docx2WikiError>> + Send;
}

/// Saves converted wikitext to a page.
pub trait Publisher {
    fn publish(
        &self,
        page: &str,
        text: &str,
        summary: &str,
    ) -> impl Future<Output = Result<(), Docx2WikiError>> + Send;
}

/// Stand-in for a wiki when none is configured, as in an offline dry run.
/// Every call fails with [`Docx2WikiError::Remote`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineStore;

impl OfflineStore {
    fn unavailable() -> Docx2WikiError {
        Docx2WikiError::Remote("no wiki configured".into())
    }
}

impl RemoteStore for OfflineStore {
    async fn list_images(&self) -> Result<Vec<RemoteImage>, Docx2WikiError> {
        Err(Self::unavailable())
    }

    async fn download(&self, _image: &RemoteImage) -> Result<Vec<u8>, Docx2WikiError> {
        Err(Self::unavailable())
    }

    async fn upload(&self, _request: UploadRequest<'_>) -> Result<String, Docx2WikiError> {
        Err(Self::unavailable())
    }
}

impl Publisher for OfflineStore {
    async fn publish(&self, _page: &str, _text: &str, _summary: &str) -> Result<(), Docx2WikiError> {
        Err(Self::unavailable())
    }
}
