//! Progress-callback trait for reconciliation and image events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events while the wiki inventory is fingerprinted and while each embedded
//! image is matched or uploaded. Reconciling a large wiki downloads every
//! unindexed image once, which can take a long time; these events are what
//! a terminal progress bar hangs off.
//!
//! # Example
//!
//! ```rust
//! use docx2wiki::{ConversionProgressCallback, ConversionConfig, Resolution};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct UploadCounter {
//!     uploads: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for UploadCounter {
//!     fn on_image_resolved(&self, sequence: u32, resolution: &Resolution) {
//!         if matches!(resolution, Resolution::Uploaded(_)) {
//!             self.uploads.fetch_add(1, Ordering::SeqCst);
//!             eprintln!("uploaded image {sequence}");
//!         }
//!     }
//! }
//!
//! let counter = Arc::new(UploadCounter { uploads: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::index::ReconcileReport;
use crate::output::Resolution;
use std::sync::Arc;

/// Called by the pipeline as it reconciles the index and resolves images.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once the remote inventory has been listed.
    ///
    /// # Arguments
    /// * `total_assets` — number of images listed by the wiki
    fn on_reconcile_start(&self, total_assets: usize) {
        let _ = total_assets;
    }

    /// Called for every listed asset, whether it was fingerprinted or skipped.
    ///
    /// # Arguments
    /// * `title`       — remote identifier of the asset
    /// * `fingerprint` — the new fingerprint, `None` when the asset was skipped
    fn on_asset_processed(&self, title: &str, fingerprint: Option<&str>) {
        let _ = (title, fingerprint);
    }

    /// Called after a successful reconciliation pass.
    fn on_reconcile_complete(&self, report: &ReconcileReport) {
        let _ = report;
    }

    /// Called before an embedded image is fingerprinted.
    ///
    /// # Arguments
    /// * `sequence`     — 1-indexed image number in document order
    /// * `total_images` — images embedded in the document
    fn on_image_start(&self, sequence: u32, total_images: usize) {
        let _ = (sequence, total_images);
    }

    /// Called when an image has been matched, uploaded or left pending.
    fn on_image_resolved(&self, sequence: u32, resolution: &Resolution) {
        let _ = (sequence, resolution);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        assets: AtomicUsize,
        skipped: AtomicUsize,
        uploads: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_asset_processed(&self, _title: &str, fingerprint: Option<&str>) {
            self.assets.fetch_add(1, Ordering::SeqCst);
            if fingerprint.is_none() {
                self.skipped.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_image_resolved(&self, _sequence: u32, resolution: &Resolution) {
            if matches!(resolution, Resolution::Uploaded(_)) {
                self.uploads.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_reconcile_start(5);
        cb.on_asset_processed("File:A.png", Some("00000000000000ff"));
        cb.on_reconcile_complete(&ReconcileReport::default());
        cb.on_image_start(1, 2);
        cb.on_image_resolved(1, &Resolution::Pending);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            assets: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
        };

        tracker.on_asset_processed("File:A.png", Some("00000000000000ff"));
        tracker.on_asset_processed("File:B.svg", None);
        tracker.on_image_resolved(1, &Resolution::Existing("File:A.png".into()));
        tracker.on_image_resolved(2, &Resolution::Uploaded("File:doc_2.png".into()));

        assert_eq!(tracker.assets.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.uploads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn ConversionProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_image_start(1, 1);
        cb.on_image_resolved(1, &Resolution::Existing("File:X.png".into()));
    }
}
