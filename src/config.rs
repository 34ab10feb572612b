//! Configuration types for docx-to-wikitext conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The wiki connection itself is not
//! configured here: callers hand a [`crate::remote::RemoteStore`] and a
//! [`crate::remote::Publisher`] to the `convert*` functions.

use crate::error::Docx2WikiError;
use crate::pipeline::dedup::UploadPolicy;
use crate::progress::{ConversionProgressCallback, ProgressCallback};
use std::fmt;
use std::sync::Arc;

/// Characters MediaWiki does not allow in file titles.
const ILLEGAL_TITLE_CHARS: &[char] = &['#', '<', '>', '[', ']', '|', '{', '}', '/', ':'];

/// Configuration for a docx-to-wikitext conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use docx2wiki::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .page_name("Harbour survey")
///     .dry_run(true)
///     .reconcile(false)
///     .build()
///     .unwrap();
/// assert!(config.dry_run);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Wiki page the converted text is saved to. Required for publishing.
    pub page_name: Option<String>,

    /// Convert without uploading images or saving the page. Default: false.
    ///
    /// Images missing from the index are left unresolved and rendered as a
    /// comment placeholder; the index is opened read-only.
    pub dry_run: bool,

    /// Fingerprint wiki images missing from the index before converting.
    /// Default: true.
    ///
    /// Every unindexed jpeg/png on the wiki is downloaded once. Turn it off
    /// when the index is known to be current.
    pub reconcile: bool,

    /// Prefix of uploaded file names (`<base>_<n>.<ext>`). Default: the input
    /// file name without its extension.
    pub upload_base: Option<String>,

    /// Edit summary used when saving the page. Default:
    /// `Imported from docx file <basename>`.
    pub summary: Option<String>,

    /// Rewrite Zotero citation links and drop the transfer notices. Default: true.
    pub resolve_citations: bool,

    /// Per-request timeout for the wiki API in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Optional progress callback invoked during reconciliation and image
    /// resolution.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            page_name: None,
            dry_run: false,
            reconcile: true,
            upload_base: None,
            summary: None,
            resolve_citations: true,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("page_name", &self.page_name)
            .field("dry_run", &self.dry_run)
            .field("reconcile", &self.reconcile)
            .field("upload_base", &self.upload_base)
            .field("summary", &self.summary)
            .field("resolve_citations", &self.resolve_citations)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        if self.dry_run {
            UploadPolicy::DryRun
        } else {
            UploadPolicy::Upload
        }
    }

    /// Edit summary for a document with the given file name.
    pub fn summary_for(&self, file_name: &str) -> String {
        self.summary
            .clone()
            .unwrap_or_else(|| format!("Imported from docx file {}", file_name))
    }

    pub(crate) fn progress(&self) -> Arc<dyn ConversionProgressCallback> {
        self.progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(crate::progress::NoopProgressCallback))
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn page_name(mut self, name: impl Into<String>) -> Self {
        self.config.page_name = Some(name.into());
        self
    }

    pub fn dry_run(mut self, v: bool) -> Self {
        self.config.dry_run = v;
        self
    }

    pub fn reconcile(mut self, v: bool) -> Self {
        self.config.reconcile = v;
        self
    }

    pub fn upload_base(mut self, base: impl Into<String>) -> Self {
        self.config.upload_base = Some(base.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.config.summary = Some(summary.into());
        self
    }

    pub fn resolve_citations(mut self, v: bool) -> Self {
        self.config.resolve_citations = v;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Docx2WikiError> {
        let c = &self.config;
        if let Some(page) = &c.page_name {
            if page.trim().is_empty() {
                return Err(Docx2WikiError::InvalidConfig(
                    "Page name must not be empty".into(),
                ));
            }
        }
        if let Some(base) = &c.upload_base {
            if base.trim().is_empty() {
                return Err(Docx2WikiError::InvalidConfig(
                    "Upload base name must not be empty".into(),
                ));
            }
            if let Some(bad) = base.chars().find(|ch| ILLEGAL_TITLE_CHARS.contains(ch)) {
                return Err(Docx2WikiError::InvalidConfig(format!(
                    "Upload base name '{}' contains '{}', which is not allowed in file titles",
                    base, bad
                )));
            }
        }
        if c.api_timeout_secs == 0 {
            return Err(Docx2WikiError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConversionConfig::default();
        assert!(!config.dry_run);
        assert!(config.reconcile);
        assert!(config.resolve_citations);
        assert_eq!(config.upload_policy(), UploadPolicy::Upload);
        assert_eq!(
            config.summary_for("report.docx"),
            "Imported from docx file report.docx"
        );
    }

    #[test]
    fn dry_run_maps_to_policy() {
        let config = ConversionConfig::builder().dry_run(true).build().unwrap();
        assert_eq!(config.upload_policy(), UploadPolicy::DryRun);
    }

    #[test]
    fn rejects_bad_upload_base() {
        let err = ConversionConfig::builder()
            .upload_base("a/b")
            .build()
            .unwrap_err();
        assert!(matches!(err, Docx2WikiError::InvalidConfig(_)));
        assert!(ConversionConfig::builder().upload_base("  ").build().is_err());
        assert!(ConversionConfig::builder().upload_base("Report 2024").build().is_ok());
    }

    #[test]
    fn rejects_empty_page_and_zero_timeout() {
        assert!(ConversionConfig::builder().page_name("").build().is_err());
        assert!(ConversionConfig::builder().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn custom_summary_wins() {
        let config = ConversionConfig::builder()
            .summary("Re-import")
            .build()
            .unwrap();
        assert_eq!(config.summary_for("x.docx"), "Re-import");
    }

    #[test]
    fn debug_hides_callback() {
        let config = ConversionConfig::builder()
            .progress_callback(Arc::new(crate::progress::NoopProgressCallback))
            .build()
            .unwrap();
        let dbg = format!("{:?}", config);
        assert!(dbg.contains("<dyn ConversionProgressCallback>"));
    }
}
