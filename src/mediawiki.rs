//! MediaWiki Action API client.
//!
//! Implements [`RemoteStore`] and [`Publisher`] over `api.php` with a cookie
//! session:
//!
//! * `action=login` with a bot password (`User@botname` + generated secret);
//! * `list=allimages` with `continue` paging for the inventory;
//! * plain `GET` of each image's original URL for downloads;
//! * multipart `action=upload` without `ignorewarnings`: a name clash or
//!   duplicate comes back as a warning, which fails the upload instead of
//!   replacing someone else's file;
//! * `action=edit` to save the page.
//!
//! Write actions need a CSRF token, fetched once per client after login.
//! Nothing here retries: a failed request fails the run.

use crate::config::ConversionConfig;
use crate::error::Docx2WikiError;
use crate::remote::{Publisher, RemoteImage, RemoteStore, UploadRequest};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("docx2wiki/", env!("CARGO_PKG_VERSION"));
const UPLOAD_COMMENT: &str = "Imported from docx";

/// A logged-in (or anonymous) session against one wiki.
pub struct MediaWikiClient {
    client: reqwest::Client,
    api_url: String,
    timeout: Duration,
    csrf_token: OnceCell<String>,
}

impl std::fmt::Debug for MediaWikiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaWikiClient")
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// ── Response shapes ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct TokensResponse {
    query: TokensQuery,
}

#[derive(Debug, Deserialize)]
struct TokensQuery {
    tokens: Tokens,
}

#[derive(Debug, Deserialize)]
struct Tokens {
    logintoken: Option<String>,
    csrftoken: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    login: LoginResult,
}

#[derive(Debug, Deserialize)]
struct LoginResult {
    result: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AllImagesResponse {
    #[serde(default)]
    query: Option<AllImagesQuery>,
    #[serde(rename = "continue", default)]
    continuation: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct AllImagesQuery {
    #[serde(default)]
    allimages: Vec<AllImagesEntry>,
}

#[derive(Debug, Deserialize)]
struct AllImagesEntry {
    title: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload: UploadResult,
}

#[derive(Debug, Deserialize)]
struct UploadResult {
    result: String,
    filename: Option<String>,
    #[serde(default)]
    warnings: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct EditResponse {
    edit: EditResult,
}

#[derive(Debug, Deserialize)]
struct EditResult {
    result: String,
}

/// Decode an API response, surfacing an `{"error": {...}}` envelope.
fn decode<T: DeserializeOwned>(body: Value) -> Result<T, String> {
    if let Some(error) = body.get("error") {
        return Err(match serde_json::from_value::<ApiError>(error.clone()) {
            Ok(e) => format!("{}: {}", e.code, e.info),
            Err(_) => error.to_string(),
        });
    }
    serde_json::from_value(body).map_err(|e| format!("unexpected response: {e}"))
}

/// One page of `list=allimages`, plus the parameters for the next page.
fn parse_allimages(body: Value) -> Result<(Vec<RemoteImage>, Option<Vec<(String, String)>>), String> {
    let response: AllImagesResponse = decode(body)?;
    let images = response
        .query
        .map(|q| q.allimages)
        .unwrap_or_default()
        .into_iter()
        .map(|entry| RemoteImage {
            title: entry.title,
            download_url: entry.url,
        })
        .collect();
    let next = response.continuation.map(|params| {
        params
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect()
    });
    Ok((images, next))
}

/// `File:<name>` for a successful upload.
fn parse_upload(body: Value) -> Result<String, String> {
    let response: UploadResponse = decode(body)?;
    let upload = response.upload;
    match (upload.result.as_str(), upload.filename) {
        ("Success", Some(name)) => Ok(format!("File:{name}")),
        (result, _) => Err(match upload.warnings {
            Some(w) => format!("{result}: {w}"),
            None => result.to_string(),
        }),
    }
}

/// Text fields of an `action=upload` form; the file part is added apart.
fn upload_fields(request: &UploadRequest<'_>, token: String) -> Vec<(&'static str, String)> {
    vec![
        ("action", "upload".to_string()),
        ("format", "json".to_string()),
        ("formatversion", "2".to_string()),
        ("filename", request.filename.to_string()),
        ("comment", UPLOAD_COMMENT.to_string()),
        ("text", request.description.to_string()),
        ("token", token),
    ]
}

impl MediaWikiClient {
    /// Create a client for the given `api.php` URL.
    pub fn new(api_url: impl Into<String>, timeout_secs: u64) -> Result<Self, Docx2WikiError> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Docx2WikiError::Remote(format!("Could not build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            timeout,
            csrf_token: OnceCell::new(),
        })
    }

    /// Create a client whose request timeout is `config.api_timeout_secs`.
    pub fn from_config(
        api_url: impl Into<String>,
        config: &ConversionConfig,
    ) -> Result<Self, Docx2WikiError> {
        Self::new(api_url, config.api_timeout_secs)
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn get<T: DeserializeOwned>(&self, params: &[(String, String)]) -> Result<T, Docx2WikiError> {
        let body: Value = self
            .client
            .get(&self.api_url)
            .query(&[("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Docx2WikiError::Remote(e.to_string()))?
            .json()
            .await
            .map_err(|e| Docx2WikiError::Remote(e.to_string()))?;
        decode(body).map_err(Docx2WikiError::Remote)
    }

    async fn post_form(&self, params: &[(&str, &str)]) -> Result<Value, reqwest::Error> {
        self.client
            .post(&self.api_url)
            .query(&[("format", "json"), ("formatversion", "2")])
            .form(params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    async fn token(&self, kind: &str) -> Result<Tokens, Docx2WikiError> {
        let params = [
            ("action".to_string(), "query".to_string()),
            ("meta".to_string(), "tokens".to_string()),
            ("type".to_string(), kind.to_string()),
        ];
        let response: TokensResponse = self.get(&params).await?;
        Ok(response.query.tokens)
    }

    /// Log in with a bot password.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), Docx2WikiError> {
        let login_token = self
            .token("login")
            .await?
            .logintoken
            .ok_or_else(|| Docx2WikiError::Remote("no login token in response".into()))?;

        let body = self
            .post_form(&[
                ("action", "login"),
                ("lgname", username),
                ("lgpassword", password),
                ("lgtoken", login_token.as_str()),
            ])
            .await
            .map_err(|e| Docx2WikiError::Remote(e.to_string()))?;
        let response: LoginResponse = decode(body).map_err(Docx2WikiError::Remote)?;

        if response.login.result != "Success" {
            return Err(Docx2WikiError::Remote(format!(
                "login as {} failed: {}{}",
                username,
                response.login.result,
                response
                    .login
                    .reason
                    .map(|r| format!(" ({r})"))
                    .unwrap_or_default()
            )));
        }
        info!("Logged in to {} as {}", self.api_url, username);
        Ok(())
    }

    async fn csrf_token(&self) -> Result<&str, Docx2WikiError> {
        self.csrf_token
            .get_or_try_init(|| async {
                self.token("csrf")
                    .await?
                    .csrftoken
                    .ok_or_else(|| Docx2WikiError::Remote("no CSRF token in response".into()))
            })
            .await
            .map(String::as_str)
    }
}

impl RemoteStore for MediaWikiClient {
    async fn list_images(&self) -> Result<Vec<RemoteImage>, Docx2WikiError> {
        let base = vec![
            ("action".to_string(), "query".to_string()),
            ("list".to_string(), "allimages".to_string()),
            ("aiprop".to_string(), "url".to_string()),
            ("ailimit".to_string(), "max".to_string()),
        ];
        let mut images = Vec::new();
        let mut continuation: Vec<(String, String)> = Vec::new();

        loop {
            let mut params = base.clone();
            params.extend(continuation.iter().cloned());
            let body: Value = self.get(&params).await?;
            let (page, next) = parse_allimages(body).map_err(Docx2WikiError::Remote)?;
            debug!("allimages page: {} images", page.len());
            images.extend(page);
            match next {
                Some(next) => continuation = next,
                None => break,
            }
        }
        Ok(images)
    }

    async fn download(&self, image: &RemoteImage) -> Result<Vec<u8>, Docx2WikiError> {
        let fail = |reason: String| Docx2WikiError::Download {
            title: image.title.clone(),
            reason,
        };
        let response = self
            .client
            .get(&image.download_url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fail(format!("HTTP {}", response.status())));
        }
        let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn upload(&self, request: UploadRequest<'_>) -> Result<String, Docx2WikiError> {
        let fail = |reason: String| Docx2WikiError::Upload {
            filename: request.filename.to_string(),
            reason,
        };
        let token = self.csrf_token().await?.to_string();

        let part = reqwest::multipart::Part::bytes(request.bytes.to_vec())
            .file_name(request.filename.to_string())
            .mime_str(request.content_type)
            .map_err(|e| fail(e.to_string()))?;
        let form = upload_fields(&request, token)
            .into_iter()
            .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                form.text(name, value)
            })
            .part("file", part);
        debug!(
            "Uploading {} ({} bytes, keep name: {})",
            request.filename,
            request.bytes.len(),
            request.keep_original_filename
        );

        let body: Value = self
            .client
            .post(&self.api_url)
            .multipart(form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fail(e.to_string()))?
            .json()
            .await
            .map_err(|e| fail(e.to_string()))?;
        parse_upload(body).map_err(fail)
    }
}

impl Publisher for MediaWikiClient {
    async fn publish(&self, page: &str, text: &str, summary: &str) -> Result<(), Docx2WikiError> {
        let fail = |reason: String| Docx2WikiError::Publish {
            page: page.to_string(),
            reason,
        };
        let token = self.csrf_token().await?.to_string();
        let body = self
            .post_form(&[
                ("action", "edit"),
                ("title", page),
                ("text", text),
                ("summary", summary),
                ("token", token.as_str()),
            ])
            .await
            .map_err(|e| fail(e.to_string()))?;
        let response: EditResponse = decode(body).map_err(fail)?;
        if response.edit.result != "Success" {
            return Err(fail(response.edit.result));
        }
        info!("Saved page '{}'", page);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn allimages_page_with_continuation() {
        let body = json!({
            "batchcomplete": true,
            "continue": {"aicontinue": "Harbour.png", "continue": "-||"},
            "query": {"allimages": [
                {"name": "Anchor.jpg", "title": "File:Anchor.jpg",
                 "url": "https://wiki.example.org/images/a/ab/Anchor.jpg"}
            ]}
        });
        let (images, next) = parse_allimages(body).unwrap();
        assert_eq!(
            images,
            vec![RemoteImage {
                title: "File:Anchor.jpg".into(),
                download_url: "https://wiki.example.org/images/a/ab/Anchor.jpg".into(),
            }]
        );
        let mut next = next.unwrap();
        next.sort();
        assert_eq!(
            next,
            vec![
                ("aicontinue".to_string(), "Harbour.png".to_string()),
                ("continue".to_string(), "-||".to_string()),
            ]
        );
    }

    #[test]
    fn last_allimages_page_has_no_continuation() {
        let (images, next) = parse_allimages(json!({"query": {"allimages": []}})).unwrap();
        assert!(images.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn api_error_envelope_is_reported() {
        let err = parse_allimages(json!({
            "error": {"code": "readapidenied", "info": "You need read permission."}
        }))
        .unwrap_err();
        assert_eq!(err, "readapidenied: You need read permission.");
    }

    #[test]
    fn upload_success_gives_file_title() {
        let id = parse_upload(json!({
            "upload": {"result": "Success", "filename": "Report_1.png"}
        }))
        .unwrap();
        assert_eq!(id, "File:Report_1.png");
    }

    #[test]
    fn upload_warning_is_an_error() {
        let err = parse_upload(json!({
            "upload": {"result": "Warning", "warnings": {"duplicate": ["Other.png"]}}
        }))
        .unwrap_err();
        assert!(err.starts_with("Warning"), "got: {err}");
    }

    #[test]
    fn existing_file_warning_is_an_error() {
        let err = parse_upload(json!({
            "upload": {"result": "Warning", "warnings": {"exists": "Report_1.png"}, "filekey": "abc"}
        }))
        .unwrap_err();
        assert!(err.contains("exists"), "got: {err}");
    }

    #[test]
    fn upload_form_never_ignores_warnings() {
        let request = UploadRequest {
            bytes: b"png",
            content_type: "image/png",
            description: "Harbour map",
            filename: "report_2.png",
            keep_original_filename: true,
        };
        let fields = upload_fields(&request, "tok+\\".to_string());
        let names: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
        assert!(!names.contains(&"ignorewarnings"));
        assert!(fields.contains(&("filename", "report_2.png".to_string())));
        assert!(fields.contains(&("text", "Harbour map".to_string())));
        assert!(fields.contains(&("comment", UPLOAD_COMMENT.to_string())));
        assert!(fields.contains(&("token", "tok+\\".to_string())));
    }

    #[test]
    fn timeout_follows_config() {
        let config = ConversionConfig::builder()
            .page_name("Harbour survey")
            .api_timeout_secs(5)
            .build()
            .unwrap();
        let client = MediaWikiClient::from_config("https://wiki.example.org/w/api.php", &config)
            .unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(5));

        let default = MediaWikiClient::from_config(
            "https://wiki.example.org/w/api.php",
            &ConversionConfig::default(),
        )
        .unwrap();
        assert_eq!(default.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn debug_omits_client_internals() {
        let client = MediaWikiClient::new("https://wiki.example.org/w/api.php", 30).unwrap();
        let dbg = format!("{client:?}");
        assert!(dbg.contains("api.php"));
        assert_eq!(client.api_url(), "https://wiki.example.org/w/api.php");
    }
}
