//! Input resolution: validate a user-supplied `.docx` path and read it.
//!
//! A `.docx` file is a ZIP archive, so we check the local-file-header magic
//! (`PK\x03\x04`) before handing the bytes to the loader. Callers get a
//! meaningful "not a .docx" error for a stray `.doc` or PDF instead of a
//! ZIP central-directory error.

use crate::error::Docx2WikiError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// A validated input document.
#[derive(Debug)]
pub struct ResolvedInput {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl ResolvedInput {
    /// File name without directories, e.g. `report.docx`.
    pub fn file_name(&self) -> String {
        file_name(&self.path)
    }

    /// File name without its extension, e.g. `report`. Used as the prefix of
    /// uploaded image names.
    pub fn stem(&self) -> String {
        upload_base(&self.path)
    }
}

/// Read and validate a local `.docx` file.
pub async fn resolve_input(path: impl AsRef<Path>) -> Result<ResolvedInput, Docx2WikiError> {
    let path = path.as_ref().to_path_buf();
    let read_path = path.clone();

    let bytes = tokio::task::spawn_blocking(move || read_local(&read_path))
        .await
        .map_err(|e| Docx2WikiError::Internal(format!("Read task panicked: {}", e)))??;

    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(ResolvedInput { path, bytes })
}

fn read_local(path: &Path) -> Result<Vec<u8>, Docx2WikiError> {
    if !path.exists() {
        return Err(Docx2WikiError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Docx2WikiError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(Docx2WikiError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| Docx2WikiError::load(format!("{}: {}", path.display(), e)))?;

    check_magic(path, &bytes)?;
    Ok(bytes)
}

/// Reject byte streams that do not start with a ZIP local-file header.
pub fn check_magic(path: &Path, bytes: &[u8]) -> Result<(), Docx2WikiError> {
    if bytes.len() < 4 || bytes[..4] != ZIP_MAGIC {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(Docx2WikiError::NotADocx {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

/// `dir/report.docx` → `report.docx`
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `dir/report.v2.docx` → `report.v2`
pub fn upload_base(path: &Path) -> String {
    let name = file_name(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}
