//! Uploaded-file handling for document-store uploads.

use crate::errors::{CaseworkError, CaseworkResult};
use std::path::{Path, PathBuf};

/// A file staged for upload to the document store.
///
/// Exposes only the operations the upload path needs: the source path (when
/// there is one), content type, original filename, size, and the bytes.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    source: Source,
    content_type: String,
    original_filename: String,
}

#[derive(Debug, Clone)]
enum Source {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl UploadedFile {
    /// Stages a local file. Fails if the path is not an existing file. The
    /// original filename defaults to the path's basename.
    pub fn from_path(
        path: impl AsRef<Path>,
        content_type: impl Into<String>,
    ) -> CaseworkResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(CaseworkError::configuration(format!(
                "{} file does not exist",
                path.display()
            )));
        }
        let original_filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            source: Source::Path(path),
            content_type: content_type.into(),
            original_filename,
        })
    }

    /// Stages in-memory bytes, as produced by a remote download.
    pub fn from_bytes(
        bytes: Vec<u8>,
        content_type: impl Into<String>,
        original_filename: impl Into<String>,
    ) -> Self {
        Self {
            source: Source::Bytes(bytes),
            content_type: content_type.into(),
            original_filename: original_filename.into(),
        }
    }

    /// Overrides the original filename sent to the document store.
    pub fn with_original_filename(mut self, name: impl Into<String>) -> Self {
        self.original_filename = name.into();
        self
    }

    /// The local source path, when staged from one.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::Path(path) => Some(path),
            Source::Bytes(_) => None,
        }
    }

    /// The content type sent to the document store.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The filename, not including any path, sent to the document store.
    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    /// The staged size in bytes.
    pub async fn size(&self) -> CaseworkResult<u64> {
        match &self.source {
            Source::Bytes(bytes) => Ok(bytes.len() as u64),
            Source::Path(path) => tokio::fs::metadata(path)
                .await
                .map(|meta| meta.len())
                .map_err(|e| CaseworkError::io(format!("failed to stat {}", path.display()), e)),
        }
    }

    /// Reads the staged bytes.
    pub async fn read(&self) -> CaseworkResult<Vec<u8>> {
        match &self.source {
            Source::Bytes(bytes) => Ok(bytes.clone()),
            Source::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|e| CaseworkError::io(format!("failed to read {}", path.display()), e)),
        }
    }
}
