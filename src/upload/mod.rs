//! Upload module
//!
//! Data model for files entering and leaving the upload pipeline, plus the
//! pipeline stages themselves: validation, name resolution and persistence.

use crate::config::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod codes;
pub mod naming;
pub mod persist;
pub mod spool;
pub mod validator;

pub use codes::ErrorKind;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    /// Transport or policy rejection for a single file.
    #[error("{}", .0.message())]
    Rejected(ErrorKind),

    #[error("Failed to store uploaded file")]
    Store(#[source] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Received {count} files but the policy accepts a single file")]
    UnexpectedMultiple { count: usize },
}

impl UploadError {
    /// Classification of per-file errors. Configuration-layer errors have none.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            UploadError::Rejected(kind) => Some(*kind),
            UploadError::Store(_) => Some(ErrorKind::StoreUploadFailed),
            UploadError::Config(_) | UploadError::UnexpectedMultiple { .. } => None,
        }
    }

    pub fn code(&self) -> Option<i32> {
        self.kind().map(ErrorKind::code)
    }
}

impl From<ErrorKind> for UploadError {
    fn from(kind: ErrorKind) -> Self {
        UploadError::Rejected(kind)
    }
}

/// A file already received into temporary storage by an outer layer.
///
/// Name and MIME type come from the client and are untrusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingFile {
    #[serde(rename = "name", default)]
    pub client_filename: String,

    #[serde(rename = "type", default)]
    pub declared_mime_type: String,

    #[serde(default)]
    pub size: u64,

    /// Transport status code, `0` when the transfer succeeded.
    #[serde(rename = "error", default)]
    pub transport_error: i32,

    /// Location of the received bytes; `None` when no file was sent.
    #[serde(rename = "tmp_name", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

impl IncomingFile {
    pub fn new(
        client_filename: impl Into<String>,
        declared_mime_type: impl Into<String>,
        size: u64,
        source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client_filename: client_filename.into(),
            declared_mime_type: declared_mime_type.into(),
            size,
            transport_error: codes::UPLOAD_ERR_OK,
            source: Some(source.into()),
        }
    }

    /// Describe an existing file on disk, taking its size from metadata.
    pub fn from_path(
        path: impl AsRef<Path>,
        client_filename: impl Into<String>,
        declared_mime_type: impl Into<String>,
    ) -> io::Result<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        Ok(Self::new(client_filename, declared_mime_type, size, path))
    }

    /// Entry for a transfer the transport layer already reported as failed.
    pub fn failed_transfer(code: i32) -> Self {
        Self {
            client_filename: String::new(),
            declared_mime_type: String::new(),
            size: 0,
            transport_error: code,
            source: None,
        }
    }

    pub fn with_transport_error(mut self, code: i32) -> Self {
        self.transport_error = code;
        self
    }
}

/// Descriptor of a successfully stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    /// Original client filename
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    /// Final absolute path
    pub path: PathBuf,
    pub basename: String,
    /// Final stem
    pub filename: String,
    pub ext: String,
    #[serde(rename = "dotExt")]
    pub dot_ext: String,
    #[serde(rename = "ts", with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

/// A rejected file: the original input plus the mapped error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadFailure {
    #[serde(flatten)]
    pub file: IncomingFile,
    pub upload_err: String,
    #[serde(rename = "upload_err_code", skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
}

impl UploadFailure {
    pub fn new(file: IncomingFile, error: &UploadError) -> Self {
        Self {
            file,
            upload_err: error.to_string(),
            code: error.code(),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.code.map(ErrorKind::from_code)
    }
}

/// Per-file result in report mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UploadOutcome {
    Stored(StoredFile),
    Failed(UploadFailure),
}

impl UploadOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, UploadOutcome::Stored(_))
    }

    pub fn stored(&self) -> Option<&StoredFile> {
        match self {
            UploadOutcome::Stored(file) => Some(file),
            UploadOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&UploadFailure> {
        match self {
            UploadOutcome::Stored(_) => None,
            UploadOutcome::Failed(failure) => Some(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_serializes_with_upload_err() {
        let file = IncomingFile::new("a.txt", "text/plain", 0, "/tmp/phpA1");
        let failure = UploadFailure::new(file, &UploadError::Rejected(ErrorKind::MinFileSize));

        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["name"], "a.txt");
        assert_eq!(json["type"], "text/plain");
        assert_eq!(json["tmp_name"], "/tmp/phpA1");
        assert_eq!(json["upload_err"], "Minimum file size error");
        assert_eq!(json["upload_err_code"], 100);
        assert_eq!(failure.kind(), Some(ErrorKind::MinFileSize));
    }

    #[test]
    fn test_incoming_file_from_transport_shape() {
        let json = r#"{"name":"Upload File 1.txt","type":"text/plain","size":12,"error":2,"tmp_name":"/tmp/x"}"#;
        let file: IncomingFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.client_filename, "Upload File 1.txt");
        assert_eq!(file.transport_error, codes::UPLOAD_ERR_FORM_SIZE);
        assert_eq!(file.source, Some(PathBuf::from("/tmp/x")));

        let missing: IncomingFile = serde_json::from_str(r#"{"error":4}"#).unwrap();
        assert!(missing.source.is_none());
    }

    #[test]
    fn test_store_error_keeps_source() {
        let err = UploadError::Store(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert_eq!(err.to_string(), "Failed to store uploaded file");
        assert_eq!(err.kind(), Some(ErrorKind::StoreUploadFailed));
        assert!(std::error::Error::source(&err).is_some());
    }
}
