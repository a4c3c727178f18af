//! Upload error codes and their messages
//!
//! Transport codes (`1..=8`) mirror the status an HTTP layer reports for a
//! received file; domain codes start at `100`. The mapping is presentation
//! only: control flow never branches on a message.

use serde::Serialize;

pub const UPLOAD_ERR_OK: i32 = 0;
pub const UPLOAD_ERR_INI_SIZE: i32 = 1;
pub const UPLOAD_ERR_FORM_SIZE: i32 = 2;
pub const UPLOAD_ERR_PARTIAL: i32 = 3;
pub const UPLOAD_ERR_NO_FILE: i32 = 4;
pub const UPLOAD_ERR_NO_TMP_DIR: i32 = 6;
pub const UPLOAD_ERR_CANT_WRITE: i32 = 7;
pub const UPLOAD_ERR_EXTENSION: i32 = 8;
pub const UPLOAD_ERR_MIN_FILE_SIZE: i32 = 100;
pub const UPLOAD_ERR_MAX_FILE_SIZE: i32 = 101;
pub const UPLOAD_ERR_MIME_TYPE: i32 = 102;
pub const UPLOAD_ERR_FILE_EXT: i32 = 103;
pub const UPLOAD_ERR_FILE_EXISTS: i32 = 104;
pub const UPLOAD_ERR_STORE_UPLOAD: i32 = 105;

const UNKNOWN_MESSAGE: &str = "Unknown upload error";

/// Classified upload error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Ok,
    IniSize,
    FormSize,
    Partial,
    NoFile,
    NoTmpDir,
    CantWrite,
    Extension,
    MinFileSize,
    MaxFileSize,
    InvalidMimeType,
    InvalidFileExtension,
    FileExists,
    StoreUploadFailed,
    /// Any code outside the known space; keeps the raw value.
    Unknown(i32),
}

impl ErrorKind {
    pub fn from_code(code: i32) -> Self {
        match code {
            UPLOAD_ERR_OK => ErrorKind::Ok,
            UPLOAD_ERR_INI_SIZE => ErrorKind::IniSize,
            UPLOAD_ERR_FORM_SIZE => ErrorKind::FormSize,
            UPLOAD_ERR_PARTIAL => ErrorKind::Partial,
            UPLOAD_ERR_NO_FILE => ErrorKind::NoFile,
            UPLOAD_ERR_NO_TMP_DIR => ErrorKind::NoTmpDir,
            UPLOAD_ERR_CANT_WRITE => ErrorKind::CantWrite,
            UPLOAD_ERR_EXTENSION => ErrorKind::Extension,
            UPLOAD_ERR_MIN_FILE_SIZE => ErrorKind::MinFileSize,
            UPLOAD_ERR_MAX_FILE_SIZE => ErrorKind::MaxFileSize,
            UPLOAD_ERR_MIME_TYPE => ErrorKind::InvalidMimeType,
            UPLOAD_ERR_FILE_EXT => ErrorKind::InvalidFileExtension,
            UPLOAD_ERR_FILE_EXISTS => ErrorKind::FileExists,
            UPLOAD_ERR_STORE_UPLOAD => ErrorKind::StoreUploadFailed,
            other => ErrorKind::Unknown(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            ErrorKind::Ok => UPLOAD_ERR_OK,
            ErrorKind::IniSize => UPLOAD_ERR_INI_SIZE,
            ErrorKind::FormSize => UPLOAD_ERR_FORM_SIZE,
            ErrorKind::Partial => UPLOAD_ERR_PARTIAL,
            ErrorKind::NoFile => UPLOAD_ERR_NO_FILE,
            ErrorKind::NoTmpDir => UPLOAD_ERR_NO_TMP_DIR,
            ErrorKind::CantWrite => UPLOAD_ERR_CANT_WRITE,
            ErrorKind::Extension => UPLOAD_ERR_EXTENSION,
            ErrorKind::MinFileSize => UPLOAD_ERR_MIN_FILE_SIZE,
            ErrorKind::MaxFileSize => UPLOAD_ERR_MAX_FILE_SIZE,
            ErrorKind::InvalidMimeType => UPLOAD_ERR_MIME_TYPE,
            ErrorKind::InvalidFileExtension => UPLOAD_ERR_FILE_EXT,
            ErrorKind::FileExists => UPLOAD_ERR_FILE_EXISTS,
            ErrorKind::StoreUploadFailed => UPLOAD_ERR_STORE_UPLOAD,
            ErrorKind::Unknown(code) => code,
        }
    }

    /// `true` for codes reported by the transport layer rather than by policy checks.
    pub fn is_transport(self) -> bool {
        (UPLOAD_ERR_INI_SIZE..=UPLOAD_ERR_EXTENSION).contains(&self.code())
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::Ok => "Upload successful",
            ErrorKind::IniSize => "Maximum ini file size exceeded",
            ErrorKind::FormSize => "Maximum form file size exceeded",
            ErrorKind::Partial => "File only partially uploaded",
            ErrorKind::NoFile => "No file uploaded",
            ErrorKind::NoTmpDir => "Upload directory missing",
            ErrorKind::CantWrite => "Cant write to upload directory",
            ErrorKind::Extension => "Upload extension error",
            ErrorKind::MinFileSize => "Minimum file size error",
            ErrorKind::MaxFileSize => "Maximum file size exceeded",
            ErrorKind::InvalidMimeType => "Invalid mime type",
            ErrorKind::InvalidFileExtension => "Invalid file extension",
            ErrorKind::FileExists => "File already exists",
            ErrorKind::StoreUploadFailed => "Failed to store uploaded file",
            ErrorKind::Unknown(_) => UNKNOWN_MESSAGE,
        }
    }

    /// Short label for metrics.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Ok => "ok",
            ErrorKind::IniSize => "ini_size",
            ErrorKind::FormSize => "form_size",
            ErrorKind::Partial => "partial",
            ErrorKind::NoFile => "no_file",
            ErrorKind::NoTmpDir => "no_tmp_dir",
            ErrorKind::CantWrite => "cant_write",
            ErrorKind::Extension => "extension",
            ErrorKind::MinFileSize => "min_file_size",
            ErrorKind::MaxFileSize => "max_file_size",
            ErrorKind::InvalidMimeType => "invalid_mime_type",
            ErrorKind::InvalidFileExtension => "invalid_file_extension",
            ErrorKind::FileExists => "file_exists",
            ErrorKind::StoreUploadFailed => "store_upload_failed",
            ErrorKind::Unknown(_) => "unknown",
        }
    }
}

/// Message for any numeric upload code, known or not.
pub fn message_for(code: i32) -> &'static str {
    ErrorKind::from_code(code).message()
}
