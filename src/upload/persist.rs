//! Persisting received files
//!
//! Moves (or copies) the bytes of a validated upload to its resolved target.
//! This is the only stage of the pipeline that writes file contents.
//!
//! # Transfer modes
//!
//! - [`TransferMode::Move`]: `rename(2)`, falling back to a copy followed by
//!   removal of the source when the rename fails (e.g. across filesystems)
//! - [`TransferMode::Copy`]: always copy, leaving the source in place
//!
//! On Linux `std::fs::copy` uses `copy_file_range(2)`, so the copy path
//! stays in kernel space where the filesystem allows it.

use std::fs;
use std::io;
use std::path::Path;

/// How a persister gets bytes to the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferMode {
    #[default]
    Move,
    Copy,
}

/// How the bytes actually reached the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Renamed,
    Copied,
}

impl Transfer {
    /// Label for metrics
    pub fn label(self) -> &'static str {
        match self {
            Transfer::Renamed => "rename",
            Transfer::Copied => "copy",
        }
    }
}

/// Storage seam for the uploader.
///
/// `target` may already hold an empty placeholder claimed during name
/// resolution; implementations must replace it.
pub trait Persister: Send + Sync {
    fn store(&self, source: &Path, target: &Path) -> io::Result<Transfer>;
}

/// Persister writing into a local directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPersister {
    mode: TransferMode,
}

impl LocalPersister {
    pub fn new(mode: TransferMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }
}

impl Persister for LocalPersister {
    fn store(&self, source: &Path, target: &Path) -> io::Result<Transfer> {
        match self.mode {
            TransferMode::Copy => {
                fs::copy(source, target)?;
                Ok(Transfer::Copied)
            }
            TransferMode::Move => match fs::rename(source, target) {
                Ok(()) => Ok(Transfer::Renamed),
                Err(rename_err) => {
                    tracing::debug!(
                        source = %source.display(),
                        target = %target.display(),
                        error = %rename_err,
                        "Rename failed, falling back to copy"
                    );
                    fs::copy(source, target)?;
                    if let Err(e) = fs::remove_file(source) {
                        tracing::warn!(
                            path = %source.display(),
                            error = %e,
                            "Failed to remove upload source after copy"
                        );
                    }
                    Ok(Transfer::Copied)
                }
            },
        }
    }
}
