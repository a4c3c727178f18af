//! Spooling arbitrary input into a temporary upload file
//!
//! The uploader only accepts bytes that already sit in a file. This module
//! bridges streams (stdin, in-memory buffers) to that model: the input is
//! written to a temporary file while its SHA-256 is computed, and the file is
//! exposed as an [`IncomingFile`].
//!
//! # Example
//!
//! ```no_run
//! use hakobi::upload::spool::SpooledFile;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spooled = SpooledFile::from_reader(std::io::stdin().lock())?;
//! let incoming = spooled.incoming("notes.txt", "text/plain");
//!
//! println!("File: {:?}", spooled.path());
//! println!("Size: {} bytes", incoming.size);
//! println!("SHA256: {}", spooled.content_hash());
//! # Ok(())
//! # }
//! ```

use super::IncomingFile;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Buffer size for spooling
pub const DEFAULT_BUFFER_SIZE: usize = 65536; // 64KB

/// Temporary file holding spooled upload bytes
///
/// Removed when dropped unless it was moved away by a persister first.
#[derive(Debug)]
pub struct SpooledFile {
    path: PathBuf,
    size: u64,
    content_hash: String,
}

impl SpooledFile {
    /// Spool `reader` into the system temp directory.
    pub fn from_reader<R: Read>(reader: R) -> io::Result<Self> {
        Self::from_reader_in(std::env::temp_dir(), reader)
    }

    /// Spool `reader` into `dir`.
    ///
    /// Spooling into the upload directory itself lets a later move be a
    /// plain rename.
    pub fn from_reader_in<R: Read>(dir: impl AsRef<Path>, mut reader: R) -> io::Result<Self> {
        let file_name = format!(".hakobi-{}.tmp", uuid::Uuid::new_v4().simple());
        let path = dir.as_ref().join(file_name);

        let mut file = File::create(&path)?;
        let mut spooled = Self {
            path,
            size: 0,
            content_hash: String::new(),
        };

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; DEFAULT_BUFFER_SIZE];
        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            file.write_all(&buffer[..n])?;
            hasher.update(&buffer[..n]);
            spooled.size += n as u64;
        }
        file.flush()?;

        spooled.content_hash = hex::encode(hasher.finalize());
        Ok(spooled)
    }

    /// Spool an in-memory buffer.
    pub fn from_bytes(data: &[u8]) -> io::Result<Self> {
        Self::from_reader(data)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// SHA256 of the spooled content (hex encoded)
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Describe the spooled bytes as an upload from the client.
    pub fn incoming(
        &self,
        client_filename: impl Into<String>,
        declared_mime_type: impl Into<String>,
    ) -> IncomingFile {
        IncomingFile::new(client_filename, declared_mime_type, self.size, &self.path)
    }
}

impl Drop for SpooledFile {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to clean up spooled upload"
                );
            }
        }
    }
}
