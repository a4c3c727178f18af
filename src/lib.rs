//! Hakobi Library
//!
//! Policy-driven upload pipeline: validates files already received by an
//! outer transport layer, resolves a safe collision-free name and persists
//! them into a local directory.
//!
//! # Features
//!
//! - **Policies**: size bounds, MIME/extension allow-lists with wildcards
//! - **Safe names**: untrusted client filenames never leave the upload directory
//! - **No silent clobbering**: `name__N` probing with exclusive claims
//! - **Batch mode**: per-file results in input order, report or raise
//!
//! # Example
//!
//! ```no_run
//! use hakobi::{Config, ErrorMode, IncomingFile, Uploader};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load("hakobi.yaml")?;
//!     let uploader = Uploader::from_config(&config, "default")?;
//!
//!     let file = IncomingFile::from_path("/tmp/upload-1a2b", "notes.txt", "text/plain")?;
//!     let report = uploader.upload(file, ErrorMode::Report)?;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod metrics;
pub mod policy;
pub mod upload;
pub mod uploader;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use policy::{AllowList, Policy};
pub use upload::{
    ErrorKind, IncomingFile, StoredFile, UploadError, UploadFailure, UploadOutcome,
};
pub use uploader::{ErrorMode, UploadInput, UploadReport, Uploader};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
