//! Upload orchestration
//!
//! [`Uploader`] drives every incoming file through validation, name
//! resolution and persistence, and shapes the results according to the
//! caller's [`ErrorMode`].
//!
//! # Example
//!
//! ```no_run
//! use hakobi::{ErrorMode, IncomingFile, Policy, Uploader};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut policy = Policy::new("/srv/uploads");
//! policy.set_mime_types("image/*").set_file_extensions("jpg,png");
//!
//! let uploader = Uploader::new(policy)?;
//! let file = IncomingFile::new("Holiday.JPG", "image/jpeg", 52_114, "/tmp/upload-1a2b");
//! let report = uploader.upload(file, ErrorMode::Report)?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! # Ok(())
//! # }
//! ```

use crate::config::{Config, ConfigError};
use crate::metrics;
use crate::policy::Policy;
use crate::upload::naming;
use crate::upload::persist::{LocalPersister, Persister};
use crate::upload::validator;
use crate::upload::{
    ErrorKind, IncomingFile, StoredFile, UploadError, UploadFailure, UploadOutcome,
};
use chrono::Utc;
use serde::Serialize;
use std::time::Instant;

/// What to do when a file fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorMode {
    /// Embed a failure record and keep going.
    #[default]
    Report,
    /// Return the first failure as an error. Files stored before it stay stored.
    Raise,
}

/// One file or an ordered batch.
#[derive(Debug, Clone)]
pub enum UploadInput {
    Single(IncomingFile),
    Batch(Vec<IncomingFile>),
}

impl From<IncomingFile> for UploadInput {
    fn from(file: IncomingFile) -> Self {
        UploadInput::Single(file)
    }
}

impl From<Vec<IncomingFile>> for UploadInput {
    fn from(files: Vec<IncomingFile>) -> Self {
        UploadInput::Batch(files)
    }
}

/// Result of [`Uploader::upload`].
///
/// Batch reports keep input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UploadReport {
    Single(UploadOutcome),
    Batch(Vec<UploadOutcome>),
}

impl UploadReport {
    pub fn outcomes(&self) -> &[UploadOutcome] {
        match self {
            UploadReport::Single(outcome) => std::slice::from_ref(outcome),
            UploadReport::Batch(outcomes) => outcomes,
        }
    }

    pub fn into_outcomes(self) -> Vec<UploadOutcome> {
        match self {
            UploadReport::Single(outcome) => vec![outcome],
            UploadReport::Batch(outcomes) => outcomes,
        }
    }

    /// `true` when every file was stored.
    pub fn all_stored(&self) -> bool {
        self.outcomes().iter().all(UploadOutcome::is_stored)
    }
}

/// Upload orchestrator bound to one policy.
#[derive(Debug, Clone)]
pub struct Uploader<P = LocalPersister> {
    policy: Policy,
    persister: P,
}

impl Uploader<LocalPersister> {
    /// Create an uploader that moves files into the policy's directory.
    pub fn new(policy: Policy) -> Result<Self, ConfigError> {
        Self::with_persister(policy, LocalPersister::default())
    }

    /// Create an uploader for the policy registered under `name`.
    pub fn from_config(config: &Config, name: &str) -> Result<Self, ConfigError> {
        Self::new(config.policy(name)?)
    }
}

impl<P: Persister> Uploader<P> {
    pub fn with_persister(policy: Policy, persister: P) -> Result<Self, ConfigError> {
        policy.validate()?;
        Ok(Self { policy, persister })
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Mutable access for the chained setters. Invariants are re-checked on
    /// the next upload.
    pub fn policy_mut(&mut self) -> &mut Policy {
        &mut self.policy
    }

    pub fn persister(&self) -> &P {
        &self.persister
    }

    /// Upload one file or a batch.
    ///
    /// A single file under a `multiple` policy is handled as a batch of one.
    /// A batch under a single-file policy is accepted only when it holds
    /// exactly one file.
    pub fn upload(
        &self,
        input: impl Into<UploadInput>,
        mode: ErrorMode,
    ) -> Result<UploadReport, UploadError> {
        self.policy.validate()?;

        match (input.into(), self.policy.multiple) {
            (UploadInput::Single(file), true) => {
                self.process_batch(vec![file], mode).map(UploadReport::Batch)
            }
            (UploadInput::Batch(files), true) => {
                self.process_batch(files, mode).map(UploadReport::Batch)
            }
            (UploadInput::Single(file), false) => self.process_single(file, mode),
            (UploadInput::Batch(mut files), false) => match files.len() {
                0 => Err(ErrorKind::NoFile.into()),
                1 => {
                    let file = files.remove(0);
                    self.process_single(file, mode)
                }
                count => Err(UploadError::UnexpectedMultiple { count }),
            },
        }
    }

    /// Upload one file, returning its descriptor or the first failure.
    pub fn upload_file(&self, file: &IncomingFile) -> Result<StoredFile, UploadError> {
        self.policy.validate()?;
        self.process(file)
    }

    /// Upload every file in order, regardless of the policy's `multiple` flag.
    ///
    /// An empty batch fails with `NoFile`.
    pub fn upload_batch(
        &self,
        files: Vec<IncomingFile>,
        mode: ErrorMode,
    ) -> Result<Vec<UploadOutcome>, UploadError> {
        self.policy.validate()?;
        self.process_batch(files, mode)
    }

    fn process_single(
        &self,
        file: IncomingFile,
        mode: ErrorMode,
    ) -> Result<UploadReport, UploadError> {
        match self.process(&file) {
            Ok(stored) => Ok(UploadReport::Single(UploadOutcome::Stored(stored))),
            Err(e) if mode == ErrorMode::Raise => Err(e),
            Err(e) => Ok(UploadReport::Single(UploadOutcome::Failed(
                UploadFailure::new(file, &e),
            ))),
        }
    }

    fn process_batch(
        &self,
        files: Vec<IncomingFile>,
        mode: ErrorMode,
    ) -> Result<Vec<UploadOutcome>, UploadError> {
        if files.is_empty() {
            return Err(ErrorKind::NoFile.into());
        }

        let total = files.len();
        let mut outcomes = Vec::with_capacity(total);
        for file in files {
            match self.process(&file) {
                Ok(stored) => outcomes.push(UploadOutcome::Stored(stored)),
                Err(e) if mode == ErrorMode::Raise => return Err(e),
                Err(e) => outcomes.push(UploadOutcome::Failed(UploadFailure::new(file, &e))),
            }
        }

        let stored = outcomes.iter().filter(|o| o.is_stored()).count();
        tracing::info!(
            policy = %self.policy.name,
            total = total,
            stored = stored,
            failed = total - stored,
            "Batch upload finished"
        );

        Ok(outcomes)
    }

    #[tracing::instrument(
        name = "upload.file",
        skip(self, file),
        fields(
            upload.policy = %self.policy.name,
            upload.client_filename = %file.client_filename,
            upload.size = file.size,
            // Result fields - set once the file is stored
            upload.basename = tracing::field::Empty,
            upload.bytes = tracing::field::Empty
        )
    )]
    fn process(&self, file: &IncomingFile) -> Result<StoredFile, UploadError> {
        let start_time = Instant::now();
        let result = self.store(file);

        let duration = start_time.elapsed();
        metrics::record_upload_duration(&self.policy.name, duration.as_secs_f64());

        match &result {
            Ok(stored) => {
                metrics::record_upload_success(&self.policy.name, stored.size);

                let span = tracing::Span::current();
                span.record("upload.basename", stored.basename.as_str());
                span.record("upload.bytes", stored.size);

                tracing::info!(
                    path = %stored.path.display(),
                    bytes = stored.size,
                    duration_ms = duration.as_millis(),
                    "Stored uploaded file"
                );
            }
            Err(e) => {
                let kind = e.kind().unwrap_or(ErrorKind::Unknown(-1));
                metrics::record_upload_failure(&self.policy.name, kind.label());

                match e {
                    UploadError::Store(source) => tracing::error!(
                        error = %source,
                        duration_ms = duration.as_millis(),
                        "Failed to store uploaded file"
                    ),
                    _ => tracing::warn!(
                        reason = %e,
                        code = kind.code(),
                        "Upload rejected"
                    ),
                }
            }
        }

        result
    }

    fn store(&self, file: &IncomingFile) -> Result<StoredFile, UploadError> {
        validator::validate(file, &self.policy)?;
        let source = file.source.as_deref().ok_or(ErrorKind::NoFile)?;

        let resolved = naming::resolve(&file.client_filename, &self.policy)?;
        tracing::debug!(target_path = %resolved.target.display(), "Uploading file to");

        let reservation = naming::reserve(resolved, self.policy.overwrite)?;
        tracing::debug!(
            source = %source.display(),
            target_path = %reservation.target().display(),
            "Saving uploaded file to"
        );

        let transfer = self
            .persister
            .store(source, reservation.target())
            .map_err(UploadError::Store)?;
        metrics::record_transfer(transfer.label());

        let name = reservation.commit();
        Ok(StoredFile {
            name: file.client_filename.clone(),
            mime_type: file.declared_mime_type.clone(),
            size: file.size,
            path: name.target,
            basename: name.basename,
            filename: name.stem,
            ext: name.ext,
            dot_ext: name.dot_ext,
            created_at: Utc::now(),
        })
    }
}
