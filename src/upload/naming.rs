//! Target filename resolution
//!
//! Turns an untrusted client filename into a basename inside the policy's
//! upload directory, then claims a free path for it on disk.
//!
//! # Transform order
//!
//! 1. slug (`slug_filename`)
//! 2. hash (`hash_filename`)
//! 3. unique token (`unique_filename`)
//!
//! An explicit `save_as` replaces the whole stem/extension pair and skips
//! all three transforms.
//!
//! # Collisions
//!
//! Without `overwrite`, the first free name among `stem.ext`, `stem__1.ext`,
//! `stem__2.ext`, ... is claimed with an exclusive create, so two uploaders
//! sharing a directory never pick the same name. The claim is an empty
//! placeholder the persister later replaces; dropping an uncommitted
//! [`Reservation`] removes it.

use super::codes::ErrorKind;
use super::UploadError;
use crate::policy::{Policy, FORBIDDEN_FILENAME_CHARS};
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

/// Stem used when nothing usable is left of the client filename.
pub const FALLBACK_STEM: &str = "upload";

/// Give up probing `stem__N` names after this many attempts.
pub const MAX_COLLISION_PROBES: u32 = 10_000;

/// Longest basename most filesystems accept (`NAME_MAX`).
pub const MAX_BASENAME_BYTES: usize = 255;

/// Room kept for the longest probe suffix, `__10000`.
pub const COLLISION_SUFFIX_BYTES: usize = 7;

const UNIQUE_TOKEN_BYTES: usize = 32;
const HASH_STEM_BYTES: usize = 64;

/// Final name of a file inside the upload directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedName {
    pub stem: String,
    /// Extension without the dot
    pub ext: String,
    /// Extension with the dot, empty when there is no extension
    pub dot_ext: String,
    pub basename: String,
    pub target: PathBuf,
}

impl ResolvedName {
    fn build(upload_dir: &Path, stem: String, ext: String, dot_ext: String) -> Self {
        let basename = format!("{stem}{dot_ext}");
        let target = upload_dir.join(&basename);
        Self {
            stem,
            ext,
            dot_ext,
            basename,
            target,
        }
    }

    fn with_stem(&self, stem: String) -> Self {
        let upload_dir = self.target.parent().unwrap_or_else(|| Path::new(""));
        Self::build(upload_dir, stem, self.ext.clone(), self.dot_ext.clone())
    }
}

/// Split a basename into `(stem, ext, dot_ext)` at the last `.`.
///
/// `"filename.ext"` gives `("filename", "ext", ".ext")`, `"filename"` gives
/// `("filename", "", "")` and `".filename"` gives `("", "filename", ".filename")`.
pub fn split_basename(basename: &str) -> (String, String, String) {
    match basename.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => {
            (stem.to_string(), ext.to_string(), format!(".{ext}"))
        }
        Some((stem, _)) => (stem.to_string(), String::new(), String::new()),
        None => (basename.to_string(), String::new(), String::new()),
    }
}

/// Reduce an untrusted client filename to a single safe path component.
///
/// Trims whitespace, drops any directory part (`/` or `\`), removes control
/// characters and characters forbidden on common filesystems. A name made of
/// dots only becomes empty.
pub fn sanitize_client_filename(name: &str) -> String {
    let name = name.trim();
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && !FORBIDDEN_FILENAME_CHARS.contains(c))
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.chars().all(|c| c == '.') {
        return String::new();
    }
    cleaned.to_string()
}

/// Lower-case `text` and replace every run of non-alphanumeric characters
/// with `replacement`, trimming it from both ends.
pub fn slug(text: &str, replacement: char) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending && !out.is_empty() {
                out.push(replacement);
            }
            pending = false;
            out.extend(c.to_lowercase());
        } else {
            pending = true;
        }
    }

    out
}

/// Hex SHA-256 of `stem`.
pub fn hash_stem(stem: &str) -> String {
    hex::encode(Sha256::digest(stem.as_bytes()))
}

/// Collision-resistant random token appended by `unique_filename`.
pub fn unique_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Compute the target name for `client_filename` under `policy`.
///
/// Pure: the filesystem is not consulted. Fails only if the name would
/// leave the upload directory.
pub fn resolve(client_filename: &str, policy: &Policy) -> Result<ResolvedName, UploadError> {
    let (mut stem, ext, dot_ext) = match policy.save_as.as_deref() {
        Some(save_as) => split_basename(save_as.trim()),
        None => {
            let (mut stem, ext, _) = split_basename(&sanitize_client_filename(client_filename));
            let mut ext = ext.to_lowercase();

            // Keep stem, token, probe suffix and extension within NAME_MAX.
            let token_bytes = if policy.unique_filename {
                policy.slug_char.len_utf8() + UNIQUE_TOKEN_BYTES
            } else {
                0
            };
            let budget = MAX_BASENAME_BYTES - COLLISION_SUFFIX_BYTES - token_bytes;
            let min_stem_bytes = if policy.hash_filename { HASH_STEM_BYTES } else { 1 };
            truncate_on_char_boundary(&mut ext, budget - min_stem_bytes - 1);
            let dot_ext = if ext.is_empty() {
                String::new()
            } else {
                format!(".{ext}")
            };

            if policy.slug_filename {
                stem = slug(&stem, policy.slug_char);
            }
            truncate_on_char_boundary(&mut stem, budget - dot_ext.len());
            if policy.hash_filename {
                stem = hash_stem(&stem);
            }
            if policy.unique_filename {
                stem = format!("{stem}{}{}", policy.slug_char, unique_token());
            }

            (stem, ext, dot_ext)
        }
    };

    if stem.is_empty() && ext.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }

    let resolved = ResolvedName::build(&policy.upload_dir, stem, ext, dot_ext);
    ensure_inside(&resolved, &policy.upload_dir)?;
    Ok(resolved)
}

/// Cut `text` to at most `max_bytes` without splitting a character.
pub fn truncate_on_char_boundary(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

fn ensure_inside(resolved: &ResolvedName, upload_dir: &Path) -> Result<(), UploadError> {
    let inside = resolved.target.parent() == Some(upload_dir)
        && resolved.target.file_name().and_then(|name| name.to_str())
            == Some(resolved.basename.as_str())
        && !matches!(resolved.basename.as_str(), "." | "..");

    if !inside {
        // Path escape attempt, not an I/O failure.
        tracing::error!(
            basename = %resolved.basename,
            upload_dir = %upload_dir.display(),
            "Resolved upload name escapes the upload directory"
        );
        return Err(UploadError::Store(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "resolved name '{}' escapes the upload directory",
                resolved.basename
            ),
        )));
    }
    Ok(())
}

/// A target path chosen for one upload.
///
/// When `claimed`, an empty placeholder exists at the target and is removed
/// on drop unless the reservation was committed.
#[derive(Debug)]
pub struct Reservation {
    name: ResolvedName,
    claimed: bool,
    committed: bool,
}

impl Reservation {
    pub fn name(&self) -> &ResolvedName {
        &self.name
    }

    pub fn target(&self) -> &Path {
        &self.name.target
    }

    /// `true` when a placeholder file was created for this reservation.
    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    /// Keep whatever is now at the target and hand back the name.
    pub fn commit(mut self) -> ResolvedName {
        self.committed = true;
        std::mem::take(&mut self.name)
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.claimed && !self.committed {
            if let Err(e) = std::fs::remove_file(&self.name.target) {
                tracing::warn!(
                    path = %self.name.target.display(),
                    error = %e,
                    "Failed to release reserved upload target"
                );
            }
        }
    }
}

/// Pick the on-disk target for `name`.
///
/// With `overwrite` the resolved target is used as is. Otherwise the first
/// free `stem[__N].ext` is claimed exclusively.
pub fn reserve(name: ResolvedName, overwrite: bool) -> Result<Reservation, UploadError> {
    if overwrite {
        return Ok(Reservation {
            name,
            claimed: false,
            committed: false,
        });
    }

    let base_stem = name.stem.clone();
    for attempt in 0..=MAX_COLLISION_PROBES {
        let candidate = if attempt == 0 {
            name.clone()
        } else {
            name.with_stem(format!("{base_stem}__{attempt}"))
        };

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate.target)
        {
            Ok(_) => {
                return Ok(Reservation {
                    name: candidate,
                    claimed: true,
                    committed: false,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!(target_path = %candidate.target.display(), "Upload target taken");
            }
            Err(e) => return Err(UploadError::Store(e)),
        }
    }

    Err(UploadError::Rejected(ErrorKind::FileExists))
}
