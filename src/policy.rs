//! Upload policy
//!
//! A [`Policy`] is the immutable rule set an [`Uploader`](crate::Uploader)
//! enforces: size bounds, allowed MIME types and extensions, naming
//! transforms and overwrite behaviour. Policies are built in code with the
//! setters below or loaded by name from a [`Config`](crate::Config).

use crate::config::{self, ConfigError};
use crate::upload::naming::{COLLISION_SUFFIX_BYTES, MAX_BASENAME_BYTES};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Characters never allowed in a stored filename.
pub(crate) const FORBIDDEN_FILENAME_CHARS: &[char] =
    &['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// Process-level fallback directory used when no upload directory is configured.
pub fn default_upload_dir() -> PathBuf {
    std::env::temp_dir().join("uploads")
}

/// Look up a named policy, failing with `ConfigurationNotFound` for unknown names.
pub fn lookup(policies: &BTreeMap<String, Policy>, name: &str) -> Result<Policy, ConfigError> {
    policies
        .get(name)
        .cloned()
        .ok_or_else(|| ConfigError::ConfigurationNotFound(name.to_string()))
}

/// Allow-list for MIME types or file extensions.
///
/// `*` given as the whole value allows everything. Any other value is a set
/// of lower-cased entries; a `*` inside a list has no special meaning for
/// extensions and only acts as a minor-type wildcard for MIME entries
/// (`image/*`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawAllowList", into = "RawAllowList")]
pub enum AllowList {
    #[default]
    Any,
    Only(Vec<String>),
}

impl AllowList {
    /// Parse the comma-separated form, e.g. `"jpg, PNG,gif"` or `"*"`.
    pub fn parse(value: &str) -> Self {
        if value.trim() == "*" {
            return AllowList::Any;
        }
        value.split(',').collect()
    }

    pub fn is_any(&self) -> bool {
        matches!(self, AllowList::Any)
    }

    /// Lower-cased entries; empty for [`AllowList::Any`].
    pub fn entries(&self) -> &[String] {
        match self {
            AllowList::Any => &[],
            AllowList::Only(entries) => entries,
        }
    }
}

impl<S: AsRef<str>> FromIterator<S> for AllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        AllowList::Only(
            iter.into_iter()
                .map(|entry| entry.as_ref().trim().to_lowercase())
                .filter(|entry| !entry.is_empty())
                .collect(),
        )
    }
}

impl From<&str> for AllowList {
    fn from(value: &str) -> Self {
        AllowList::parse(value)
    }
}

impl From<Vec<&str>> for AllowList {
    fn from(value: Vec<&str>) -> Self {
        value.into_iter().collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawAllowList {
    Text(String),
    List(Vec<String>),
}

impl From<RawAllowList> for AllowList {
    fn from(raw: RawAllowList) -> Self {
        match raw {
            RawAllowList::Text(text) => AllowList::parse(&text),
            RawAllowList::List(list) => list.into_iter().collect(),
        }
    }
}

impl From<AllowList> for RawAllowList {
    fn from(list: AllowList) -> Self {
        match list {
            AllowList::Any => RawAllowList::Text("*".to_string()),
            AllowList::Only(entries) => RawAllowList::List(entries),
        }
    }
}

/// Upload rules applied to every incoming file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    /// Label used in logs and metrics.
    pub name: String,
    pub upload_dir: PathBuf,
    /// Inclusive lower size bound in bytes.
    pub min_file_size: u64,
    /// Inclusive upper size bound in bytes.
    pub max_file_size: u64,
    pub mime_types: AllowList,
    pub file_extensions: AllowList,
    /// Accept a batch of files instead of a single one.
    pub multiple: bool,
    /// Replacement character for slugging and the unique-token separator.
    pub slug_char: char,
    pub slug_filename: bool,
    pub hash_filename: bool,
    pub unique_filename: bool,
    /// Replace existing files instead of probing `name__N` alternatives.
    pub overwrite: bool,
    /// Explicit target basename; replaces every derived name.
    pub save_as: Option<String>,
}

impl Default for Policy {
    fn default() -> Self {
        Self::new(default_upload_dir())
    }
}

impl Policy {
    /// Policy with the default rules writing into `upload_dir`.
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: "default".to_string(),
            upload_dir: upload_dir.into(),
            min_file_size: config::default_min_file_size(),
            max_file_size: config::default_max_file_size(),
            mime_types: AllowList::Any,
            file_extensions: AllowList::Any,
            multiple: false,
            slug_char: config::default_slug_char(),
            slug_filename: false,
            hash_filename: false,
            unique_filename: config::default_unique_filename(),
            overwrite: false,
            save_as: None,
        }
    }

    /// Check the structural invariants. Directory existence is checked per
    /// upload, not here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload_dir.as_os_str().is_empty() || !self.upload_dir.is_absolute() {
            return Err(ConfigError::ValidationError(format!(
                "Policy '{}': upload_dir must be an absolute path, got '{}'",
                self.name,
                self.upload_dir.display()
            )));
        }

        if self.min_file_size > self.max_file_size {
            return Err(ConfigError::ValidationError(format!(
                "Policy '{}': min_file_size ({}) exceeds max_file_size ({})",
                self.name, self.min_file_size, self.max_file_size
            )));
        }

        validate_slug_char(self.slug_char)?;

        if let Some(save_as) = &self.save_as {
            validate_save_as(save_as)?;
        }

        Ok(())
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the upload directory after checking that it exists and is writable.
    ///
    /// Relative paths are resolved against the current directory.
    pub fn set_upload_dir(&mut self, dir: impl AsRef<Path>) -> Result<&mut Self, ConfigError> {
        let dir = dir.as_ref();
        let dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            std::fs::canonicalize(dir)
                .map_err(|_| ConfigError::DirectoryNotWritable(dir.to_path_buf()))?
        };

        if !is_writable_dir(&dir) {
            return Err(ConfigError::DirectoryNotWritable(dir));
        }
        self.upload_dir = dir;
        Ok(self)
    }

    pub fn set_min_file_size(&mut self, size_in_bytes: u64) -> &mut Self {
        self.min_file_size = size_in_bytes;
        self
    }

    pub fn set_max_file_size(&mut self, size_in_bytes: u64) -> &mut Self {
        self.max_file_size = size_in_bytes;
        self
    }

    pub fn set_mime_types(&mut self, mime_types: impl Into<AllowList>) -> &mut Self {
        self.mime_types = mime_types.into();
        self
    }

    pub fn set_file_extensions(&mut self, extensions: impl Into<AllowList>) -> &mut Self {
        self.file_extensions = extensions.into();
        self
    }

    pub fn set_multiple(&mut self, multiple: bool) -> &mut Self {
        self.multiple = multiple;
        self
    }

    pub fn set_slug_char(&mut self, slug_char: char) -> Result<&mut Self, ConfigError> {
        validate_slug_char(slug_char)?;
        self.slug_char = slug_char;
        Ok(self)
    }

    pub fn enable_slug_filename(&mut self, enable: bool) -> &mut Self {
        self.slug_filename = enable;
        self
    }

    pub fn enable_hash_filename(&mut self, enable: bool) -> &mut Self {
        self.hash_filename = enable;
        self
    }

    pub fn enable_unique_filename(&mut self, enable: bool) -> &mut Self {
        self.unique_filename = enable;
        self
    }

    pub fn set_overwrite(&mut self, overwrite: bool) -> &mut Self {
        self.overwrite = overwrite;
        self
    }

    /// Override the target filename (basename with extension).
    pub fn set_save_as(&mut self, basename: impl Into<String>) -> Result<&mut Self, ConfigError> {
        let basename = basename.into();
        validate_save_as(&basename)?;
        self.save_as = Some(basename);
        Ok(self)
    }
}

fn validate_slug_char(slug_char: char) -> Result<(), ConfigError> {
    if slug_char.is_control() || slug_char == '.' || FORBIDDEN_FILENAME_CHARS.contains(&slug_char)
    {
        return Err(ConfigError::ValidationError(format!(
            "slug_char {:?} is not allowed in file names",
            slug_char
        )));
    }
    Ok(())
}

fn validate_save_as(basename: &str) -> Result<(), ConfigError> {
    let trimmed = basename.trim();
    let invalid = trimmed.is_empty()
        || trimmed.chars().all(|c| c == '.')
        || trimmed.chars().any(|c| c.is_control() || FORBIDDEN_FILENAME_CHARS.contains(&c))
        || trimmed.len() + COLLISION_SUFFIX_BYTES > MAX_BASENAME_BYTES;
    if invalid {
        return Err(ConfigError::InvalidSaveAs(basename.to_string()));
    }
    Ok(())
}

/// `true` when `path` is an existing directory the process may write into.
#[cfg(target_os = "linux")]
pub(crate) fn is_writable_dir(path: &Path) -> bool {
    use nix::unistd::{access, AccessFlags};

    path.is_dir() && access(path, AccessFlags::W_OK).is_ok()
}

/// `true` when `path` is an existing directory the process may write into.
#[cfg(not(target_os = "linux"))]
pub(crate) fn is_writable_dir(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_dir() && !meta.permissions().readonly())
        .unwrap_or(false)
}
