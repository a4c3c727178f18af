//! Configuration module for Hakobi
//!
//! Handles loading and parsing of YAML configuration files holding named
//! upload policies, with support for environment variable expansion and
//! validation.

use crate::policy::{self, AllowList, Policy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

lazy_static::lazy_static! {
    static ref ENV_VAR_PATTERN: Option<regex_lite::Regex> =
        regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").ok();
}

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// Variable names must start with a letter or underscore and contain only
/// uppercase letters, digits, and underscores.
///
/// # Examples
///
/// ```ignore
/// std::env::set_var("UPLOAD_ROOT", "/srv/uploads");
/// let result = expand_env_vars("${UPLOAD_ROOT}/avatars");
/// assert_eq!(result, "/srv/uploads/avatars");
///
/// let result = expand_env_vars("${MISSING:-/tmp}");
/// assert_eq!(result, "/tmp");
/// ```
pub(crate) fn expand_env_vars(s: &str) -> String {
    let Some(re) = ENV_VAR_PATTERN.as_ref() else {
        return s.to_string();
    };
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);

    result
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid Upload Configuration: {0}")]
    ConfigurationNotFound(String),

    #[error("Upload directory not writable: {}", .0.display())]
    DirectoryNotWritable(PathBuf),

    #[error("Invalid save-as filename '{0}': must be a plain file name")]
    InvalidSaveAs(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Fallback directory for policies without an `upload_dir`.
    #[serde(default, alias = "defaultUploadDir")]
    pub default_upload_dir: Option<PathBuf>,
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyConfig>,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Directory applied to policies that don't name one.
    pub fn fallback_upload_dir(&self) -> PathBuf {
        self.default_upload_dir
            .clone()
            .unwrap_or_else(policy::default_upload_dir)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.policies.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one upload policy must be configured".into(),
            ));
        }

        for name in self.policies.keys() {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "Policy names cannot be empty".into(),
                ));
            }
            self.policy(name)?;
        }

        Ok(())
    }

    /// Build every configured policy, keyed by name.
    pub fn policies(&self) -> Result<BTreeMap<String, Policy>, ConfigError> {
        let fallback = self.fallback_upload_dir();
        self.policies
            .iter()
            .map(|(name, raw)| Ok((name.clone(), raw.to_policy(name, &fallback)?)))
            .collect()
    }

    /// Build the policy registered under `name`.
    pub fn policy(&self, name: &str) -> Result<Policy, ConfigError> {
        let raw = self
            .policies
            .get(name)
            .ok_or_else(|| ConfigError::ConfigurationNotFound(name.to_string()))?;
        raw.to_policy(name, &self.fallback_upload_dir())
    }
}

/// One named upload policy as written in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    #[serde(default, alias = "uploadDir")]
    pub upload_dir: Option<PathBuf>,

    #[serde(default = "default_min_file_size", alias = "minFileSize")]
    pub min_file_size: u64,

    #[serde(default = "default_max_file_size", alias = "maxFileSize")]
    pub max_file_size: u64,

    #[serde(default, alias = "mimeTypes")]
    pub mime_types: AllowList,

    #[serde(default, alias = "fileExtensions")]
    pub file_extensions: AllowList,

    #[serde(default)]
    pub multiple: bool,

    #[serde(default = "default_slug_char", alias = "slug", alias = "slugChar")]
    pub slug_char: char,

    #[serde(default, alias = "slugFilename")]
    pub slug_filename: bool,

    #[serde(default, alias = "hashFilename")]
    pub hash_filename: bool,

    #[serde(default = "default_unique_filename", alias = "uniqueFilename")]
    pub unique_filename: bool,

    #[serde(default)]
    pub overwrite: bool,

    #[serde(default, alias = "saveAs")]
    pub save_as: Option<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            upload_dir: None,
            min_file_size: default_min_file_size(),
            max_file_size: default_max_file_size(),
            mime_types: AllowList::Any,
            file_extensions: AllowList::Any,
            multiple: false,
            slug_char: default_slug_char(),
            slug_filename: false,
            hash_filename: false,
            unique_filename: default_unique_filename(),
            overwrite: false,
            save_as: None,
        }
    }
}

impl PolicyConfig {
    /// Turn the raw entry into a validated [`Policy`].
    pub fn to_policy(&self, name: &str, fallback_dir: &Path) -> Result<Policy, ConfigError> {
        let upload_dir = self
            .upload_dir
            .clone()
            .unwrap_or_else(|| fallback_dir.to_path_buf());

        let policy = Policy {
            name: name.to_string(),
            upload_dir,
            min_file_size: self.min_file_size,
            max_file_size: self.max_file_size,
            mime_types: self.mime_types.clone(),
            file_extensions: self.file_extensions.clone(),
            multiple: self.multiple,
            slug_char: self.slug_char,
            slug_filename: self.slug_filename,
            hash_filename: self.hash_filename,
            unique_filename: self.unique_filename,
            overwrite: self.overwrite,
            save_as: self.save_as.clone(),
        };
        policy.validate()?;
        Ok(policy)
    }
}

pub(crate) fn default_min_file_size() -> u64 {
    1
}

pub(crate) fn default_max_file_size() -> u64 {
    2097152 // 2MB
}

pub(crate) fn default_slug_char() -> char {
    '_'
}

pub(crate) fn default_unique_filename() -> bool {
    true
}
