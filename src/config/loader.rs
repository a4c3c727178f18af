//! Configuration loader with environment variable expansion

use super::{expand_env_vars, Config, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, expanding `${VAR}` placeholders first
    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        let expanded = expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_expand_env_vars_in_yaml() {
        std::env::set_var("HAKOBI_LOADER_DIR", "/srv/avatars");
        let content = r#"
policies:
  avatars:
    upload_dir: "${HAKOBI_LOADER_DIR}"
"#;
        let config = ConfigLoader::from_yaml(content).unwrap();
        std::env::remove_var("HAKOBI_LOADER_DIR");

        let policy = config.policy("avatars").unwrap();
        assert_eq!(policy.upload_dir, std::path::PathBuf::from("/srv/avatars"));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let content = r#"
policies:
  default:
    max_size: 10
"#;
        let err = ConfigLoader::from_yaml(content).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
