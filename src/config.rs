//! Configuration module for sgsync
//!
//! Handles loading and merging configuration from multiple sources, lowest
//! precedence first:
//! - Default values
//! - User configuration (~/.sgsync.toml)
//! - Project configuration (./sgsync.toml)
//! - An explicit configuration file (`--config` / `SGSYNC_CONFIG`)
//! - Environment variables
//!
//! Command-line flags are applied on top by the CLI.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// AWS client settings
    pub aws: AwsConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// AWS client settings, passed to the SDK untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Region
    pub region: Option<String>,

    /// Named profile from the shared AWS config files
    pub profile: Option<String>,

    /// Custom endpoint (e.g. a local EC2 emulator)
    pub endpoint_url: Option<String>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter; overrides the `-v` count when set
    pub level: Option<String>,

    /// Log format
    pub format: LogFormat,
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(Error::config(path, "file does not exist"));
            }
        }

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge(Self::from_file(&path)?);
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Get the list of configuration file paths to check, lowest precedence first
    fn get_config_paths(explicit_path: Option<&Path>) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".sgsync.toml"));
        }
        paths.push(PathBuf::from("sgsync.toml"));

        if let Some(path) = explicit_path {
            paths.push(path.to_path_buf());
        }

        paths
    }

    /// Parse a single configuration file; the format follows the extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(path, format!("failed to read: {}", e)))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match extension {
            "yml" | "yaml" => {
                serde_yaml::from_str(&content).map_err(|e| Error::config(path, e.to_string()))
            }
            "json" => {
                serde_json::from_str(&content).map_err(|e| Error::config(path, e.to_string()))
            }
            _ => toml::from_str(&content).map_err(|e| Error::config(path, e.to_string())),
        }
    }

    /// Merge another config into this one; set values in `other` win
    fn merge(self, other: Config) -> Config {
        Config {
            aws: AwsConfig {
                region: other.aws.region.or(self.aws.region),
                profile: other.aws.profile.or(self.aws.profile),
                endpoint_url: other.aws.endpoint_url.or(self.aws.endpoint_url),
            },
            logging: LoggingConfig {
                level: other.logging.level.or(self.logging.level),
                format: if other.logging.format != LogFormat::default() {
                    other.logging.format
                } else {
                    self.logging.format
                },
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(region) = std::env::var("SGSYNC_REGION") {
            self.aws.region = Some(region);
        }

        if let Ok(profile) = std::env::var("SGSYNC_PROFILE") {
            self.aws.profile = Some(profile);
        }

        if let Ok(endpoint_url) = std::env::var("SGSYNC_ENDPOINT_URL") {
            self.aws.endpoint_url = Some(endpoint_url);
        }

        if let Ok(level) = std::env::var("SGSYNC_LOG_LEVEL") {
            self.logging.level = Some(level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.aws.region.is_none());
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_from_file_formats() {
        let dir = tempfile::tempdir().unwrap();

        let toml = write_file(&dir, "a.toml", "[aws]\nregion = \"eu-west-1\"\n");
        assert_eq!(
            Config::from_file(&toml).unwrap().aws.region.as_deref(),
            Some("eu-west-1")
        );

        let yaml = write_file(&dir, "a.yml", "logging:\n  format: json\n");
        assert_eq!(Config::from_file(&yaml).unwrap().logging.format, LogFormat::Json);

        let json = write_file(&dir, "a.json", r#"{"aws": {"profile": "ops"}}"#);
        assert_eq!(
            Config::from_file(&json).unwrap().aws.profile.as_deref(),
            Some("ops")
        );
    }

    #[test]
    fn test_from_file_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "bad.toml", "[aws\n");
        assert!(matches!(Config::from_file(&path), Err(Error::Config { .. })));
    }

    #[test]
    fn test_config_merge() {
        let base = Config {
            aws: AwsConfig {
                region: Some("us-east-1".to_string()),
                profile: Some("default".to_string()),
                endpoint_url: None,
            },
            logging: LoggingConfig::default(),
        };
        let over = Config {
            aws: AwsConfig {
                region: Some("eu-central-1".to_string()),
                ..Default::default()
            },
            logging: LoggingConfig {
                level: None,
                format: LogFormat::Json,
            },
        };

        let merged = base.merge(over);
        assert_eq!(merged.aws.region.as_deref(), Some("eu-central-1"));
        assert_eq!(merged.aws.profile.as_deref(), Some("default"));
        assert_eq!(merged.logging.format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn test_explicit_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/sgsync.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    #[serial]
    fn test_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "c.toml", "[aws]\nregion = \"us-west-2\"\n");

        std::env::set_var("SGSYNC_REGION", "ap-south-1");
        let config = Config::load(Some(&path)).unwrap();
        std::env::remove_var("SGSYNC_REGION");

        assert_eq!(config.aws.region.as_deref(), Some("ap-south-1"));
    }
}
