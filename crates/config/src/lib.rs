//! Configuration for proposal batch generation
//!
//! A [`BatchConfig`] is read from a YAML file or assembled from `QV_*`
//! environment variables; every field has a default.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use qv_common::{Address, MotionId};
use qv_deployer::TokenBindings;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Most motions a batch may hold; a ballot card records at most this many votes
pub const MAX_BATCH: usize = 256;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Errors that can occur in configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidEnvVar(String, String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file: {0}")]
    FileReadError(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<ConfigError> for qv_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::FileNotFound(_) => qv_common::Error::not_found(err.to_string()),
            ConfigError::FileReadError(_) => qv_common::Error::internal(err.to_string()),
            _ => qv_common::Error::validation(err.to_string()),
        }
    }
}

/// Names of the files a batch writes, relative to the output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFiles {
    #[serde(default = "default_booth_file")]
    pub booth: String,
    #[serde(default = "default_yes_file")]
    pub yes: String,
    #[serde(default = "default_no_file")]
    pub no: String,
    /// Prior proposal document whose metadata is carried over
    #[serde(default = "default_old_data_file")]
    pub old_data: String,
    #[serde(default = "default_json_file")]
    pub json: String,
}

fn default_booth_file() -> String {
    "boothAddrs.txt".to_string()
}

fn default_yes_file() -> String {
    "yesAddrs.txt".to_string()
}

fn default_no_file() -> String {
    "noAddrs.txt".to_string()
}

fn default_old_data_file() -> String {
    "old.json".to_string()
}

fn default_json_file() -> String {
    "proposals.json".to_string()
}

impl Default for OutputFiles {
    fn default() -> Self {
        Self {
            booth: default_booth_file(),
            yes: default_yes_file(),
            no: default_no_file(),
            old_data: default_old_data_file(),
            json: default_json_file(),
        }
    }
}

/// Proposal batch configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of motions to derive, ids `0..how_many`
    #[serde(default = "default_how_many")]
    pub how_many: usize,
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    #[serde(default)]
    pub files: OutputFiles,
    /// Token contracts every booth is bound to
    #[serde(default = "TokenBindings::placeholders")]
    pub tokens: TokenBindings,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_how_many() -> usize {
    96
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            how_many: default_how_many(),
            out_dir: default_out_dir(),
            files: OutputFiles::default(),
            tokens: TokenBindings::placeholders(),
            log_level: default_log_level(),
        }
    }
}

impl BatchConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from variables supplied by `lookup`.
    ///
    /// `QV_CONFIG_FILE` names a YAML file to load; otherwise the defaults are
    /// overridden by whichever `QV_*` variables are set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("QV_CONFIG_FILE") {
            return Self::from_file(path);
        }

        let mut config = Self::default();
        if let Some(value) = lookup("QV_HOW_MANY") {
            config.how_many = value
                .parse::<usize>()
                .map_err(|e| ConfigError::InvalidEnvVar("QV_HOW_MANY".to_string(), e.to_string()))?;
        }
        if let Some(value) = lookup("QV_OUT_DIR") {
            config.out_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("QV_VOICE_CREDITS") {
            config.tokens.voice_credits = parse_address("QV_VOICE_CREDITS", &value)?;
        }
        if let Some(value) = lookup("QV_VOTES") {
            config.tokens.votes = parse_address("QV_VOTES", &value)?;
        }
        if let Some(value) = lookup("QV_BALLOT_CARDS") {
            config.tokens.ballot_cards = parse_address("QV_BALLOT_CARDS", &value)?;
        }
        if let Some(value) = lookup("QV_LOG_LEVEL") {
            config.log_level = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let contents = fs::read_to_string(path).map_err(|e| {
            ConfigError::FileReadError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: BatchConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        debug!("Loaded batch configuration from {}", path.display());
        Ok(config)
    }

    /// Check ranges and names
    pub fn validate(&self) -> Result<()> {
        if self.how_many == 0 || self.how_many > MAX_BATCH {
            return Err(ConfigError::Invalid(format!(
                "how_many must be between 1 and {}, got {}",
                MAX_BATCH, self.how_many
            )));
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}'",
                self.log_level
            )));
        }

        let files = &self.files;
        for (field, name) in [
            ("booth", &files.booth),
            ("yes", &files.yes),
            ("no", &files.no),
            ("old_data", &files.old_data),
            ("json", &files.json),
        ] {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("files.{} is empty", field)));
            }
        }
        Ok(())
    }

    /// Motion ids of the batch, in order
    pub fn motion_ids(&self) -> impl Iterator<Item = MotionId> {
        (0..self.how_many as u64).filter_map(|id| MotionId::new(id).ok())
    }

    /// Full path of one of the batch's files
    pub fn output_path(&self, name: &str) -> PathBuf {
        self.out_dir.join(name)
    }
}

fn parse_address(var: &str, value: &str) -> Result<Address> {
    value
        .parse()
        .map_err(|e: qv_common::Error| ConfigError::InvalidEnvVar(var.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = BatchConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.how_many, 96);
        assert_eq!(config.out_dir, PathBuf::from("."));
        assert_eq!(config.files.booth, "boothAddrs.txt");
        assert_eq!(config.files.json, "proposals.json");
        assert_eq!(config.tokens, TokenBindings::placeholders());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.motion_ids().count(), 96);
    }

    #[test]
    fn test_env_overrides() {
        let config = BatchConfig::from_lookup(lookup(&[
            ("QV_HOW_MANY", "12"),
            ("QV_OUT_DIR", "/tmp/batch"),
            ("QV_VOTES", "0x0101010101010101010101010101010101010101"),
            ("QV_LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.how_many, 12);
        assert_eq!(config.output_path("x.txt"), PathBuf::from("/tmp/batch/x.txt"));
        assert_eq!(config.tokens.votes, Address::new([1u8; 20]));
        assert_eq!(
            config.tokens.voice_credits,
            TokenBindings::placeholders().voice_credits
        );
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_env_values() {
        assert!(matches!(
            BatchConfig::from_lookup(lookup(&[("QV_HOW_MANY", "lots")])),
            Err(ConfigError::InvalidEnvVar(..))
        ));
        assert!(matches!(
            BatchConfig::from_lookup(lookup(&[("QV_BALLOT_CARDS", "0x12")])),
            Err(ConfigError::InvalidEnvVar(..))
        ));
        assert!(matches!(
            BatchConfig::from_lookup(lookup(&[("QV_HOW_MANY", "257")])),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            BatchConfig::from_lookup(lookup(&[("QV_LOG_LEVEL", "loud")])),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_validate_bounds() {
        let mut config = BatchConfig::default();
        config.how_many = 0;
        assert!(config.validate().is_err());
        config.how_many = MAX_BATCH;
        assert!(config.validate().is_ok());
        config.files.yes = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "how_many: 4\nout_dir: out\nfiles:\n  json: batch.json\ntokens:\n  voice_credits: \"0x0202020202020202020202020202020202020202\"\n  votes: \"0x0303030303030303030303030303030303030303\"\n  ballot_cards: \"0x0404040404040404040404040404040404040404\"\n"
        )
        .unwrap();

        let config = BatchConfig::from_lookup(lookup(&[(
            "QV_CONFIG_FILE",
            file.path().to_str().unwrap(),
        )]))
        .unwrap();

        assert_eq!(config.how_many, 4);
        assert_eq!(config.files.json, "batch.json");
        assert_eq!(config.files.booth, "boothAddrs.txt");
        assert_eq!(config.tokens.ballot_cards, Address::new([4u8; 20]));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_from_file_errors() {
        assert!(matches!(
            BatchConfig::from_file("/nonexistent/qv.yaml"),
            Err(ConfigError::FileNotFound(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "how_many: [").unwrap();
        assert!(matches!(
            BatchConfig::from_file(file.path()),
            Err(ConfigError::YamlParseError(_))
        ));
    }
}
