use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default config file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "morta.toml";

/// Top-level configuration loaded from morta.toml.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MortaConfig {
    pub sequencer: SequencerConfig,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SequencerConfig {
    /// Seconds between liveness checks while waiting. Must be > 0.
    pub polling_period_secs: u64,
    /// Sequence used when `--sequence` is not given.
    pub sequence: Option<String>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            polling_period_secs: 1,
            sequence: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("polling period must be at least 1 second")]
    InvalidPollingPeriod,
}

impl MortaConfig {
    /// Load config from `path`.
    ///
    /// A missing file yields defaults only when `required` is false, which is
    /// the case for the implicit `morta.toml` lookup.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        let config = Self::parse(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sequencer.polling_period_secs == 0 {
            return Err(ConfigError::InvalidPollingPeriod);
        }
        Ok(())
    }
}
