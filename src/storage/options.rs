use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use super::col::INSERT_MAX_DEPTH;
use crate::primitives::pager::{PagerOptions, MIN_CACHE_PAGES};

/// Options supplied when opening a [`super::col::ColumnTree`].
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TreeOptions {
    /// Maximum height of overlay skip lists created by updates.
    pub insert_max_depth: usize,
    /// Whether the descent rejects a child whose starting record number
    /// disagrees with the reference used to reach it.
    pub verify_descent: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            insert_max_depth: INSERT_MAX_DEPTH,
            verify_descent: cfg!(debug_assertions),
        }
    }
}

/// Combined configuration, usually read from a TOML file.
///
/// ```toml
/// [pager]
/// cache_pages = 4096
///
/// [tree]
/// insert_max_depth = 8
/// verify_descent = true
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ColumnStoreConfig {
    /// Page store settings.
    pub pager: PagerOptions,
    /// Tree settings.
    pub tree: TreeOptions,
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration text is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is outside its accepted range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl ColumnStoreConfig {
    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pager.cache_pages < MIN_CACHE_PAGES {
            return Err(ConfigError::Invalid {
                field: "pager.cache_pages",
                reason: "must be at least 2",
            });
        }
        if !(1..=INSERT_MAX_DEPTH).contains(&self.tree.insert_max_depth) {
            return Err(ConfigError::Invalid {
                field: "tree.insert_max_depth",
                reason: "must be between 1 and 10",
            });
        }
        Ok(())
    }
}
