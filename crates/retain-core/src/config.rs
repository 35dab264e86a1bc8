//! Retention configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! after_destroy = "regenerate"
//! catch_cleanup_panics = true
//! shard_amount = 16
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a scope does with acquires after it has been destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AfterDestroy {
    /// Reject with [`StoreError::Closed`](crate::StoreError::Closed)
    #[default]
    Reject,
    /// Start a fresh generation; old instances are never resurrected
    Regenerate,
}

/// Store and scope configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionConfig {
    /// Behaviour after scope destruction
    pub after_destroy: AfterDestroy,
    /// Convert panics in cleanup hooks into reported failures
    pub catch_cleanup_panics: bool,
    /// Number of map shards (power of two, greater than one); `None` uses the default
    pub shard_amount: Option<usize>,
}

impl RetentionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With post-destroy behaviour
    #[inline]
    #[must_use]
    pub fn with_after_destroy(mut self, after_destroy: AfterDestroy) -> Self {
        self.after_destroy = after_destroy;
        self
    }

    /// With cleanup panic isolation
    #[inline]
    #[must_use]
    pub fn with_catch_cleanup_panics(mut self, catch: bool) -> Self {
        self.catch_cleanup_panics = catch;
        self
    }

    /// With map shard count
    #[inline]
    #[must_use]
    pub fn with_shard_amount(mut self, shards: usize) -> Self {
        self.shard_amount = Some(shards);
        self
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    /// - `ConfigError::Parse` for malformed TOML or unknown keys
    /// - `ConfigError::Invalid` for out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - see [`RetentionConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` if `shard_amount` is not a power of two above one
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.shard_amount {
            Some(shards) if shards <= 1 || !shards.is_power_of_two() => Err(ConfigError::Invalid(
                format!("shard_amount must be a power of two greater than 1, got {shards}"),
            )),
            _ => Ok(()),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            after_destroy: AfterDestroy::Reject,
            catch_cleanup_panics: true,
            shard_amount: None,
        }
    }
}
