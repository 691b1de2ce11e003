//! Host configuration
//!
//! Process-wide tuning knobs for the object runtime: which string hash
//! function to use and how large the dictionary and intern tables are.
//!
//! The configuration is installed at most once, before any table is built.
//! Everything that reads it (dict construction, the per-thread intern table,
//! string hashing) calls [`config`], which falls back to the defaults on first
//! use and freezes them from then on.
//!
//! # Example
//!
//! ```rust
//! use dy_core::host::{HostConfig, StringHash};
//!
//! let config = HostConfig::new()
//!     .with_string_hash(StringHash::Murmur3)
//!     .with_dict_table_size(32);
//!
//! assert_eq!(config.dict_table_size, 32);
//! ```

use serde::Deserialize;
use std::fmt;
use std::sync::OnceLock;

/// Hash function applied to string contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringHash {
    /// 64-bit FNV-1
    #[default]
    Fnv1,
    /// MurmurHash3 (x86, 32-bit), seed 0
    Murmur3,
}

/// Runtime configuration shared by every thread
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    pub string_hash: StringHash,
    /// Number of chain heads in every dictionary's primary table
    pub dict_table_size: usize,
    /// Slot count of a dictionary's first overflow block; later blocks double
    pub dict_block_size: usize,
    pub intern_table_size: usize,
    pub intern_block_size: usize,
    /// Scratch arena size (bytes) above which it is reset when idle
    pub arena_reset_threshold: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            string_hash: StringHash::Fnv1,
            dict_table_size: 8,
            dict_block_size: 8,
            intern_table_size: 256,
            intern_block_size: 64,
            arena_reset_threshold: 10 * 1024 * 1024,
        }
    }
}

/// Why a configuration was refused
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A table or block size was zero
    ZeroSize(&'static str),
    /// TOML text did not describe a `HostConfig`
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroSize(field) => write!(f, "{} must be greater than zero", field),
            ConfigError::Parse(msg) => write!(f, "invalid host configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_string_hash(mut self, hash: StringHash) -> Self {
        self.string_hash = hash;
        self
    }

    pub fn with_dict_table_size(mut self, size: usize) -> Self {
        self.dict_table_size = size;
        self
    }

    pub fn with_dict_block_size(mut self, size: usize) -> Self {
        self.dict_block_size = size;
        self
    }

    pub fn with_intern_table_size(mut self, size: usize) -> Self {
        self.intern_table_size = size;
        self
    }

    pub fn with_intern_block_size(mut self, size: usize) -> Self {
        self.intern_block_size = size;
        self
    }

    pub fn with_arena_reset_threshold(mut self, bytes: usize) -> Self {
        self.arena_reset_threshold = bytes;
        self
    }

    /// Parse a configuration from TOML; omitted keys keep their defaults
    ///
    /// ```toml
    /// string_hash = "murmur3"
    /// dict_table_size = 16
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: HostConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("dict_table_size", self.dict_table_size),
            ("dict_block_size", self.dict_block_size),
            ("intern_table_size", self.intern_table_size),
            ("intern_block_size", self.intern_block_size),
        ];
        for (field, size) in sizes {
            if size == 0 {
                return Err(ConfigError::ZeroSize(field));
            }
        }
        Ok(())
    }
}

static HOST: OnceLock<HostConfig> = OnceLock::new();

/// Install the process-wide configuration.
///
/// Fails (handing the config back) if a configuration is already active,
/// which includes the implicit defaults once anything has used the runtime.
pub fn configure(config: HostConfig) -> Result<(), HostConfig> {
    if config.validate().is_err() {
        return Err(config);
    }
    let mut pending = Some(config);
    HOST.get_or_init(|| pending.take().unwrap_or_default());
    match pending {
        Some(rejected) => Err(rejected),
        None => {
            tracing::debug!(config = ?HOST.get(), "host configuration installed");
            Ok(())
        }
    }
}

/// The active configuration (defaults if none was installed)
pub fn config() -> &'static HostConfig {
    HOST.get_or_init(HostConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.string_hash, StringHash::Fnv1);
        assert_eq!(config.intern_table_size, 256);
        assert_eq!(config.intern_block_size, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = HostConfig::new()
            .with_string_hash(StringHash::Murmur3)
            .with_dict_table_size(4)
            .with_dict_block_size(2);
        assert_eq!(config.string_hash, StringHash::Murmur3);
        assert_eq!(config.dict_table_size, 4);
        assert_eq!(config.dict_block_size, 2);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = HostConfig::from_toml_str("string_hash = \"murmur3\"\ndict_table_size = 3\n")
            .unwrap();
        assert_eq!(config.string_hash, StringHash::Murmur3);
        assert_eq!(config.dict_table_size, 3);
        assert_eq!(config.dict_block_size, HostConfig::default().dict_block_size);
    }

    #[test]
    fn test_from_toml_rejects_zero() {
        let err = HostConfig::from_toml_str("intern_block_size = 0").unwrap_err();
        assert_eq!(err, ConfigError::ZeroSize("intern_block_size"));
    }

    #[test]
    fn test_from_toml_rejects_unknown_key() {
        let result = HostConfig::from_toml_str("bucket_count = 12");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
