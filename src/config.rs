//! Configuration
//!
//! Build tunables with sensible defaults, optionally loaded from a TOML
//! file and overridden by CLI flags.

use crate::error::{IndexError, IndexResult};
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub build: BuildConfig,
}

/// Tunables for the build pass
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Minimum uncompressed bytes between access points
    #[serde(default = "default_index_every")]
    pub index_every: u64,

    /// Number of leading lines excluded from key extraction (header rows).
    /// They still get LineOffsets rows.
    #[serde(default)]
    pub skip_first: u64,

    /// Seconds between build progress log lines
    #[serde(default = "default_progress_every_secs")]
    pub progress_every_secs: u64,
}

fn default_index_every() -> u64 {
    32 * 1024 * 1024
}

fn default_progress_every_secs() -> u64 {
    20
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            index_every: default_index_every(),
            skip_first: 0,
            progress_every_secs: default_progress_every_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> IndexResult<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| IndexError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BuildConfig::default();
        assert_eq!(config.index_every, 32 * 1024 * 1024);
        assert_eq!(config.skip_first, 0);
        assert_eq!(config.progress_every_secs, 20);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [build]
            index_every = 1048576
            "#,
        )
        .unwrap();
        assert_eq!(config.build.index_every, 1048576);
        assert_eq!(config.build.skip_first, 0);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.build.index_every, 32 * 1024 * 1024);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Config::load(Path::new("/nonexistent/gzindex.toml")).unwrap_err();
        assert!(matches!(err, IndexError::Io(_)));
    }
}
