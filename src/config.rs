//! Configuration module for the symbol indexing core.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SYMDEX_` and use double
//! underscores to separate nested levels:
//! - `SYMDEX_INDEXING__PARALLELISM=8` sets `indexing.parallelism`
//! - `SYMDEX_FILE_CACHE__MAX_FILES=500` sets `file_cache.max_files`
//! - `SYMDEX_INDEXING__RESPECT_GITIGNORE=true` sets `indexing.respect_gitignore`

use crate::indexing::scanner::{DEFAULT_EXCLUDE_PATTERNS, DEFAULT_INCLUDE_PATTERNS};
use crate::storage::FileCacheConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Indexing and scanning configuration
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Memory-mapped file cache limits
    #[serde(default)]
    pub file_cache: FileCacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Worker threads for scanning (0 = auto-detect from core count)
    #[serde(default)]
    pub parallelism: usize,

    /// Capacity of the symbol index's per-file payload cache
    #[serde(default = "default_max_cached_files")]
    pub max_cached_files: usize,

    /// Globs a file must match to be indexed (empty = everything)
    #[serde(default = "default_include_patterns")]
    pub include_patterns: Vec<String>,

    /// Globs that skip files and prune directories
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Honor .gitignore rules while walking
    #[serde(default)]
    pub respect_gitignore: bool,

    /// Maximum walk depth (0 = unlimited)
    #[serde(default)]
    pub max_depth: usize,

    /// Follow symbolic links while walking
    #[serde(default)]
    pub follow_symlinks: bool,
}

/// Log level configuration with per-module overrides.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level: error, warn, info, debug or trace
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `scanner = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_max_cached_files() -> usize {
    100
}
fn default_include_patterns() -> Vec<String> {
    DEFAULT_INCLUDE_PATTERNS
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_exclude_patterns() -> Vec<String> {
    DEFAULT_EXCLUDE_PATTERNS
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            indexing: IndexingConfig::default(),
            file_cache: FileCacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallelism: 0,
            max_cached_files: default_max_cached_files(),
            include_patterns: default_include_patterns(),
            exclude_patterns: default_exclude_patterns(),
            respect_gitignore: false,
            max_depth: 0,
            follow_symlinks: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, figment::Error> {
        let config_path =
            Self::find_workspace_config().unwrap_or_else(|| PathBuf::from(".symdex/settings.toml"));

        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path))
            // Layer in environment variables with SYMDEX_ prefix
            // Double underscore (__) separates nested levels
            .merge(Env::prefixed("SYMDEX_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SYMDEX_").split("__"))
            .extract()
    }

    /// Find the workspace root by looking for a .symdex directory,
    /// searching from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(".symdex");
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.indexing.parallelism, 0);
        assert_eq!(settings.indexing.max_cached_files, 100);
        assert!(
            settings
                .indexing
                .include_patterns
                .contains(&"**/*.ts".to_string())
        );
        assert!(
            settings
                .indexing
                .exclude_patterns
                .contains(&"node_modules/**".to_string())
        );
        assert!(!settings.indexing.respect_gitignore);
        assert_eq!(settings.file_cache.max_files, 0);
        assert!(settings.file_cache.enable_metrics);
        assert_eq!(settings.logging.default, "warn");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2

[indexing]
parallelism = 4
include_patterns = ["src/**/*.ts"]
respect_gitignore = true

[file_cache]
max_files = 256
max_memory_mb = 512

[logging]
default = "debug"

[logging.modules]
scanner = "trace"
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.indexing.parallelism, 4);
        assert_eq!(settings.indexing.include_patterns, vec!["src/**/*.ts"]);
        assert!(settings.indexing.respect_gitignore);
        assert_eq!(settings.file_cache.max_files, 256);
        assert_eq!(settings.file_cache.max_memory_mb, 512);
        assert_eq!(settings.logging.default, "debug");
        assert_eq!(settings.logging.modules["scanner"], "trace");
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        // Only specify a few settings
        let toml_content = r#"
[indexing]
parallelism = 16
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();

        // Modified value
        assert_eq!(settings.indexing.parallelism, 16);

        // Default values should still be present
        assert_eq!(settings.version, 1);
        assert_eq!(settings.indexing.max_cached_files, 100);
        assert!(!settings.indexing.exclude_patterns.is_empty());
        assert!(settings.file_cache.enable_metrics);
    }
}
