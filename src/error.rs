//! Error types for the symbol indexing core
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for indexing operations
#[derive(Error, Debug)]
pub enum IndexError {
    /// File system errors
    #[error("Failed to read file '{}': {source}", path.display())]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// File cache holds the configured maximum number of files
    #[error("File cache limit reached: {current} files cached, limit is {limit}")]
    FileLimitReached { current: usize, limit: usize },

    /// Loading the file would push the cache past its memory budget
    #[error(
        "File cache memory limit reached: projected total {projected_mb} MB, limit is {limit_mb} MB"
    )]
    MemoryLimitReached { projected_mb: u64, limit_mb: u64 },

    /// Byte offsets are inverted or past the end of the file
    #[error("Invalid byte range {start}..{end} for '{}' ({size} bytes)", path.display())]
    InvalidRange {
        path: PathBuf,
        start: usize,
        end: usize,
        size: u64,
    },

    /// Glob pattern failed validation
    #[error("Invalid glob pattern '{pattern}': {reason}")]
    PatternInvalid { pattern: String, reason: String },

    /// Extractor rejected the file
    #[error("Failed to extract symbols from '{}': {reason}", path.display())]
    ExtractionFailed { path: PathBuf, reason: String },

    /// Job submitted after the pool shut down
    #[error("Worker pool is stopped and no longer accepts jobs")]
    PoolStopped,

    /// Job submitted after the pool was cancelled
    #[error("Worker pool was cancelled")]
    PoolCancelled,

    /// Operation on a closed index or cache
    #[error("Operation on closed {component}")]
    Closed { component: &'static str },
}

impl IndexError {
    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::FileRead { .. } => vec![
                "Check that the file exists and you have read permissions",
                "Ensure the file is not locked by another process",
            ],
            Self::FileLimitReached { .. } => vec![
                "Raise file_cache.max_files in the configuration",
                "Close the cache and reopen it with a larger limit",
            ],
            Self::MemoryLimitReached { .. } => vec![
                "Raise file_cache.max_memory_mb in the configuration",
                "The limit bounds virtual address space, not resident memory",
            ],
            Self::PatternInvalid { .. } => vec![
                "Check the include/exclude patterns for unbalanced brackets",
                "Use forward slashes and '**' for recursive matches",
            ],
            Self::PoolStopped | Self::PoolCancelled => vec![
                "Create a new worker pool; stopped pools cannot be restarted",
            ],
            Self::Closed { .. } => vec![
                "Create a new instance; closed components cannot be reused",
            ],
            _ => vec![],
        }
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;
