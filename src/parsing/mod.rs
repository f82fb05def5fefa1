//! Extractor interface and language detection
//!
//! The language-specific parser lives outside this crate; the scan pipeline
//! only needs the `SymbolExtractor` trait and the data it produces.

use crate::symbol::Symbol;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Supported source languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    TypeScript,
    JavaScript,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "ts" | "tsx" => Some(Language::TypeScript),
            "js" | "jsx" => Some(Language::JavaScript),
            _ => None,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Get default file extensions for this language
    pub fn extensions(&self) -> &[&str] {
        match self {
            Language::TypeScript => &["ts", "tsx"],
            Language::JavaScript => &["js", "jsx"],
        }
    }

    /// Get the configuration key for this language
    pub fn config_key(&self) -> &str {
        match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
        }
    }

    /// Get human-readable name
    pub fn name(&self) -> &str {
        match self {
            Language::TypeScript => "TypeScript",
            Language::JavaScript => "JavaScript",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An import statement recorded for a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    /// Module specifier, e.g. `./user` or `react`
    pub module: String,
    /// Imported binding names
    pub names: Vec<String>,
    /// `import type { ... }`
    pub is_type_only: bool,
}

impl ImportInfo {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            names: Vec::new(),
            is_type_only: false,
        }
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    pub fn as_type_only(mut self) -> Self {
        self.is_type_only = true;
        self
    }
}

/// An export recorded for a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInfo {
    pub name: String,
    pub is_default: bool,
}

impl ExportInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_default: false,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Everything an extractor produces for one file.
#[derive(Debug, Clone, Default)]
pub struct ExtractedFile {
    pub symbols: Vec<Symbol>,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,
    pub type_annotations: Option<HashMap<String, String>>,
}

/// Errors specific to extraction
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Syntax error at line {line}: {reason}")]
    Syntax { line: u32, reason: String },

    #[error("Invalid UTF-8 in source file")]
    InvalidUtf8,

    #[error("Unsupported file type: {}", path.display())]
    Unsupported { path: PathBuf },
}

/// Pure extraction function the scan pipeline drives.
///
/// Implementations parse `bytes` (the content of `path`) and return the
/// file's symbols and metadata. Called concurrently from worker threads.
pub trait SymbolExtractor: Send + Sync {
    fn extract(&self, path: &Path, bytes: &[u8]) -> Result<ExtractedFile, ExtractError>;
}
