use crate::indexing::timestamp_millis;
use crate::parsing::{ExportInfo, ImportInfo};
use crate::types::{CompactString, Location, SymbolKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A program symbol extracted from a source file.
///
/// `qualified_name` is the fully-qualified name (e.g. `UserService.getUser`)
/// and acts as the primary key inside the symbol index: adding a file
/// replaces any prior binding for that file's qualified names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: CompactString,
    pub qualified_name: CompactString,
    pub kind: SymbolKind,
    pub location: Location,
    pub is_exported: bool,
    pub parameters: Vec<Box<str>>,
    pub return_type: Option<Box<str>>,
}

impl Symbol {
    pub fn new(
        name: impl Into<CompactString>,
        qualified_name: impl Into<CompactString>,
        kind: SymbolKind,
        location: Location,
    ) -> Self {
        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            kind,
            location,
            is_exported: false,
            parameters: Vec::new(),
            return_type: None,
        }
    }

    pub fn exported(mut self) -> Self {
        self.is_exported = true;
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<Box<str>>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_return_type(mut self, return_type: impl Into<Box<str>>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }
}

/// Per-file payload held by the symbol index's LRU cache.
///
/// When the cache evicts an entry only this payload is lost; the qualified
/// names stay resolvable until the file is re-added or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSymbols {
    /// Absolute path of the source file
    pub path: PathBuf,
    /// Symbols in source order
    pub symbols: Vec<Symbol>,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,
    /// Variable name to annotated type, when the extractor recorded any
    pub type_annotations: Option<HashMap<String, String>>,
    /// Milliseconds since epoch at index time
    pub indexed_at_ms: u64,
    /// SHA-256 hex digest of the file content, when known
    pub content_hash: Option<String>,
    /// Approximate token count, used only by downstream chunking
    pub token_estimate: usize,
}

impl FileSymbols {
    pub fn new(
        path: impl Into<PathBuf>,
        symbols: Vec<Symbol>,
        imports: Vec<ImportInfo>,
        exports: Vec<ExportInfo>,
        type_annotations: Option<HashMap<String, String>>,
    ) -> Self {
        let token_estimate = estimate_tokens(&symbols);
        Self {
            path: path.into(),
            symbols,
            imports,
            exports,
            type_annotations,
            indexed_at_ms: timestamp_millis(),
            content_hash: None,
            token_estimate,
        }
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }
}

/// Rough token count for a file's symbols.
///
/// Each symbol contributes `10 * len(name) + 50 * |parameters| + 20` (the
/// last term only with a return type) characters, divided by four for a
/// token approximation. A heuristic, not a contract.
pub fn estimate_tokens(symbols: &[Symbol]) -> usize {
    let chars: usize = symbols
        .iter()
        .map(|s| {
            let ret = if s.return_type.is_some() { 20 } else { 0 };
            10 * s.name.len() + 50 * s.parameters.len() + ret
        })
        .sum();
    chars / 4
}
