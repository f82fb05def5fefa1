//! Concurrent symbol index with an LRU-bounded per-file payload cache
//!
//! Qualified names resolve in O(1) through a single map guarded by one
//! read-write lock. The per-file `FileSymbols` payload lives in a bounded
//! LRU; eviction drops only the payload, never the name bindings, so
//! lookups survive cache pressure. Invalidation is lazy: a dirty mark
//! defers recomputation to the next add.

use crate::error::{IndexError, IndexResult};
use crate::indexing::lru::LruCache;
use crate::parsing::{ExportInfo, ImportInfo};
use crate::symbol::{FileSymbols, Symbol};
use crate::types::CompactString;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Coarse per-symbol memory estimate in bytes
const SYMBOL_MEMORY_BYTES: u64 = 200;
/// Coarse per-cached-file memory estimate in bytes (500 KiB)
const CACHED_FILE_MEMORY_BYTES: u64 = 500 * 1024;

/// All map state changes under one exclusive lock, so the qualified-name
/// map never observes a partially-applied file update.
struct IndexState {
    /// Qualified name -> symbol. Not subject to LRU eviction.
    symbols: HashMap<CompactString, Symbol>,
    /// Per-file payload, bounded by `max_cached_files`.
    file_cache: LruCache<PathBuf, Arc<FileSymbols>>,
    /// Reverse index: owning file -> qualified names, for O(k) purge.
    file_to_symbols: HashMap<PathBuf, Vec<CompactString>>,
    /// Files flagged for recomputation but still resolvable.
    dirty_files: HashSet<PathBuf>,
}

/// Snapshot of index counters and derived rates.
#[derive(Debug, Clone, Default)]
pub struct SymbolIndexStats {
    pub total_symbols: usize,
    pub cached_files: usize,
    pub dirty_files: usize,
    pub indexed_files: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub cache_hit_rate: f64,
    pub average_index_time_ms: f64,
    pub estimated_memory_bytes: u64,
}

/// Thread-safe symbol index keyed by fully-qualified name.
pub struct SymbolIndex {
    state: RwLock<IndexState>,
    indexed_files: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    evictions: AtomicU64,
    total_index_micros: AtomicU64,
    closed: AtomicBool,
}

impl SymbolIndex {
    /// Create an index whose per-file payload cache holds at most
    /// `max_cached_files` entries (0 = unbounded).
    pub fn new(max_cached_files: usize) -> Self {
        Self {
            state: RwLock::new(IndexState {
                symbols: HashMap::new(),
                file_cache: LruCache::new(max_cached_files),
                file_to_symbols: HashMap::new(),
                dirty_files: HashSet::new(),
            }),
            indexed_files: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            total_index_micros: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Index a file's symbols, replacing any prior state for the path.
    ///
    /// After this returns, every qualified name in `symbols` resolves via
    /// [`get_symbol`](Self::get_symbol), names previously owned by the path
    /// but absent from `symbols` no longer resolve, and the path is not
    /// dirty.
    pub fn add_file_symbols(
        &self,
        path: impl Into<PathBuf>,
        symbols: Vec<Symbol>,
        imports: Vec<ImportInfo>,
        exports: Vec<ExportInfo>,
        type_annotations: Option<HashMap<String, String>>,
    ) -> IndexResult<Arc<FileSymbols>> {
        self.add_inner(path.into(), symbols, imports, exports, type_annotations, None)
    }

    /// Like [`add_file_symbols`](Self::add_file_symbols), also recording the
    /// SHA-256 hex digest of the file content for change detection.
    pub fn add_file_symbols_with_hash(
        &self,
        path: impl Into<PathBuf>,
        symbols: Vec<Symbol>,
        imports: Vec<ImportInfo>,
        exports: Vec<ExportInfo>,
        type_annotations: Option<HashMap<String, String>>,
        content_hash: String,
    ) -> IndexResult<Arc<FileSymbols>> {
        self.add_inner(
            path.into(),
            symbols,
            imports,
            exports,
            type_annotations,
            Some(content_hash),
        )
    }

    fn add_inner(
        &self,
        path: PathBuf,
        symbols: Vec<Symbol>,
        imports: Vec<ImportInfo>,
        exports: Vec<ExportInfo>,
        type_annotations: Option<HashMap<String, String>>,
        content_hash: Option<String>,
    ) -> IndexResult<Arc<FileSymbols>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(IndexError::Closed {
                component: "symbol index",
            });
        }

        let start = Instant::now();

        let mut file_symbols = FileSymbols::new(
            path.clone(),
            symbols,
            imports,
            exports,
            type_annotations,
        );
        if let Some(hash) = content_hash {
            file_symbols = file_symbols.with_content_hash(hash);
        }
        let file_symbols = Arc::new(file_symbols);

        {
            let mut state = self.state.write();

            // Purge all prior state for the path before inserting the new
            // bindings; both halves happen under the same exclusive lock.
            state.file_cache.remove(&path);
            if let Some(old_names) = state.file_to_symbols.remove(&path) {
                for name in &old_names {
                    state.symbols.remove(name);
                }
            }
            state.dirty_files.remove(&path);

            let mut names = Vec::with_capacity(file_symbols.symbols.len());
            for symbol in &file_symbols.symbols {
                names.push(symbol.qualified_name.clone());
                state
                    .symbols
                    .insert(symbol.qualified_name.clone(), symbol.clone());
            }
            state.file_to_symbols.insert(path.clone(), names);

            if state
                .file_cache
                .insert(path, Arc::clone(&file_symbols))
                .is_some()
            {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.indexed_files.fetch_add(1, Ordering::Relaxed);
        self.total_index_micros
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);

        Ok(file_symbols)
    }

    /// O(1) lookup by fully-qualified name. Does not touch LRU recency.
    pub fn get_symbol(&self, qualified_name: &str) -> Option<Symbol> {
        self.state.read().symbols.get(qualified_name).cloned()
    }

    /// O(1) lookup of a file's cached payload, refreshing its recency.
    ///
    /// Returns `None` when the payload was evicted or never added; either
    /// way the call is counted toward hit/miss statistics.
    pub fn get_file_symbols(&self, path: &Path) -> Option<Arc<FileSymbols>> {
        let entry = {
            let mut state = self.state.write();
            state.file_cache.get(&path.to_path_buf()).cloned()
        };
        match entry {
            Some(_) => self.cache_hits.fetch_add(1, Ordering::Relaxed),
            None => self.cache_misses.fetch_add(1, Ordering::Relaxed),
        };
        entry
    }

    /// Snapshot of all cached payloads, without biasing eviction order.
    pub fn get_all_file_symbols(&self) -> Vec<Arc<FileSymbols>> {
        let state = self.state.read();
        state
            .file_cache
            .keys()
            .filter_map(|k| state.file_cache.peek(k))
            .cloned()
            .collect()
    }

    /// O(n) scan over all indexed symbols.
    ///
    /// Iteration order is the map's and may change between calls; callers
    /// must not depend on it.
    pub fn find_symbols(&self, predicate: impl Fn(&Symbol) -> bool) -> Vec<Symbol> {
        let state = self.state.read();
        let mut matches = Vec::with_capacity(100);
        for symbol in state.symbols.values() {
            if predicate(symbol) {
                matches.push(symbol.clone());
            }
        }
        matches
    }

    /// Flag a file for recomputation without evicting anything.
    ///
    /// Symbols owned by the file stay resolvable until the next
    /// [`add_file_symbols`](Self::add_file_symbols) or
    /// [`remove_file`](Self::remove_file). Idempotent.
    pub fn invalidate_file(&self, path: &Path) {
        self.state.write().dirty_files.insert(path.to_path_buf());
    }

    pub fn is_dirty(&self, path: &Path) -> bool {
        self.state.read().dirty_files.contains(path)
    }

    /// Remove every trace of a file: payload, name bindings, dirty flag.
    /// Idempotent for paths that were never added.
    pub fn remove_file(&self, path: &Path) {
        let mut state = self.state.write();
        state.file_cache.remove(&path.to_path_buf());
        if let Some(names) = state.file_to_symbols.remove(path) {
            for name in &names {
                state.symbols.remove(name);
            }
        }
        state.dirty_files.remove(path);
    }

    /// Annotated type of `var_name` in `path`, when the payload is still
    /// cached. Does not refresh recency.
    pub fn get_type_annotation(&self, path: &Path, var_name: &str) -> Option<String> {
        let state = self.state.read();
        state
            .file_cache
            .peek(&path.to_path_buf())?
            .type_annotations
            .as_ref()?
            .get(var_name)
            .cloned()
    }

    pub fn get_stats(&self) -> SymbolIndexStats {
        let (total_symbols, cached_files, dirty_files) = {
            let state = self.state.read();
            (
                state.symbols.len(),
                state.file_cache.len(),
                state.dirty_files.len(),
            )
        };

        let indexed_files = self.indexed_files.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let total_micros = self.total_index_micros.load(Ordering::Relaxed);

        let lookups = cache_hits + cache_misses;
        let cache_hit_rate = if lookups > 0 {
            cache_hits as f64 / lookups as f64
        } else {
            0.0
        };
        let average_index_time_ms = if indexed_files > 0 {
            total_micros as f64 / indexed_files as f64 / 1000.0
        } else {
            0.0
        };

        SymbolIndexStats {
            total_symbols,
            cached_files,
            dirty_files,
            indexed_files,
            cache_hits,
            cache_misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            cache_hit_rate,
            average_index_time_ms,
            estimated_memory_bytes: SYMBOL_MEMORY_BYTES * total_symbols as u64
                + CACHED_FILE_MEMORY_BYTES * cached_files as u64,
        }
    }

    /// Purge all state. Subsequent adds fail with `Closed`; lookups return
    /// absent. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut state = self.state.write();
        state.symbols.clear();
        state.file_cache.clear();
        state.file_to_symbols.clear();
        state.dirty_files.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Location, Range, SymbolKind};

    /// Synthetic symbols with qualified names `{prefix}.Symbol{i}`.
    fn make_symbols(prefix: &str, file: &str, count: usize) -> Vec<Symbol> {
        (0..count)
            .map(|i| {
                Symbol::new(
                    format!("Symbol{i}"),
                    format!("{prefix}.Symbol{i}"),
                    SymbolKind::Function,
                    Location::new(file, Range::new(i as u32 + 1, 0, i as u32 + 1, 10)),
                )
                .with_parameters(vec!["input: string".into()])
                .with_return_type("void")
            })
            .collect()
    }

    #[test]
    fn test_basic_add_and_get() {
        let index = SymbolIndex::new(10);
        index
            .add_file_symbols("F.ts", make_symbols("F", "F.ts", 10), vec![], vec![], None)
            .unwrap();

        assert!(index.get_symbol("F.Symbol5").is_some());
        assert!(index.get_symbol("F.Symbol10").is_none());

        let stats = index.get_stats();
        assert_eq!(stats.total_symbols, 10);
        assert_eq!(stats.cached_files, 1);
        assert_eq!(stats.indexed_files, 1);
    }

    #[test]
    fn test_lru_eviction_preserves_lookups() {
        let index = SymbolIndex::new(10);
        for i in 0..15 {
            let file = format!("File{i}.ts");
            let prefix = format!("File{i}");
            index
                .add_file_symbols(&file, make_symbols(&prefix, &file, 3), vec![], vec![], None)
                .unwrap();
        }

        let stats = index.get_stats();
        assert_eq!(stats.cached_files, 10);
        assert_eq!(stats.evictions, 5);
        assert_eq!(stats.total_symbols, 45);
        assert_eq!(stats.indexed_files, 15);

        // Payload of File0 was evicted but its names still resolve
        assert!(index.get_symbol("File0.Symbol0").is_some());
        assert!(index.get_file_symbols(Path::new("File0.ts")).is_none());
        assert!(index.get_file_symbols(Path::new("File14.ts")).is_some());
    }

    #[test]
    fn test_replacement_on_readd() {
        let index = SymbolIndex::new(10);
        index
            .add_file_symbols(
                "Dup.ts",
                make_symbols("Dup", "Dup.ts", 3),
                vec![],
                vec![],
                None,
            )
            .unwrap();
        index
            .add_file_symbols(
                "Dup.ts",
                make_symbols("Dup2", "Dup.ts", 3),
                vec![],
                vec![],
                None,
            )
            .unwrap();

        assert!(index.get_symbol("Dup.Symbol0").is_none());
        assert!(index.get_symbol("Dup2.Symbol0").is_some());

        let stats = index.get_stats();
        assert_eq!(stats.total_symbols, 3);
        assert_eq!(stats.cached_files, 1);
        assert_eq!(stats.indexed_files, 2);
        // Replacement purges the old entry first; nothing is evicted
        assert_eq!(stats.evictions, 0);
    }

    #[test]
    fn test_lazy_invalidation() {
        let index = SymbolIndex::new(10);
        let path = Path::new("Svc.ts");
        index
            .add_file_symbols("Svc.ts", make_symbols("Svc", "Svc.ts", 2), vec![], vec![], None)
            .unwrap();

        index.invalidate_file(path);
        assert!(index.is_dirty(path));
        // Dirty marking does not evict or remove anything
        assert!(index.get_symbol("Svc.Symbol0").is_some());
        assert!(index.get_file_symbols(path).is_some());

        // Idempotent
        index.invalidate_file(path);
        assert_eq!(index.get_stats().dirty_files, 1);

        // Re-add clears the flag
        index
            .add_file_symbols("Svc.ts", make_symbols("Svc", "Svc.ts", 2), vec![], vec![], None)
            .unwrap();
        assert!(!index.is_dirty(path));
    }

    #[test]
    fn test_remove_file() {
        let index = SymbolIndex::new(10);
        let path = Path::new("Gone.ts");
        index
            .add_file_symbols(
                "Gone.ts",
                make_symbols("Gone", "Gone.ts", 3),
                vec![],
                vec![],
                None,
            )
            .unwrap();
        index.invalidate_file(path);

        index.remove_file(path);
        assert!(index.get_symbol("Gone.Symbol0").is_none());
        assert!(index.get_file_symbols(path).is_none());
        assert!(!index.is_dirty(path));
        assert_eq!(index.get_stats().total_symbols, 0);

        // Idempotent for absent paths
        index.remove_file(path);
        index.remove_file(Path::new("NeverAdded.ts"));
    }

    #[test]
    fn test_hit_miss_accounting() {
        let index = SymbolIndex::new(10);
        index
            .add_file_symbols("A.ts", make_symbols("A", "A.ts", 1), vec![], vec![], None)
            .unwrap();

        assert!(index.get_file_symbols(Path::new("A.ts")).is_some());
        assert!(index.get_file_symbols(Path::new("A.ts")).is_some());
        assert!(index.get_file_symbols(Path::new("B.ts")).is_none());

        let stats = index.get_stats();
        assert_eq!(stats.cache_hits, 2);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.cache_hits + stats.cache_misses, 3);
        assert!((stats.cache_hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_hit_rate_zero_denominator() {
        let index = SymbolIndex::new(10);
        let stats = index.get_stats();
        assert_eq!(stats.cache_hit_rate, 0.0);
        assert_eq!(stats.average_index_time_ms, 0.0);
    }

    #[test]
    fn test_type_annotations() {
        let index = SymbolIndex::new(10);
        let mut annotations = HashMap::new();
        annotations.insert("user".to_string(), "User".to_string());
        annotations.insert("count".to_string(), "number".to_string());

        index
            .add_file_symbols(
                "T.ts",
                make_symbols("T", "T.ts", 1),
                vec![],
                vec![],
                Some(annotations),
            )
            .unwrap();

        let path = Path::new("T.ts");
        assert_eq!(
            index.get_type_annotation(path, "user"),
            Some("User".to_string())
        );
        assert_eq!(index.get_type_annotation(path, "missing"), None);
        assert_eq!(index.get_type_annotation(Path::new("other.ts"), "user"), None);
    }

    #[test]
    fn test_type_annotation_gone_after_eviction() {
        let index = SymbolIndex::new(1);
        let mut annotations = HashMap::new();
        annotations.insert("x".to_string(), "number".to_string());
        index
            .add_file_symbols(
                "First.ts",
                make_symbols("First", "First.ts", 1),
                vec![],
                vec![],
                Some(annotations),
            )
            .unwrap();
        index
            .add_file_symbols(
                "Second.ts",
                make_symbols("Second", "Second.ts", 1),
                vec![],
                vec![],
                None,
            )
            .unwrap();

        // Eviction lost the payload, so the annotation is gone...
        assert_eq!(index.get_type_annotation(Path::new("First.ts"), "x"), None);
        // ...but the symbol itself still resolves
        assert!(index.get_symbol("First.Symbol0").is_some());
    }

    #[test]
    fn test_get_all_file_symbols_does_not_bias_eviction() {
        let index = SymbolIndex::new(2);
        index
            .add_file_symbols("A.ts", make_symbols("A", "A.ts", 1), vec![], vec![], None)
            .unwrap();
        index
            .add_file_symbols("B.ts", make_symbols("B", "B.ts", 1), vec![], vec![], None)
            .unwrap();

        let all = index.get_all_file_symbols();
        assert_eq!(all.len(), 2);

        // The snapshot peeked, so "A" is still the LRU victim
        index
            .add_file_symbols("C.ts", make_symbols("C", "C.ts", 1), vec![], vec![], None)
            .unwrap();
        assert!(index.get_file_symbols(Path::new("A.ts")).is_none());
        assert!(index.get_file_symbols(Path::new("B.ts")).is_some());
    }

    #[test]
    fn test_find_symbols() {
        let index = SymbolIndex::new(10);
        index
            .add_file_symbols("A.ts", make_symbols("A", "A.ts", 5), vec![], vec![], None)
            .unwrap();
        index
            .add_file_symbols("B.ts", make_symbols("B", "B.ts", 5), vec![], vec![], None)
            .unwrap();

        let from_a = index.find_symbols(|s| s.qualified_name.starts_with("A."));
        assert_eq!(from_a.len(), 5);

        let all = index.find_symbols(|_| true);
        assert_eq!(all.len(), 10);

        let none = index.find_symbols(|s| s.is_exported);
        assert!(none.is_empty());
    }

    #[test]
    fn test_content_hash_recorded() {
        let index = SymbolIndex::new(10);
        let hash = crate::indexing::sha256_hex(b"export const x = 1;\n");
        let fs = index
            .add_file_symbols_with_hash(
                "H.ts",
                make_symbols("H", "H.ts", 1),
                vec![],
                vec![],
                None,
                hash.clone(),
            )
            .unwrap();
        assert_eq!(fs.content_hash.as_deref(), Some(hash.as_str()));
    }

    #[test]
    fn test_memory_estimate() {
        let index = SymbolIndex::new(10);
        index
            .add_file_symbols("M.ts", make_symbols("M", "M.ts", 4), vec![], vec![], None)
            .unwrap();

        let stats = index.get_stats();
        assert_eq!(stats.estimated_memory_bytes, 200 * 4 + 500 * 1024);
    }

    #[test]
    fn test_close() {
        let index = SymbolIndex::new(10);
        index
            .add_file_symbols("X.ts", make_symbols("X", "X.ts", 2), vec![], vec![], None)
            .unwrap();

        index.close();
        assert!(index.get_symbol("X.Symbol0").is_none());
        assert!(index.get_all_file_symbols().is_empty());

        let err = index
            .add_file_symbols("Y.ts", make_symbols("Y", "Y.ts", 1), vec![], vec![], None)
            .unwrap_err();
        assert!(matches!(err, IndexError::Closed { .. }));

        // Idempotent
        index.close();
    }
}
