//! Workspace scanner: glob discovery and the scan pipeline
//!
//! Discovery walks the tree once, pruning excluded directories before
//! descending and matching files against the include/exclude globs on
//! their forward-slashed relative paths. Processing fans the surviving
//! files out over a [`WorkerPool`] and streams results into the
//! [`SymbolIndex`]. The result collector starts before the first job is
//! submitted; with bounded jobs and results channels, submitting into a
//! full buffer while nothing drains results would wedge the pipeline.

use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::indexing::pool::{FileError, FileResult, WorkerPool};
use crate::indexing::symbol_index::SymbolIndex;
use crate::indexing::timestamp_millis;
use crate::parsing::SymbolExtractor;
use crate::storage::FileCache;
use crossbeam_channel::select;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// File types the TS/JS extractor understands.
pub const DEFAULT_INCLUDE_PATTERNS: &[&str] = &["**/*.ts", "**/*.tsx", "**/*.js", "**/*.jsx"];

/// Directories no workspace scan wants.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "node_modules/**",
    ".git/**",
    "dist/**",
    "build/**",
    ".vscode/**",
    "coverage/**",
    "out/**",
    ".next/**",
];

/// Options for a single workspace scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Include globs; empty accepts every file not excluded
    pub include: Vec<String>,
    /// Exclude globs; a matching directory skips its whole subtree
    pub exclude: Vec<String>,
    /// Honor .gitignore / global gitignore / .git/info/exclude
    pub respect_gitignore: bool,
    /// Maximum walk depth (0 = unlimited)
    pub max_depth: usize,
    pub follow_symlinks: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            include: DEFAULT_INCLUDE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            respect_gitignore: false,
            max_depth: 0,
            follow_symlinks: false,
        }
    }
}

impl ScanOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            include: settings.indexing.include_patterns.clone(),
            exclude: settings.indexing.exclude_patterns.clone(),
            respect_gitignore: settings.indexing.respect_gitignore,
            max_depth: settings.indexing.max_depth,
            follow_symlinks: settings.indexing.follow_symlinks,
        }
    }
}

/// A file that failed during the scan. The scan itself carries on.
#[derive(Debug, Clone)]
pub struct FileScanError {
    pub path: PathBuf,
    pub message: String,
}

/// Everything a finished scan reports.
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub files_discovered: usize,
    pub files_indexed: usize,
    pub files_failed: usize,
    pub files_skipped: usize,
    pub symbols_extracted: usize,
    pub imports_extracted: usize,
    pub exports_extracted: usize,
    pub discovery_ms: u64,
    pub indexing_ms: u64,
    pub total_ms: u64,
    pub average_file_time_ms: f64,
    pub files_per_second: f64,
    pub success_rate: f64,
    pub worker_count: usize,
    pub errors: Vec<FileScanError>,
    pub cancelled: bool,
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
}

/// Invoked from the collector thread as `(indexed, total, current_file)`.
pub type ProgressCallback = dyn Fn(usize, usize, &Path) + Send + Sync;

#[derive(Default)]
struct CollectorOutcome {
    indexed: usize,
    failed: usize,
    symbols: usize,
    imports: usize,
    exports: usize,
    errors: Vec<FileScanError>,
    cancelled: bool,
}

/// Scans a workspace tree and feeds the symbol index.
pub struct WorkspaceScanner {
    index: Arc<SymbolIndex>,
    extractor: Arc<dyn SymbolExtractor>,
    file_cache: Option<Arc<FileCache>>,
    /// Worker count, 0 = shared pool-sizing policy
    workers: usize,
}

impl WorkspaceScanner {
    pub fn new(index: Arc<SymbolIndex>, extractor: Arc<dyn SymbolExtractor>) -> Self {
        Self {
            index,
            extractor,
            file_cache: None,
            workers: 0,
        }
    }

    /// Route worker reads through a shared file cache.
    pub fn with_file_cache(mut self, cache: Arc<FileCache>) -> Self {
        self.file_cache = Some(cache);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Scan `root`: discover files, extract them in parallel, stream the
    /// results into the index.
    ///
    /// Pattern and walk-root failures abort with an error; per-file
    /// failures are recorded in [`ScanStats::errors`] and do not.
    pub fn scan(
        &self,
        root: &Path,
        options: &ScanOptions,
        progress: Option<&ProgressCallback>,
    ) -> IndexResult<ScanStats> {
        let started_at_ms = timestamp_millis();
        let total_timer = Instant::now();
        let mut stats = ScanStats {
            started_at_ms,
            ..Default::default()
        };

        let discovery_timer = Instant::now();
        let (files, skipped) = self.discover(root, options)?;
        stats.discovery_ms = discovery_timer.elapsed().as_millis() as u64;
        stats.files_discovered = files.len();
        stats.files_skipped = skipped;

        let mut pool = WorkerPool::new(self.workers, Arc::clone(&self.extractor));
        if let Some(cache) = &self.file_cache {
            pool = pool.with_file_cache(Arc::clone(cache));
        }
        pool.start();
        stats.worker_count = pool.workers();

        let total = files.len();
        let indexing_timer = Instant::now();

        let outcome = std::thread::scope(|scope| {
            let collector =
                scope.spawn(|| collect_results(&pool, &self.index, total, progress));

            for path in &files {
                if pool.submit(path.clone()).is_err() {
                    break;
                }
            }
            pool.finish_submitting();

            collector.join().unwrap_or_default()
        });

        let indexing_secs = indexing_timer.elapsed().as_secs_f64();
        stats.indexing_ms = indexing_timer.elapsed().as_millis() as u64;
        pool.stop();

        stats.files_indexed = outcome.indexed;
        stats.files_failed = outcome.failed;
        stats.symbols_extracted = outcome.symbols;
        stats.imports_extracted = outcome.imports;
        stats.exports_extracted = outcome.exports;
        stats.errors = outcome.errors;
        stats.cancelled = outcome.cancelled;

        stats.total_ms = total_timer.elapsed().as_millis() as u64;
        stats.average_file_time_ms = if stats.files_indexed > 0 {
            stats.indexing_ms as f64 / stats.files_indexed as f64
        } else {
            0.0
        };
        stats.files_per_second = if indexing_secs > 0.0 {
            stats.files_indexed as f64 / indexing_secs
        } else {
            0.0
        };
        stats.success_rate = if stats.files_discovered > 0 {
            stats.files_indexed as f64 / stats.files_discovered as f64
        } else {
            0.0
        };
        stats.finished_at_ms = timestamp_millis();

        tracing::info!(
            discovered = stats.files_discovered,
            indexed = stats.files_indexed,
            failed = stats.files_failed,
            skipped = stats.files_skipped,
            symbols = stats.symbols_extracted,
            elapsed_ms = stats.total_ms,
            "workspace scan complete"
        );

        Ok(stats)
    }

    /// Walk `root` and return the files to index plus the count of files
    /// seen but skipped by the patterns.
    fn discover(&self, root: &Path, options: &ScanOptions) -> IndexResult<(Vec<PathBuf>, usize)> {
        let include = compile_patterns(&options.include)?;
        let exclude = compile_exclude_patterns(&options.exclude)?;

        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(false) // exclusion is pattern-driven, walk dotfiles
            .git_ignore(options.respect_gitignore)
            .git_global(options.respect_gitignore)
            .git_exclude(options.respect_gitignore)
            .parents(false)
            .require_git(false)
            .follow_links(options.follow_symlinks);
        if options.max_depth > 0 {
            builder.max_depth(Some(options.max_depth));
        }

        // An excluded directory prunes its whole subtree before descent.
        let prune_root = root.to_path_buf();
        let prune_exclude = exclude.clone();
        builder.filter_entry(move |entry| {
            if !entry.file_type().is_some_and(|ft| ft.is_dir()) {
                return true;
            }
            match relative_slash_path(&prune_root, entry.path()) {
                Some(rel) if !rel.is_empty() => !prune_exclude.is_match(rel.as_str()),
                _ => true,
            }
        });

        let mut files = Vec::new();
        let mut skipped = 0usize;
        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let Some(rel) = relative_slash_path(root, entry.path()) else {
                continue;
            };
            if exclude.is_match(rel.as_str()) {
                skipped += 1;
                continue;
            }
            if !include.is_empty() && !include.is_match(rel.as_str()) {
                skipped += 1;
                continue;
            }
            files.push(entry.into_path());
        }

        Ok((files, skipped))
    }
}

fn collect_results(
    pool: &WorkerPool,
    index: &SymbolIndex,
    total: usize,
    progress: Option<&ProgressCallback>,
) -> CollectorOutcome {
    let mut out = CollectorOutcome::default();
    if total == 0 {
        return out;
    }

    let results = pool.results();
    let errors = pool.errors();

    while out.indexed + out.failed < total {
        select! {
            recv(results) -> msg => match msg {
                Ok(result) => handle_result(index, result, &mut out, total, progress),
                Err(_) => {
                    // Workers are gone; whatever errors were already
                    // buffered are all that is still coming.
                    for err in errors.try_iter() {
                        record_error(&mut out, err);
                    }
                    out.cancelled = pool.is_cancelled();
                    break;
                }
            },
            recv(errors) -> msg => match msg {
                Ok(err) => record_error(&mut out, err),
                Err(_) => {
                    for result in results.try_iter() {
                        handle_result(index, result, &mut out, total, progress);
                    }
                    out.cancelled = pool.is_cancelled();
                    break;
                }
            },
        }
    }

    out
}

fn handle_result(
    index: &SymbolIndex,
    result: FileResult,
    out: &mut CollectorOutcome,
    total: usize,
    progress: Option<&ProgressCallback>,
) {
    let FileResult {
        path,
        extracted,
        content_hash,
        ..
    } = result;

    match index.add_file_symbols_with_hash(
        &path,
        extracted.symbols,
        extracted.imports,
        extracted.exports,
        extracted.type_annotations,
        content_hash,
    ) {
        Ok(file_symbols) => {
            out.symbols += file_symbols.symbols.len();
            out.imports += file_symbols.imports.len();
            out.exports += file_symbols.exports.len();
            out.indexed += 1;
            if let Some(callback) = progress {
                callback(out.indexed, total, &path);
            }
        }
        Err(e) => {
            out.failed += 1;
            out.errors.push(FileScanError {
                path,
                message: e.to_string(),
            });
        }
    }
}

fn record_error(out: &mut CollectorOutcome, err: FileError) {
    tracing::warn!(path = %err.path.display(), error = %err.error, "file failed during scan");
    out.failed += 1;
    out.errors.push(FileScanError {
        path: err.path,
        message: err.error.to_string(),
    });
}

/// Compile globs with literal path separators (so `*` stays within one
/// component and `**` crosses them).
fn compile_patterns(patterns: &[String]) -> IndexResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(build_glob(pattern)?);
    }
    builder.build().map_err(|e| IndexError::PatternInvalid {
        pattern: patterns.join(", "),
        reason: e.to_string(),
    })
}

/// Like [`compile_patterns`], additionally matching the bare directory for
/// every `dir/**` pattern so subtree pruning can test the directory itself.
fn compile_exclude_patterns(patterns: &[String]) -> IndexResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(build_glob(pattern)?);
        if let Some(prefix) = pattern.strip_suffix("/**") {
            builder.add(build_glob(prefix)?);
        }
    }
    builder.build().map_err(|e| IndexError::PatternInvalid {
        pattern: patterns.join(", "),
        reason: e.to_string(),
    })
}

fn build_glob(pattern: &str) -> IndexResult<globset::Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| IndexError::PatternInvalid {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// Path relative to `root`, forward-slashed for glob matching. `None` when
/// `path` is outside `root`.
fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut out = String::new();
    for component in rel.components() {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    Some(out)
}
