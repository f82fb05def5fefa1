//! Memory-mapped source file cache with in-memory fallback
//!
//! Byte ranges of source files resolve in O(1) against read-only private
//! mappings. When mapping fails (platform or permission limits) the file is
//! read whole into memory and served through the same interface; callers
//! never learn which backing they got. File-count and virtual-memory
//! limits are enforced before any mapping is allocated.

use crate::error::{IndexError, IndexResult};
use crate::indexing::timestamp_millis;
use memmap2::Mmap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// File cache limits and switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCacheConfig {
    /// Maximum number of cached files (0 = unlimited)
    #[serde(default)]
    pub max_files: usize,
    /// Virtual address space budget in MB, not resident memory
    /// (0 = unlimited)
    #[serde(default)]
    pub max_memory_mb: u64,
    /// Record hit/miss/load counters
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        Self {
            max_files: 0,
            max_memory_mb: 0,
            enable_metrics: true,
        }
    }
}

enum FileBacking {
    /// Read-only private mapping
    Mapped(Mmap),
    /// Whole-file buffer used when mapping failed
    Buffered(Vec<u8>),
    /// Zero-length file, no region
    Empty,
}

/// A cached file: its byte region plus load metadata. The descriptor is
/// retained for mapped entries and absent for fallback entries.
pub struct MappedFile {
    path: PathBuf,
    backing: FileBacking,
    file: Option<File>,
    size: u64,
    mapped_at_ms: u64,
}

impl MappedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file's bytes, regardless of backing.
    pub fn data(&self) -> &[u8] {
        match &self.backing {
            FileBacking::Mapped(mmap) => mmap,
            FileBacking::Buffered(buf) => buf,
            FileBacking::Empty => &[],
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, FileBacking::Mapped(_))
    }

    pub fn has_descriptor(&self) -> bool {
        self.file.is_some()
    }

    pub fn mapped_at_ms(&self) -> u64 {
        self.mapped_at_ms
    }
}

impl std::fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedFile")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("is_mapped", &self.is_mapped())
            .field("mapped_at_ms", &self.mapped_at_ms)
            .finish()
    }
}

/// Counter snapshot plus the currently mapped total.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCacheStats {
    pub files_loaded: u64,
    pub files_cached: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub mmap_failures: u64,
    pub total_mapped_mb: u64,
}

struct CacheMaps {
    mapped: HashMap<PathBuf, Arc<MappedFile>>,
    fallback: HashMap<PathBuf, Arc<MappedFile>>,
}

impl CacheMaps {
    fn lookup(&self, path: &Path) -> Option<&Arc<MappedFile>> {
        self.mapped.get(path).or_else(|| self.fallback.get(path))
    }

    fn len(&self) -> usize {
        self.mapped.len() + self.fallback.len()
    }

    fn total_bytes(&self) -> u64 {
        self.mapped
            .values()
            .chain(self.fallback.values())
            .map(|f| f.size)
            .sum()
    }
}

#[derive(Default)]
struct CacheMetrics {
    files_loaded: u64,
    cache_hits: u64,
    cache_misses: u64,
    mmap_failures: u64,
}

/// Thread-safe mmap-backed file cache.
///
/// One read-write lock guards both maps; metrics sit behind their own
/// mutex so stat readers do not contend with loads.
pub struct FileCache {
    config: FileCacheConfig,
    maps: RwLock<CacheMaps>,
    metrics: Mutex<CacheMetrics>,
    closed: AtomicBool,
}

impl FileCache {
    pub fn new(config: FileCacheConfig) -> Self {
        Self {
            config,
            maps: RwLock::new(CacheMaps {
                mapped: HashMap::new(),
                fallback: HashMap::new(),
            }),
            metrics: Mutex::new(CacheMetrics::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// Fetch a file, loading it lazily on first access.
    ///
    /// Double-checked: a shared-lock probe of both maps first, then an
    /// exclusive re-check before the load. Limits are validated before the
    /// mapping is allocated; a file rejected by a limit is not loaded and
    /// only counts as a miss.
    pub fn get(&self, path: &Path) -> IndexResult<Arc<MappedFile>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(IndexError::Closed {
                component: "file cache",
            });
        }

        let cached = { self.maps.read().lookup(path).cloned() };
        if let Some(entry) = cached {
            self.record(|m| m.cache_hits += 1);
            return Ok(entry);
        }

        let mut maps = self.maps.write();
        if let Some(entry) = maps.lookup(path).cloned() {
            self.record(|m| m.cache_hits += 1);
            return Ok(entry);
        }

        self.record(|m| m.cache_misses += 1);
        self.load(&mut maps, path)
    }

    /// Extract `data[start_byte..end_byte]` from a file as a string.
    ///
    /// `(0, 0)` means the whole file and short-circuits range validation,
    /// so an empty file yields `""`. Otherwise `end <= start` and
    /// `end > size` are invalid ranges.
    pub fn fetch_code(&self, path: &Path, start_byte: usize, end_byte: usize) -> IndexResult<String> {
        let entry = self.get(path)?;
        let data = entry.data();

        if start_byte == 0 && end_byte == 0 {
            return Ok(String::from_utf8_lossy(data).into_owned());
        }

        if end_byte <= start_byte || end_byte as u64 > entry.size() {
            return Err(IndexError::InvalidRange {
                path: path.to_path_buf(),
                start: start_byte,
                end: end_byte,
                size: entry.size(),
            });
        }

        Ok(String::from_utf8_lossy(&data[start_byte..end_byte]).into_owned())
    }

    /// Number of cached entries across both maps.
    pub fn size(&self) -> usize {
        self.maps.read().len()
    }

    pub fn stats(&self) -> FileCacheStats {
        let (files_cached, total_mapped_mb) = {
            let maps = self.maps.read();
            (maps.len(), maps.total_bytes() / BYTES_PER_MB)
        };
        let metrics = self.metrics.lock();
        FileCacheStats {
            files_loaded: metrics.files_loaded,
            files_cached,
            cache_hits: metrics.cache_hits,
            cache_misses: metrics.cache_misses,
            mmap_failures: metrics.mmap_failures,
            total_mapped_mb,
        }
    }

    /// Unmap all regions and close all descriptors. Idempotent; subsequent
    /// `get` calls fail with `Closed`.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut maps = self.maps.write();
        let count = maps.len();
        maps.mapped.clear();
        maps.fallback.clear();
        tracing::debug!(files = count, "file cache closed");
    }

    fn load(&self, maps: &mut CacheMaps, path: &Path) -> IndexResult<Arc<MappedFile>> {
        let metadata = std::fs::metadata(path).map_err(|e| IndexError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let size = metadata.len();

        let current = maps.len();
        if self.config.max_files > 0 && current >= self.config.max_files {
            return Err(IndexError::FileLimitReached {
                current,
                limit: self.config.max_files,
            });
        }

        if self.config.max_memory_mb > 0 {
            let projected_mb = (maps.total_bytes() + size) / BYTES_PER_MB;
            if projected_mb >= self.config.max_memory_mb {
                return Err(IndexError::MemoryLimitReached {
                    projected_mb,
                    limit_mb: self.config.max_memory_mb,
                });
            }
        }

        let file = File::open(path).map_err(|e| IndexError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        if size == 0 {
            let entry = Arc::new(MappedFile {
                path: path.to_path_buf(),
                backing: FileBacking::Empty,
                file: Some(file),
                size: 0,
                mapped_at_ms: timestamp_millis(),
            });
            maps.mapped.insert(path.to_path_buf(), Arc::clone(&entry));
            self.record(|m| m.files_loaded += 1);
            return Ok(entry);
        }

        // Safety: the mapping is read-only and private; concurrent
        // truncation of the underlying file is outside this crate's
        // contract, as with any mmap-based reader.
        match unsafe { Mmap::map(&file) } {
            Ok(mmap) => {
                let entry = Arc::new(MappedFile {
                    path: path.to_path_buf(),
                    backing: FileBacking::Mapped(mmap),
                    file: Some(file),
                    size,
                    mapped_at_ms: timestamp_millis(),
                });
                maps.mapped.insert(path.to_path_buf(), Arc::clone(&entry));
                self.record(|m| m.files_loaded += 1);
                tracing::debug!(path = %path.display(), size, "mapped file");
                Ok(entry)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "mmap failed, falling back to in-memory read"
                );
                drop(file);
                let buf = std::fs::read(path).map_err(|e| IndexError::FileRead {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                let entry = Arc::new(MappedFile {
                    path: path.to_path_buf(),
                    backing: FileBacking::Buffered(buf),
                    file: None,
                    size,
                    mapped_at_ms: timestamp_millis(),
                });
                maps.fallback.insert(path.to_path_buf(), Arc::clone(&entry));
                self.record(|m| {
                    m.mmap_failures += 1;
                    m.files_loaded += 1;
                });
                Ok(entry)
            }
        }
    }

    fn record(&self, update: impl FnOnce(&mut CacheMetrics)) {
        if self.config.enable_metrics {
            update(&mut self.metrics.lock());
        }
    }
}

impl Default for FileCache {
    fn default() -> Self {
        Self::new(FileCacheConfig::default())
    }
}
