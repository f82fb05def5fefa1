pub mod file_info;
pub mod lru;
pub mod pool;
pub mod scanner;
pub mod symbol_index;

pub use file_info::{sha256_hex, timestamp_millis};
pub use lru::LruCache;
pub use pool::{FileError, FileJob, FileResult, WorkerPool, WorkerPoolStats};
pub use scanner::{
    DEFAULT_EXCLUDE_PATTERNS, DEFAULT_INCLUDE_PATTERNS, FileScanError, ProgressCallback,
    ScanOptions, ScanStats, WorkspaceScanner,
};
pub use symbol_index::{SymbolIndex, SymbolIndexStats};

/// Worker count shared by the scan pool and any parser pool an extractor
/// maintains: twice the core count, clamped to [4, 32]. The two sides must
/// agree or parser leases and job submissions block each other head-of-line.
pub fn optimal_pool_size() -> usize {
    (num_cpus::get() * 2).clamp(4, 32)
}
