pub mod config;
pub mod error;
pub mod indexing;
pub mod logging;
pub mod parsing;
pub mod storage;
pub mod symbol;
pub mod types;

pub use config::{IndexingConfig, LoggingConfig, Settings};
pub use error::{IndexError, IndexResult};
pub use indexing::{
    FileError, FileJob, FileResult, FileScanError, LruCache, ScanOptions, ScanStats, SymbolIndex,
    SymbolIndexStats, WorkerPool, WorkerPoolStats, WorkspaceScanner, optimal_pool_size,
    sha256_hex, timestamp_millis,
};
pub use parsing::{ExtractError, ExtractedFile, ExportInfo, ImportInfo, Language, SymbolExtractor};
pub use storage::{FileCache, FileCacheConfig, FileCacheStats, MappedFile};
pub use symbol::{FileSymbols, Symbol, estimate_tokens};
pub use types::{CompactString, Location, Range, SymbolKind, compact_string};
