pub mod file_cache;

pub use file_cache::{FileCache, FileCacheConfig, FileCacheStats, MappedFile};
