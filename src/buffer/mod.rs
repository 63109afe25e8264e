pub mod buffer_pool_manager;
pub mod clock_replacer;
pub mod lru_replacer;
pub mod replacer;

pub use buffer_pool_manager::BufferPoolManager;
pub use replacer::{Replacer, ReplacerPolicy, StorageConfig};
