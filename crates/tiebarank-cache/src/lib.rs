//! Cache-aside access over a byte-oriented key-value store.

pub mod aside;
pub mod error;
pub mod store;

pub use aside::CacheAside;
pub use error::{CacheError, Result};
pub use store::{KvStore, MemoryKv};
