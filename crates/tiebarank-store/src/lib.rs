//! SQLite persistence for members, level dividers, and daily snapshots.

pub mod db;
pub mod dividers;
pub mod error;
pub mod members;
pub mod snapshots;
pub mod store;

pub use error::{Result, StoreError};
pub use snapshots::StoredSnapshot;
pub use store::RankStore;
