//! Durable key-value storage behind the store.
//!
//! The store only ever sees [`KvStorage`]: an async-failure-prone, string
//! keyed medium. Two backends are provided, an in-memory map for tests and
//! ephemeral use, and a directory of checksummed files for real durability.

mod disk;
mod memory;

pub use disk::DiskStorage;
pub use memory::MemoryStorage;

use crate::error::Result;

/// Contract over a durable string-keyed storage medium.
///
/// Every value is an opaque serialized string. Any call may fail; the store
/// treats read failures as absent data and write failures as logged,
/// swallowed errors.
pub trait KvStorage: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}
