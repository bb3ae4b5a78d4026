//! Storage backends and the in-memory token gateway.

pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
