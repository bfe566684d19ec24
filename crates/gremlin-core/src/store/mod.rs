// # Key-Value Store Helpers and Implementations
//
// This module provides the in-memory KvStore implementation and typed
// read/write helpers shared by the registries.

pub mod memory;

pub use memory::{MemoryKvStore, MemoryKvStoreFactory};

use crate::error::Result;
use crate::traits::KvStore;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Join path segments with `/`, ignoring empty segments and stray slashes
///
/// ```
/// use gremlin_core::store::join_path;
///
/// assert_eq!(join_path(&["bans/address/", "1_2_3_4"]), "bans/address/1_2_3_4");
/// ```
pub fn join_path(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Read and deserialize the value at `path`
pub async fn get_json<T: DeserializeOwned>(store: &dyn KvStore, path: &str) -> Result<Option<T>> {
    match store.get(path).await? {
        None => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
    }
}

/// Serialize and write `value` at `path`
pub async fn set_json<T: Serialize>(store: &dyn KvStore, path: &str, value: &T) -> Result<()> {
    let value = serde_json::to_value(value)?;
    store.set(path, value).await
}
