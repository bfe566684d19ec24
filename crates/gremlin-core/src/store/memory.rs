// # Memory Key-Value Store
//
// In-memory implementation of KvStore.
//
// ## Purpose
//
// Keeps the whole value tree in process memory. Used by the test suites and
// for local runs without a database; nothing survives a restart.
//
// ## Tree Semantics
//
// - Paths address nodes of a JSON tree; interior nodes are objects
// - Writing `null` removes the node
// - Deleting a node prunes parents that become empty
// - Reading an interior node returns the whole subtree
//
// ## Tail Subscriptions
//
// A subscriber first receives up to `limit` of the newest existing children,
// then every child created under the watched path afterwards. Children added
// with [`MemoryKvStore::push`] get keys that sort in append order.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::Error;
use crate::config::StoreConfig;
use crate::traits::kv_store::{KvStore, KvStoreFactory, TailEntry, TailStream};

#[derive(Debug, Default)]
struct Inner {
    root: Map<String, Value>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<TailEntry>>>,
}

/// In-memory key-value store implementation
///
/// # Example
///
/// ```rust,no_run
/// use gremlin_core::store::MemoryKvStore;
/// use gremlin_core::traits::KvStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryKvStore::new();
///
///     store.set("bans/address/1_2_3_4", serde_json::json!({ "banned_by": "mod" })).await?;
///     let bans = store.get("bans/address").await?;
///     assert!(bans.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    inner: Arc<Mutex<Inner>>,
    push_counter: Arc<AtomicU64>,
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn sorted_tail(children: &Map<String, Value>, limit: usize) -> Vec<TailEntry> {
    let mut entries: Vec<(&String, &Value)> = children.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    let skip = entries.len().saturating_sub(limit);
    entries
        .into_iter()
        .skip(skip)
        .map(|(k, v)| TailEntry::new(k.clone(), v.clone()))
        .collect()
}

/// Remove the node at `segs` below `node`; returns true when `node` ends up empty
fn remove_node(node: &mut Map<String, Value>, segs: &[&str]) -> bool {
    match segs {
        [] => {}
        [last] => {
            node.remove(*last);
        }
        [first, rest @ ..] => {
            let emptied = match node.get_mut(*first) {
                Some(Value::Object(child)) => remove_node(child, rest),
                _ => false,
            };
            if emptied {
                node.remove(*first);
            }
        }
    }
    node.is_empty()
}

impl MemoryKvStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append `value` as a new child of `path` and return its key
    ///
    /// Keys sort in append order, like database push ids.
    pub async fn push(&self, path: &str, value: Value) -> Result<String, Error> {
        let seq = self.push_counter.fetch_add(1, Ordering::SeqCst);
        let key = format!("k{:020}", seq);
        let child = crate::store::join_path(&[path, &key]);
        self.set(&child, value).await?;
        Ok(key)
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.lock().root.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, Error> {
        let guard = self.lock();
        let segs = segments(path);

        let Some((first, rest)) = segs.split_first() else {
            if guard.root.is_empty() {
                return Ok(None);
            }
            return Ok(Some(Value::Object(guard.root.clone())));
        };

        let mut node = guard.root.get(*first);
        for seg in rest {
            node = node.and_then(|v| v.get(*seg));
        }

        match node {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(value.clone())),
        }
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), Error> {
        if value.is_null() {
            return self.delete(path).await;
        }

        let segs = segments(path);
        let Some((last, parents)) = segs.split_last() else {
            return Err(Error::store("cannot overwrite the store root"));
        };

        let mut guard = self.lock();
        let inner = &mut *guard;

        let mut node = &mut inner.root;
        for seg in parents {
            let entry = node
                .entry(seg.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            node = entry
                .as_object_mut()
                .ok_or_else(|| Error::store(format!("{} is not an object", seg)))?;
        }

        let created = node.insert(last.to_string(), value.clone()).is_none();

        if created {
            let parent_path = parents.join("/");
            if let Some(senders) = inner.subscribers.get_mut(&parent_path) {
                let entry = TailEntry::new(last.to_string(), value);
                senders.retain(|tx| tx.send(entry.clone()).is_ok());
            }
        }

        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), Error> {
        let segs = segments(path);
        if segs.is_empty() {
            return Err(Error::store("cannot delete the store root"));
        }
        let mut guard = self.lock();
        remove_node(&mut guard.root, &segs);
        Ok(())
    }

    fn subscribe_tail(&self, path: &str, limit: usize) -> TailStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let key = segments(path).join("/");

        let mut guard = self.lock();

        let mut node = Some(&guard.root);
        for seg in segments(path) {
            node = match node.and_then(|n| n.get(seg)) {
                Some(Value::Object(map)) => Some(map),
                _ => None,
            };
        }
        if let Some(children) = node {
            for entry in sorted_tail(children, limit) {
                let _ = tx.send(entry);
            }
        }

        guard.subscribers.entry(key).or_default().push(tx);

        Box::pin(UnboundedReceiverStream::new(rx))
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for creating memory stores
pub struct MemoryKvStoreFactory;

impl KvStoreFactory for MemoryKvStoreFactory {
    fn create(&self, config: &StoreConfig) -> Result<Arc<dyn KvStore>, Error> {
        match config {
            StoreConfig::Memory => Ok(Arc::new(MemoryKvStore::new())),
            _ => Err(Error::config("Invalid config for memory store")),
        }
    }
}
