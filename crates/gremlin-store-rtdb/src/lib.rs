// # Realtime Database REST Store
//
// KvStore backed by a realtime-database style REST API, where every node of
// the value tree is addressable as `{database_url}/{path}.json`.
//
// ## Operations
//
// | KvStore          | HTTP                                                   |
// |------------------|--------------------------------------------------------|
// | `get(path)`      | `GET {base}/{path}.json` (`null` body = absent)        |
// | `set(path, v)`   | `PUT {base}/{path}.json` with `v` as the body          |
// | `delete(path)`   | `DELETE {base}/{path}.json`                            |
// | `subscribe_tail` | polling `GET` with `orderBy="$key"` (see below)        |
//
// Every request carries `?auth={token}` when a token is configured. The token
// never appears in logs or `Debug` output.
//
// ## Tail Subscriptions
//
// The REST API has no push channel usable from here, so each subscription
// owns one polling task:
//
// 1. First poll: `limitToLast={limit}`, every returned child is emitted
//    (a fresh subscription replays the current tail)
// 2. Later polls: `startAt="{last key}"`, children with keys after the last
//    emitted key are emitted in key order
//
// Push keys sort in append order, so key order is delivery order. The task
// stops when the subscriber drops the stream.

use async_trait::async_trait;
use gremlin_core::config::StoreConfig;
use gremlin_core::traits::{KvStore, KvStoreFactory, TailEntry, TailStream};
use gremlin_core::{Error, PluginRegistry, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

/// Default HTTP timeout for store requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Emit children of `snapshot` whose key sorts after `last_key`, in key order
///
/// `snapshot` is the body of a collection query: an object of children, or
/// `null` for an empty collection.
pub fn new_tail_entries(snapshot: &Value, last_key: Option<&str>) -> Vec<TailEntry> {
    let Some(children) = snapshot.as_object() else {
        return Vec::new();
    };

    let mut entries: Vec<(&String, &Value)> = children
        .iter()
        .filter(|(key, _)| last_key.is_none_or(|last| key.as_str() > last))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    entries
        .into_iter()
        .map(|(key, value)| TailEntry::new(key.clone(), value.clone()))
        .collect()
}

/// REST client for one database
#[derive(Clone)]
struct RtdbClient {
    base: String,
    auth_token: Option<String>,
    http: reqwest::Client,
}

impl RtdbClient {
    fn node_url(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        if path.is_empty() {
            format!("{}/.json", self.base)
        } else {
            format!("{}/{}.json", self.base, path)
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, self.node_url(path));
        match &self.auth_token {
            Some(token) => builder.query(&[("auth", token.as_str())]),
            None => builder,
        }
    }

    async fn check(response: reqwest::Response, what: &str, path: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match status.as_u16() {
            401 | 403 => "permission denied".to_string(),
            _ => response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect(),
        };
        Err(Error::store(format!(
            "{} {} failed: {} {}",
            what, path, status, message
        )))
    }

    async fn fetch(&self, builder: reqwest::RequestBuilder, path: &str) -> Result<Value> {
        let response = builder
            .send()
            .await
            .map_err(|e| Error::store(format!("read {} failed: {}", path, e.without_url())))?;
        let response = Self::check(response, "read", path).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| Error::store(format!("read {} returned bad JSON: {}", path, e.without_url())))
    }

    async fn tail_page(&self, path: &str, limit: usize, last_key: Option<&str>) -> Result<Value> {
        let mut params: Vec<(&str, String)> = vec![("orderBy", "\"$key\"".to_string())];
        match last_key {
            None => params.push(("limitToLast", limit.max(1).to_string())),
            Some(key) => params.push(("startAt", format!("\"{}\"", key))),
        }
        let builder = self.request(reqwest::Method::GET, path).query(&params);
        self.fetch(builder, path).await
    }
}

/// Realtime-database REST store
pub struct RtdbStore {
    client: RtdbClient,
    tail_poll_interval: Duration,
}

// Custom Debug implementation that hides the auth token
impl std::fmt::Debug for RtdbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtdbStore")
            .field("database_url", &self.client.base)
            .field(
                "auth_token",
                &self.client.auth_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field("tail_poll_interval", &self.tail_poll_interval)
            .finish()
    }
}

impl RtdbStore {
    /// Create a new store
    ///
    /// # Parameters
    ///
    /// - `database_url`: Database root URL (e.g. `https://example.firebaseio.com`)
    /// - `auth_token`: Token appended as `?auth=` to every request
    /// - `tail_poll_interval`: How often tail subscriptions poll
    pub fn new(
        database_url: impl Into<String>,
        auth_token: Option<String>,
        tail_poll_interval: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client: RtdbClient {
                base: database_url.into().trim_end_matches('/').to_string(),
                auth_token: auth_token.filter(|t| !t.is_empty()),
                http,
            },
            tail_poll_interval,
        })
    }
}

#[async_trait]
impl KvStore for RtdbStore {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let value = self
            .client
            .fetch(self.client.request(reqwest::Method::GET, path), path)
            .await?;
        Ok(match value {
            Value::Null => None,
            other => Some(other),
        })
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        let response = self
            .client
            .request(reqwest::Method::PUT, path)
            .json(&value)
            .send()
            .await
            .map_err(|e| Error::store(format!("write {} failed: {}", path, e.without_url())))?;
        RtdbClient::check(response, "write", path).await?;
        debug!("Wrote {}", path);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self
            .client
            .request(reqwest::Method::DELETE, path)
            .send()
            .await
            .map_err(|e| Error::store(format!("delete {} failed: {}", path, e.without_url())))?;
        RtdbClient::check(response, "delete", path).await?;
        debug!("Deleted {}", path);
        Ok(())
    }

    fn subscribe_tail(&self, path: &str, limit: usize) -> TailStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.client.clone();
        let path = path.trim_matches('/').to_string();
        let poll_interval = self.tail_poll_interval;

        tokio::spawn(async move {
            info!(
                "Starting tail subscription on {} (interval={:?})",
                path, poll_interval
            );

            let mut last_key: Option<String> = None;
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if tx.is_closed() {
                    debug!("Tail subscriber for {} dropped, stopping", path);
                    break;
                }

                let snapshot = match client.tail_page(&path, limit, last_key.as_deref()).await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        warn!("Tail poll failed: {}", e);
                        continue;
                    }
                };

                for entry in new_tail_entries(&snapshot, last_key.as_deref()) {
                    last_key = Some(entry.key.clone());
                    if tx.send(entry).is_err() {
                        return;
                    }
                }
            }
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }

    fn store_name(&self) -> &'static str {
        "rtdb"
    }
}

/// Factory for creating REST stores
pub struct RtdbStoreFactory;

impl KvStoreFactory for RtdbStoreFactory {
    fn create(&self, config: &StoreConfig) -> Result<Arc<dyn KvStore>> {
        match config {
            StoreConfig::Rtdb {
                database_url,
                auth_token,
                tail_poll_interval_ms,
            } => Ok(Arc::new(RtdbStore::new(
                database_url.clone(),
                auth_token.clone(),
                Duration::from_millis(*tail_poll_interval_ms),
            )?)),
            _ => Err(Error::config("Invalid config for rtdb store")),
        }
    }
}

/// Register the REST store with a registry
pub fn register(registry: &PluginRegistry) {
    registry.register_store("rtdb", Box::new(RtdbStoreFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store(token: Option<&str>) -> RtdbStore {
        RtdbStore::new(
            "https://gremlin-test.firebaseio.com/",
            token.map(str::to_string),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[test]
    fn test_node_urls() {
        let store = store(None);
        assert_eq!(
            store.client.node_url("bans/address/1_2_3_4"),
            "https://gremlin-test.firebaseio.com/bans/address/1_2_3_4.json"
        );
        assert_eq!(
            store.client.node_url("/loginLogs/"),
            "https://gremlin-test.firebaseio.com/loginLogs.json"
        );
    }

    #[test]
    fn test_first_poll_emits_whole_tail_in_key_order() {
        let snapshot = json!({
            "-Nb2": { "email": "b" },
            "-Nb1": { "email": "a" },
        });
        let entries = new_tail_entries(&snapshot, None);
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["-Nb1", "-Nb2"]);
    }

    #[test]
    fn test_later_polls_skip_seen_keys() {
        // startAt is inclusive, so the last seen key comes back
        let snapshot = json!({
            "-Nb2": { "email": "b" },
            "-Nb3": { "email": "c" },
            "-Nb4": { "email": "d" },
        });
        let entries = new_tail_entries(&snapshot, Some("-Nb2"));
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["-Nb3", "-Nb4"]);
        assert_eq!(entries[1].value, json!({ "email": "d" }));
    }

    #[test]
    fn test_empty_collection() {
        assert!(new_tail_entries(&Value::Null, None).is_empty());
        assert!(new_tail_entries(&json!({}), Some("-Nb1")).is_empty());
    }

    #[test]
    fn test_token_not_exposed_in_debug() {
        let debug_str = format!("{:?}", store(Some("db_secret_123")));
        assert!(!debug_str.contains("db_secret_123"));
        assert!(debug_str.contains("<REDACTED>"));

        let debug_str = format!("{:?}", store(None));
        assert!(debug_str.contains("None"));
    }

    #[test]
    fn test_factory() {
        let registry = PluginRegistry::new();
        register(&registry);

        let config = StoreConfig::Rtdb {
            database_url: "https://gremlin-test.firebaseio.com".to_string(),
            auth_token: None,
            tail_poll_interval_ms: 1000,
        };
        let store = registry.create_store(&config).unwrap();
        assert_eq!(store.store_name(), "rtdb");

        assert!(RtdbStoreFactory.create(&StoreConfig::Memory).is_err());
    }
}
