//! Plugin-based backend registry
//!
//! The registry lets store backends, notification sinks and feed sources be
//! registered at runtime, so the daemon builds components from configuration
//! without hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gremlin_core::registry::PluginRegistry;
//!
//! let registry = PluginRegistry::with_defaults();
//! gremlin_store_rtdb::register(&registry);
//! gremlin_notify_discord::register(&registry);
//! gremlin_feed_http::register(&registry);
//!
//! let store = registry.create_store(&config.store)?;
//! let sink = registry.create_sink(&config.sink)?;
//! ```
//!
//! ## Registration
//!
//! Backend crates expose a `register()` function:
//!
//! ```rust,ignore
//! // In gremlin-notify-discord
//! pub fn register(registry: &PluginRegistry) {
//!     registry.register_sink("discord", Box::new(DiscordSinkFactory));
//! }
//! ```

use crate::config::{FeedSourceConfig, SinkConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::sink::TracingSinkFactory;
use crate::store::MemoryKvStoreFactory;
use crate::traits::{FeedSource, KvStore, NotificationSink};
use crate::traits::{FeedSourceFactory, KvStoreFactory, NotificationSinkFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

type FactoryMap<F> = RwLock<HashMap<String, Box<F>>>;

fn read<F: ?Sized>(map: &FactoryMap<F>) -> RwLockReadGuard<'_, HashMap<String, Box<F>>> {
    map.read().unwrap_or_else(|e| e.into_inner())
}

fn write<F: ?Sized>(map: &FactoryMap<F>) -> RwLockWriteGuard<'_, HashMap<String, Box<F>>> {
    map.write().unwrap_or_else(|e| e.into_inner())
}

/// Registry of backend factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct PluginRegistry {
    /// Registered key-value store factories
    stores: FactoryMap<dyn KvStoreFactory>,

    /// Registered notification sink factories
    sinks: FactoryMap<dyn NotificationSinkFactory>,

    /// Registered feed source factories
    feed_sources: FactoryMap<dyn FeedSourceFactory>,
}

impl PluginRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in backends (`memory` store, `log` sink)
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register_store("memory", Box::new(MemoryKvStoreFactory));
        registry.register_sink("log", Box::new(TracingSinkFactory));
        registry
    }

    /// Register a key-value store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "memory", "rtdb")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn KvStoreFactory>) {
        write(&self.stores).insert(name.into(), factory);
    }

    /// Register a notification sink factory
    pub fn register_sink(
        &self,
        name: impl Into<String>,
        factory: Box<dyn NotificationSinkFactory>,
    ) {
        write(&self.sinks).insert(name.into(), factory);
    }

    /// Register a feed source factory
    pub fn register_feed_source(
        &self,
        name: impl Into<String>,
        factory: Box<dyn FeedSourceFactory>,
    ) {
        write(&self.feed_sources).insert(name.into(), factory);
    }

    /// Create a key-value store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn KvStore>)`: Created store instance
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub fn create_store(&self, config: &StoreConfig) -> Result<Arc<dyn KvStore>> {
        let store_type = config.type_name();
        let stores = read(&self.stores);

        let factory = stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?;

        factory.create(config)
    }

    /// Create a notification sink from configuration
    pub fn create_sink(&self, config: &SinkConfig) -> Result<Arc<dyn NotificationSink>> {
        let sink_type = config.type_name();
        let sinks = read(&self.sinks);

        let factory = sinks
            .get(sink_type)
            .ok_or_else(|| Error::config(format!("Unknown sink type: {}", sink_type)))?;

        factory.create(config)
    }

    /// Create a feed source from configuration
    pub fn create_feed_source(&self, config: &FeedSourceConfig) -> Result<Box<dyn FeedSource>> {
        let source_type = config.type_name();
        let sources = read(&self.feed_sources);

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown feed source type: {}", source_type)))?;

        factory.create(config)
    }

    /// Create every source of a fallback chain, preserving order
    pub fn create_feed_sources(
        &self,
        configs: &[FeedSourceConfig],
    ) -> Result<Vec<Box<dyn FeedSource>>> {
        configs
            .iter()
            .map(|config| self.create_feed_source(config))
            .collect()
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        read(&self.stores).keys().cloned().collect()
    }

    /// List all registered sink types
    pub fn list_sinks(&self) -> Vec<String> {
        read(&self.sinks).keys().cloned().collect()
    }

    /// List all registered feed source types
    pub fn list_feed_sources(&self) -> Vec<String> {
        read(&self.feed_sources).keys().cloned().collect()
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        read(&self.stores).contains_key(name)
    }

    /// Check if a sink type is registered
    pub fn has_sink(&self, name: &str) -> bool {
        read(&self.sinks).contains_key(name)
    }

    /// Check if a feed source type is registered
    pub fn has_feed_source(&self, name: &str) -> bool {
        read(&self.feed_sources).contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoSourceFactory;

    impl FeedSourceFactory for NoSourceFactory {
        fn create(&self, _config: &FeedSourceConfig) -> Result<Box<dyn FeedSource>> {
            Err(Error::config("Mock source not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = PluginRegistry::new();

        // Initially empty
        assert!(!registry.has_feed_source("mock"));

        // Register
        registry.register_feed_source("mock", Box::new(NoSourceFactory));

        // Now present
        assert!(registry.has_feed_source("mock"));
        assert!(registry.list_feed_sources().contains(&"mock".to_string()));
    }

    #[test]
    fn test_defaults() {
        let registry = PluginRegistry::with_defaults();
        assert!(registry.has_store("memory"));
        assert!(registry.has_sink("log"));
        assert!(registry.create_store(&StoreConfig::Memory).is_ok());
        assert!(registry.create_sink(&SinkConfig::Log).is_ok());
    }

    #[test]
    fn test_unknown_type_is_config_error() {
        let registry = PluginRegistry::new();
        let err = registry
            .create_sink(&SinkConfig::Discord {
                bot_token: "t".into(),
            })
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));

        let err = registry
            .create_feed_sources(&[FeedSourceConfig::Syndication {
                channel_id: "UC1".into(),
                base_url: None,
            }])
            .err()
            .unwrap();
        assert!(err.to_string().contains("syndication"));
    }
}
