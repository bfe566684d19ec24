// # HTTP Feed Sources
//
// This crate provides the feed sources used by the change poller.
//
// ## Sources
//
// - [`DataApiSource`] (`data_api`): keyed search API, the **primary** source.
//   Reports itself unavailable when no API key is configured.
// - [`SyndicationSource`] (`syndication`): public Atom feed, the **fallback**.
//
// Both report the same item ids for the same upload, so a poller configured
// with `[data_api, syndication]` can fail over between them freely.
//
// ## Failure Handling
//
// Sources make exactly one request per call. They never retry; transport,
// status and parse failures become `Error::SourceFetch` and the poller moves
// on to the next source.

mod data_api;
mod syndication;

pub use data_api::{DEFAULT_DATA_API_BASE, DataApiSource, parse_search_response};
pub use syndication::{DEFAULT_FEED_BASE, ENTRY_ID_PREFIX, SyndicationSource, parse_atom_feed};

use gremlin_core::PluginRegistry;
use gremlin_core::config::FeedSourceConfig;
use gremlin_core::traits::{FeedSource, FeedSourceFactory};
use gremlin_core::{Error, Result};
use std::time::Duration;

/// Per-request timeout for every source
pub(crate) const SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Public watch URL for a video id
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Factory for creating data API sources
pub struct DataApiFactory;

impl FeedSourceFactory for DataApiFactory {
    fn create(&self, config: &FeedSourceConfig) -> Result<Box<dyn FeedSource>> {
        match config {
            FeedSourceConfig::DataApi {
                api_key,
                channel_id,
                base_url,
            } => Ok(Box::new(DataApiSource::new(
                api_key.clone(),
                channel_id.clone(),
                base_url.clone(),
            ))),
            _ => Err(Error::config("Invalid config for data API source")),
        }
    }
}

/// Factory for creating syndication sources
pub struct SyndicationFactory;

impl FeedSourceFactory for SyndicationFactory {
    fn create(&self, config: &FeedSourceConfig) -> Result<Box<dyn FeedSource>> {
        match config {
            FeedSourceConfig::Syndication {
                channel_id,
                base_url,
            } => Ok(Box::new(SyndicationSource::new(
                channel_id.clone(),
                base_url.clone(),
            ))),
            _ => Err(Error::config("Invalid config for syndication source")),
        }
    }
}

/// Register both HTTP feed sources with a registry
pub fn register(registry: &PluginRegistry) {
    registry.register_feed_source("data_api", Box::new(DataApiFactory));
    registry.register_feed_source("syndication", Box::new(SyndicationFactory));
}
