// # Data API Source
//
// Primary feed source: asks the keyed search endpoint for the newest upload
// of a channel.
//
// ## Request
//
// ```text
// GET {base}/search?part=snippet&channelId={id}&order=date&maxResults=1&type=video&key={key}
// ```
//
// ## Credential
//
// Without an API key the source reports itself unavailable so the poller
// moves straight on to the fallback. The key never appears in logs or
// `Debug` output.

use gremlin_core::traits::{FeedItem, FeedSource, FetchOutcome};
use gremlin_core::{Error, Result};
use serde::Deserialize;
use std::fmt;

use crate::{SOURCE_TIMEOUT, watch_url};

/// Default API base URL
pub const DEFAULT_DATA_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

const SOURCE_NAME: &str = "data_api";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    #[serde(default)]
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId", default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
}

/// Parse a search response body into a fetch outcome
///
/// Titles arrive HTML-escaped (`&#39;`, `&amp;`) and are unescaped here.
pub fn parse_search_response(body: &str) -> Result<FetchOutcome> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|e| Error::source_fetch(SOURCE_NAME, format!("Unreadable response: {}", e)))?;

    let Some(first) = response.items.into_iter().next() else {
        return Ok(FetchOutcome::Empty);
    };

    let video_id = first
        .id
        .video_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::source_fetch(SOURCE_NAME, "Newest item has no video id"))?;

    let raw_title = first.snippet.map(|s| s.title).unwrap_or_default();
    let title = quick_xml::escape::unescape(&raw_title)
        .map(|t| t.into_owned())
        .unwrap_or(raw_title);

    Ok(FetchOutcome::Item(FeedItem::new(
        video_id.clone(),
        title,
        watch_url(&video_id),
    )))
}

/// Keyed search API source
pub struct DataApiSource {
    /// API key (None = unavailable)
    api_key: Option<String>,

    /// Channel to watch
    channel_id: String,

    /// API base URL
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl fmt::Debug for DataApiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataApiSource")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("channel_id", &self.channel_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl DataApiSource {
    /// Create a new data API source
    ///
    /// # Parameters
    ///
    /// - `api_key`: API key; `None` or empty makes the source unavailable
    /// - `channel_id`: Channel to watch
    /// - `base_url`: Override for [`DEFAULT_DATA_API_BASE`]
    pub fn new(api_key: Option<String>, channel_id: String, base_url: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            channel_id,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_DATA_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::builder()
                .timeout(SOURCE_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait::async_trait]
impl FeedSource for DataApiSource {
    async fn fetch_newest(&self) -> Result<FetchOutcome> {
        let Some(api_key) = &self.api_key else {
            return Ok(FetchOutcome::Unavailable("no API key configured".to_string()));
        };

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("part", "snippet"),
                ("channelId", self.channel_id.as_str()),
                ("order", "date"),
                ("maxResults", "1"),
                ("type", "video"),
                ("key", api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                Error::source_fetch(SOURCE_NAME, format!("Request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::source_fetch(
                SOURCE_NAME,
                format!("HTTP error: {}", status),
            ));
        }

        let body = response.text().await.map_err(|e| {
            Error::source_fetch(SOURCE_NAME, format!("Failed to read response: {}", e.without_url()))
        })?;

        tracing::debug!("{} answered for channel {}", SOURCE_NAME, self.channel_id);
        parse_search_response(&body)
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_newest_item() {
        let body = r#"{
            "kind": "youtube#searchListResponse",
            "items": [
                {
                    "id": { "kind": "youtube#video", "videoId": "dQw4w9WgXcQ" },
                    "snippet": { "title": "Gremlins &amp; Friends: It&#39;s Live", "channelId": "UC1" }
                }
            ]
        }"#;

        let outcome = parse_search_response(body).unwrap();
        assert_eq!(
            outcome,
            FetchOutcome::Item(FeedItem::new(
                "dQw4w9WgXcQ",
                "Gremlins & Friends: It's Live",
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            ))
        );
    }

    #[test]
    fn test_parse_no_items() {
        assert_eq!(
            parse_search_response(r#"{ "items": [] }"#).unwrap(),
            FetchOutcome::Empty
        );
        assert_eq!(parse_search_response("{}").unwrap(), FetchOutcome::Empty);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_search_response("<html>quota</html>"),
            Err(Error::SourceFetch { .. })
        ));
        assert!(matches!(
            parse_search_response(r#"{ "items": [ { "id": { "kind": "youtube#playlist" } } ] }"#),
            Err(Error::SourceFetch { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let source = DataApiSource::new(None, "UC1".into(), None);
        assert!(matches!(
            source.fetch_newest().await.unwrap(),
            FetchOutcome::Unavailable(_)
        ));

        let source = DataApiSource::new(Some(String::new()), "UC1".into(), None);
        assert!(matches!(
            source.fetch_newest().await.unwrap(),
            FetchOutcome::Unavailable(_)
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let source = DataApiSource::new(Some("AIzaSecret".into()), "UC1".into(), None);
        let debug = format!("{:?}", source);
        assert!(!debug.contains("AIzaSecret"));
        assert!(debug.contains("<redacted>"));
    }
}
