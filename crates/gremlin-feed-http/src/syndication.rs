// # Syndication Source
//
// Fallback feed source: reads the channel's public Atom feed. Needs no
// credential.
//
// ## Ids
//
// Atom entry ids look like `yt:video:<videoId>`. The prefix is stripped so the
// item id matches what the data API reports for the same upload, and a poller
// that switches between the two sources sees no change.

use gremlin_core::traits::{FeedItem, FeedSource, FetchOutcome};
use gremlin_core::{Error, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event as XEvent};
use std::borrow::Cow;

use crate::{SOURCE_TIMEOUT, watch_url};

/// Default feed base URL
pub const DEFAULT_FEED_BASE: &str = "https://www.youtube.com/feeds/videos.xml";

/// Prefix of Atom entry ids
pub const ENTRY_ID_PREFIX: &str = "yt:video:";

const SOURCE_NAME: &str = "syndication";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    VideoId,
    Title,
}

#[derive(Debug, Default)]
struct EntryFields {
    id: Option<String>,
    video_id: Option<String>,
    title: Option<String>,
    link: Option<String>,
}

fn local(name: &[u8]) -> &[u8] {
    name.rsplit(|b| *b == b':').next().unwrap_or(name)
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(Cow::into_owned))
}

/// Parse an Atom document and return its first (newest) entry
pub fn parse_atom_feed(xml: &str) -> Result<FetchOutcome> {
    let mut rdr = Reader::from_str(xml);
    rdr.trim_text(true);

    let mut in_entry = false;
    let mut current: Option<Field> = None;
    let mut entry = EntryFields::default();

    loop {
        let event = rdr.read_event().map_err(|e| {
            Error::source_fetch(
                SOURCE_NAME,
                format!("Malformed feed at byte {}: {}", rdr.buffer_position(), e),
            )
        })?;

        match event {
            XEvent::Start(e) | XEvent::Empty(e) => {
                let name = e.name();
                let qualified = name.as_ref();
                match local(qualified) {
                    b"entry" => {
                        in_entry = true;
                    }
                    _ if !in_entry => {}
                    b"id" => current = Some(Field::Id),
                    b"videoId" if qualified.starts_with(b"yt:") => current = Some(Field::VideoId),
                    // media:title duplicates the title; only the Atom one is used
                    b"title" if qualified == b"title" => current = Some(Field::Title),
                    b"link" if entry.link.is_none() => {
                        let rel = attribute(&e, b"rel");
                        if rel.as_deref().is_none_or(|r| r == "alternate") {
                            entry.link = attribute(&e, b"href");
                        }
                    }
                    _ => {}
                }
            }
            XEvent::Text(t) if in_entry => {
                if let Some(field) = current {
                    let text = t
                        .unescape()
                        .map_err(|e| {
                            Error::source_fetch(SOURCE_NAME, format!("Bad text in entry: {}", e))
                        })?
                        .into_owned();
                    match field {
                        Field::Id => entry.id = Some(text),
                        Field::VideoId => entry.video_id = Some(text),
                        Field::Title => entry.title = Some(text),
                    }
                }
            }
            XEvent::CData(t) if in_entry && current == Some(Field::Title) => {
                entry.title = Some(String::from_utf8_lossy(&t.into_inner()).into_owned());
            }
            XEvent::End(e) => {
                current = None;
                if in_entry && local(e.name().as_ref()) == b"entry" {
                    break;
                }
            }
            XEvent::Eof => break,
            _ => {}
        }
    }

    if !in_entry {
        return Ok(FetchOutcome::Empty);
    }

    let id = entry
        .video_id
        .or_else(|| {
            entry
                .id
                .map(|id| id.strip_prefix(ENTRY_ID_PREFIX).map(str::to_string).unwrap_or(id))
        })
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::source_fetch(SOURCE_NAME, "Newest entry has no id"))?;

    let link = entry.link.unwrap_or_else(|| watch_url(&id));

    Ok(FetchOutcome::Item(FeedItem::new(
        id,
        entry.title.unwrap_or_default(),
        link,
    )))
}

/// Public Atom feed source
#[derive(Debug)]
pub struct SyndicationSource {
    /// Channel to watch
    channel_id: String,

    /// Feed base URL
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl SyndicationSource {
    /// Create a new syndication source
    ///
    /// # Parameters
    ///
    /// - `channel_id`: Channel to watch
    /// - `base_url`: Override for [`DEFAULT_FEED_BASE`]
    pub fn new(channel_id: String, base_url: Option<String>) -> Self {
        Self {
            channel_id,
            base_url: base_url.unwrap_or_else(|| DEFAULT_FEED_BASE.to_string()),
            client: reqwest::Client::builder()
                .timeout(SOURCE_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait::async_trait]
impl FeedSource for SyndicationSource {
    async fn fetch_newest(&self) -> Result<FetchOutcome> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("channel_id", self.channel_id.as_str())])
            .send()
            .await
            .map_err(|e| Error::source_fetch(SOURCE_NAME, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::source_fetch(
                SOURCE_NAME,
                format!("HTTP error: {}", status),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::source_fetch(SOURCE_NAME, format!("Failed to read response: {}", e)))?;

        tracing::debug!("{} answered for channel {}", SOURCE_NAME, self.channel_id);
        parse_atom_feed(&body)
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }
}
