// Per-channel Atom feed: the cheap way to learn about new uploads.

use crate::error::{CrawlError, CrawlResult};
use crate::models::FeedEntry;
use crate::utils::extract_youtube_video_id;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::time::Duration;

const YOUTUBE_VIDEO_FEED_BASE_URL: &str = "https://www.youtube.com/feeds/videos.xml";
const VIDEO_ID_PREFIX: &str = "yt:video:";

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Entries of the channel feed; a missing feed is an empty list.
    async fn fetch_feed(&self, channel_id: &str) -> CrawlResult<Vec<FeedEntry>>;
}

pub struct YoutubeFeedClient {
    client: Client,
}

impl YoutubeFeedClient {
    pub fn new(timeout: Duration) -> CrawlResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| CrawlError::Request {
                endpoint: "feed",
                source,
            })?;

        Ok(YoutubeFeedClient { client })
    }
}

#[async_trait]
impl FeedSource for YoutubeFeedClient {
    async fn fetch_feed(&self, channel_id: &str) -> CrawlResult<Vec<FeedEntry>> {
        let response = self
            .client
            .get(YOUTUBE_VIDEO_FEED_BASE_URL)
            .query(&[("channel_id", channel_id)])
            .send()
            .await
            .map_err(|source| CrawlError::Request {
                endpoint: "feed",
                source,
            })?;

        let status = response.status();
        if status.as_u16() == 404 {
            debug!("No feed published for channel {channel_id}");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(CrawlError::Status {
                endpoint: "feed",
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|source| CrawlError::Request {
            endpoint: "feed",
            source,
        })?;

        parse_feed(&bytes)
    }
}

/// Parses a channel Atom document into feed entries; entries without a video id are dropped.
pub fn parse_feed(xml: &[u8]) -> CrawlResult<Vec<FeedEntry>> {
    let feed = feed_rs::parser::parse(xml).map_err(|e| CrawlError::payload("feed", e))?;

    Ok(feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let video_id = entry
                .id
                .strip_prefix(VIDEO_ID_PREFIX)
                .map(String::from)
                .or_else(|| {
                    entry
                        .links
                        .iter()
                        .find_map(|link| extract_youtube_video_id(&link.href))
                })?;

            let media = entry.media.first();
            let description = media
                .and_then(|m| m.description.as_ref())
                .map(|text| text.content.clone())
                .unwrap_or_default();
            let views = media
                .and_then(|m| m.community.as_ref())
                .and_then(|community| community.stats_views)
                .map(|views| views as i64);

            Some(FeedEntry {
                video_id,
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                description,
                published_at: entry.published.map(|dt| dt.timestamp()).unwrap_or(0),
                views,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/" xmlns="http://www.w3.org/2005/Atom">
 <id>yt:channel:UC1</id>
 <title>Sailing Uma</title>
 <entry>
  <id>yt:video:abcdefghijk</id>
  <yt:videoId>abcdefghijk</yt:videoId>
  <yt:channelId>UC1</yt:channelId>
  <title>Crossing the Atlantic</title>
  <link rel="alternate" href="https://www.youtube.com/watch?v=abcdefghijk"/>
  <published>2024-05-01T10:00:00+00:00</published>
  <updated>2024-05-02T10:00:00+00:00</updated>
  <media:group>
   <media:title>Crossing the Atlantic</media:title>
   <media:description>Three weeks at sea</media:description>
   <media:community>
    <media:starRating count="10" average="5.00" min="1" max="5"/>
    <media:statistics views="1234"/>
   </media:community>
  </media:group>
 </entry>
</feed>"#;

    #[test]
    fn parses_youtube_entries() {
        let entries = parse_feed(FEED.as_bytes()).unwrap();

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.video_id, "abcdefghijk");
        assert_eq!(entry.title, "Crossing the Atlantic");
        assert_eq!(entry.published_at, 1714557600);
        assert_eq!(entry.views, Some(1234));
    }

    #[test]
    fn feed_without_entries_is_empty() {
        let xml = r#"<?xml version="1.0"?><feed xmlns="http://www.w3.org/2005/Atom"><id>yt:channel:UC2</id><title>Quiet</title></feed>"#;
        assert!(parse_feed(xml.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_a_payload_error() {
        let err = parse_feed(b"not xml at all").unwrap_err();
        assert_eq!(err.kind(), crate::error::FailureKind::Payload);
    }
}
