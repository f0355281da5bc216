use crate::error::{CrawlError, CrawlResult};
use crate::models::{
    ChannelDetails, SubscriptionItem, SubscriptionPage, VideoDetails, VideoPage, VideoStub,
};
use crate::services::key_rotator::KeyRotator;
use crate::utils::parse_iso8601_to_timestamp;
use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const PAGE_SIZE: &str = "50";

pub const KIND_CHANNEL: &str = "youtube#channel";
pub const KIND_VIDEO: &str = "youtube#video";

/// The calls the crawler makes against the video platform.
///
/// Every list call returns one page plus the continuation token; callers loop
/// until the token is absent.
#[async_trait]
pub trait VideoPlatform: Send + Sync {
    /// Statistics, snippet and branding of a channel; `None` when the id is unknown.
    async fn channel_details(&self, channel_id: &str) -> CrawlResult<Option<ChannelDetails>>;

    async fn subscriptions_page(
        &self,
        channel_id: &str,
        page_token: Option<&str>,
    ) -> CrawlResult<SubscriptionPage>;

    async fn channel_videos_page(
        &self,
        channel_id: &str,
        page_token: Option<&str>,
    ) -> CrawlResult<VideoPage>;

    async fn video_details(&self, video_id: &str) -> CrawlResult<Option<VideoDetails>>;
}

/// YouTube Data API v3 client.
///
/// Holds two independent key pools so the high-volume per-video lookups
/// cannot exhaust the quota used for channel and subscription queries.
pub struct YoutubeClient {
    client: Client,
    general_keys: KeyRotator,
    video_keys: KeyRotator,
}

impl YoutubeClient {
    pub fn new(
        general_keys: KeyRotator,
        video_keys: KeyRotator,
        timeout: Duration,
    ) -> CrawlResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| CrawlError::Request {
                endpoint: "client",
                source,
            })?;

        Ok(YoutubeClient {
            client,
            general_keys,
            video_keys,
        })
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        keys: &KeyRotator,
        params: &[(&str, &str)],
    ) -> CrawlResult<T> {
        // Documentation: https://developers.google.com/youtube/v3/docs
        let key = keys.next_key();
        let mut url = Url::parse(&format!("{API_BASE_URL}/{endpoint}"))
            .map_err(|e| CrawlError::payload(endpoint, e))?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().copied())
            .append_pair("key", &key);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| CrawlError::Request { endpoint, source })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                "{endpoint} request failed with status {} using key pool '{}'",
                status.as_u16(),
                keys.name()
            );
            return Err(CrawlError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CrawlError::payload(endpoint, e))
    }
}

#[async_trait]
impl VideoPlatform for YoutubeClient {
    async fn channel_details(&self, channel_id: &str) -> CrawlResult<Option<ChannelDetails>> {
        let response: ListResponse<ChannelItem> = self
            .fetch(
                "channels",
                &self.general_keys,
                &[
                    ("part", "statistics,snippet,brandingSettings"),
                    ("id", channel_id),
                ],
            )
            .await?;

        Ok(response.items.into_iter().next().map(ChannelItem::into_details))
    }

    async fn subscriptions_page(
        &self,
        channel_id: &str,
        page_token: Option<&str>,
    ) -> CrawlResult<SubscriptionPage> {
        let mut params = vec![
            ("part", "snippet"),
            ("maxResults", PAGE_SIZE),
            ("channelId", channel_id),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let response: ListResponse<SubscriptionListItem> = self
            .fetch("subscriptions", &self.general_keys, &params)
            .await?;

        Ok(SubscriptionPage {
            items: response
                .items
                .into_iter()
                .map(|item| SubscriptionItem {
                    kind: item.snippet.resource_id.kind,
                    channel_id: item.snippet.resource_id.channel_id.unwrap_or_default(),
                    title: item.snippet.title,
                    description: item.snippet.description,
                })
                .collect(),
            next_page_token: response.next_page_token,
        })
    }

    async fn channel_videos_page(
        &self,
        channel_id: &str,
        page_token: Option<&str>,
    ) -> CrawlResult<VideoPage> {
        let mut params = vec![
            ("part", "snippet"),
            ("channelId", channel_id),
            ("maxResults", PAGE_SIZE),
            ("regionCode", "us"),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let response: ListResponse<SearchItem> =
            self.fetch("search", &self.general_keys, &params).await?;

        Ok(VideoPage {
            videos: response
                .items
                .into_iter()
                .filter(|item| item.id.kind == KIND_VIDEO)
                .filter_map(|item| {
                    Some(VideoStub {
                        id: item.id.video_id?,
                        published_at: parse_iso8601_to_timestamp(&item.snippet.published_at),
                        title: item.snippet.title,
                        description: item.snippet.description,
                    })
                })
                .collect(),
            next_page_token: response.next_page_token,
        })
    }

    async fn video_details(&self, video_id: &str) -> CrawlResult<Option<VideoDetails>> {
        let response: ListResponse<VideoItem> = self
            .fetch(
                "videos",
                &self.video_keys,
                &[("part", "snippet,statistics,status"), ("id", video_id)],
            )
            .await?;

        Ok(response.items.into_iter().next().map(VideoItem::into_details))
    }
}

fn parse_count(value: &Option<String>) -> Option<i64> {
    value.as_deref().and_then(|v| v.parse().ok())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Thumbnails {
    #[serde(default)]
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    id: String,
    snippet: ChannelSnippet,
    #[serde(default)]
    statistics: ChannelStatistics,
    #[serde(default)]
    branding_settings: BrandingSettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelSnippet {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    published_at: String,
    #[serde(default)]
    thumbnails: Thumbnails,
    country: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    view_count: Option<String>,
    subscriber_count: Option<String>,
    #[serde(default)]
    hidden_subscriber_count: bool,
    video_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BrandingSettings {
    #[serde(default)]
    channel: BrandingChannel,
}

#[derive(Debug, Default, Deserialize)]
struct BrandingChannel {
    keywords: Option<String>,
}

impl ChannelItem {
    fn into_details(self) -> ChannelDetails {
        ChannelDetails {
            id: self.id,
            published_at: parse_iso8601_to_timestamp(&self.snippet.published_at),
            thumbnail: self
                .snippet
                .thumbnails
                .default
                .map(|t| t.url)
                .unwrap_or_default(),
            title: self.snippet.title,
            description: self.snippet.description,
            subscriber_count: parse_count(&self.statistics.subscriber_count).unwrap_or(0),
            view_count: parse_count(&self.statistics.view_count).unwrap_or(0),
            subscribers_hidden: self.statistics.hidden_subscriber_count,
            video_count: parse_count(&self.statistics.video_count).unwrap_or(0),
            country: self.snippet.country,
            keywords: self.branding_settings.channel.keywords,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubscriptionListItem {
    snippet: SubscriptionSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    kind: String,
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    kind: String,
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    published_at: String,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    #[serde(default)]
    statistics: VideoStatistics,
    status: VideoStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    published_at: String,
    tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
    like_count: Option<String>,
    dislike_count: Option<String>,
    comment_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatus {
    privacy_status: String,
}

impl VideoItem {
    fn into_details(self) -> VideoDetails {
        VideoDetails {
            id: self.id,
            title: self.snippet.title,
            description: self.snippet.description,
            published_at: parse_iso8601_to_timestamp(&self.snippet.published_at),
            view_count: parse_count(&self.statistics.view_count),
            like_count: parse_count(&self.statistics.like_count),
            dislike_count: parse_count(&self.statistics.dislike_count),
            comment_count: parse_count(&self.statistics.comment_count),
            tags: self
                .snippet
                .tags
                .unwrap_or_default()
                .into_iter()
                .map(|tag| tag.to_lowercase())
                .collect(),
            privacy_status: self.status.privacy_status,
        }
    }
}
