use crate::error::{CrawlError, CrawlResult};
use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// Videos published longer ago than this are never announced.
pub const ANNOUNCE_WINDOW_SECS: i64 = 15000;

#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub channel_id: String,
    pub channel_title: String,
    pub video_title: String,
}

impl Announcement {
    pub fn message(&self, site_url: &str) -> String {
        format!(
            "New: {} \"{}\" {}/#/channel/{}",
            self.channel_title,
            self.video_title,
            site_url.trim_end_matches('/'),
            self.channel_id
        )
    }
}

/// `true` when a first-seen video is recent enough to be announced.
pub fn within_announce_window(published_at: i64, now: i64) -> bool {
    (published_at - now).abs() <= ANNOUNCE_WINDOW_SECS
}

#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, announcement: &Announcement) -> CrawlResult<()>;
}

/// Posts announcements as `{"text": ...}` to a webhook.
pub struct WebhookAnnouncer {
    client: Client,
    webhook_url: String,
    site_url: String,
}

impl WebhookAnnouncer {
    pub fn new(webhook_url: &str, site_url: &str, timeout: Duration) -> CrawlResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| CrawlError::Request {
                endpoint: "announce",
                source,
            })?;

        Ok(WebhookAnnouncer {
            client,
            webhook_url: webhook_url.to_string(),
            site_url: site_url.to_string(),
        })
    }
}

#[async_trait]
impl Announcer for WebhookAnnouncer {
    async fn announce(&self, announcement: &Announcement) -> CrawlResult<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&json!({ "text": announcement.message(&self.site_url) }))
            .send()
            .await
            .map_err(|source| CrawlError::Request {
                endpoint: "announce",
                source,
            })?;

        if !response.status().is_success() {
            return Err(CrawlError::Status {
                endpoint: "announce",
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}

/// Development stand-in: writes the announcement to the log instead of posting it.
pub struct LogAnnouncer {
    site_url: String,
}

impl LogAnnouncer {
    pub fn new(site_url: &str) -> Self {
        LogAnnouncer {
            site_url: site_url.to_string(),
        }
    }
}

#[async_trait]
impl Announcer for LogAnnouncer {
    async fn announce(&self, announcement: &Announcement) -> CrawlResult<()> {
        warn!("{}", announcement.message(&self.site_url));
        Ok(())
    }
}
