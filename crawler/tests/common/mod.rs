#![allow(dead_code)]

use async_trait::async_trait;
use channel_crawler::error::{CrawlError, CrawlResult};
use channel_crawler::models::{
    ChannelDetails, FeedEntry, SubscriptionItem, SubscriptionPage, VideoDetails, VideoPage,
    VideoStub, PRIVACY_PUBLIC,
};
use channel_crawler::services::announcer::{Announcement, Announcer};
use channel_crawler::services::channel_crawler::ChannelCrawler;
use channel_crawler::services::feed_service::FeedSource;
use channel_crawler::services::language_service::{Detection, LanguageDetector};
use channel_crawler::services::memory_store::MemoryStore;
use channel_crawler::services::staleness::StalenessPolicy;
use channel_crawler::services::youtube_service::{VideoPlatform, KIND_CHANNEL};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const DOMAIN_TERMS: [&str; 2] = ["sailing", "sailboat"];

/// Scripted video platform. Every call is recorded as `"<endpoint>:<id>"`.
#[derive(Default)]
pub struct FakePlatform {
    channels: Mutex<HashMap<String, ChannelDetails>>,
    failing_details: Mutex<HashSet<String>>,
    subscriptions: Mutex<HashMap<String, Vec<Option<Vec<String>>>>>,
    uploads: Mutex<HashMap<String, Vec<VideoStub>>>,
    videos: Mutex<HashMap<String, VideoDetails>>,
    calls: Mutex<Vec<String>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a channel together with its public uploads.
    pub fn add_channel(&self, details: ChannelDetails, uploads: Vec<VideoStub>) {
        let mut videos = self.videos.lock().unwrap();
        for stub in &uploads {
            videos.insert(stub.id.clone(), video_details(stub, PRIVACY_PUBLIC));
        }
        self.uploads
            .lock()
            .unwrap()
            .insert(details.id.clone(), uploads);
        self.channels
            .lock()
            .unwrap()
            .insert(details.id.clone(), details);
    }

    pub fn set_video(&self, details: VideoDetails) {
        self.videos
            .lock()
            .unwrap()
            .insert(details.id.clone(), details);
    }

    /// One entry per page; `None` makes that page fail.
    pub fn set_subscriptions(&self, channel_id: &str, pages: Vec<Option<Vec<&str>>>) {
        let pages = pages
            .into_iter()
            .map(|page| page.map(|ids| ids.into_iter().map(String::from).collect()))
            .collect();
        self.subscriptions
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), pages);
    }

    pub fn fail_details(&self, channel_id: &str) {
        self.failing_details
            .lock()
            .unwrap()
            .insert(channel_id.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl VideoPlatform for FakePlatform {
    async fn channel_details(&self, channel_id: &str) -> CrawlResult<Option<ChannelDetails>> {
        self.record(format!("details:{channel_id}"));
        if self.failing_details.lock().unwrap().contains(channel_id) {
            return Err(CrawlError::Status {
                endpoint: "channels",
                status: 503,
            });
        }
        Ok(self.channels.lock().unwrap().get(channel_id).cloned())
    }

    async fn subscriptions_page(
        &self,
        channel_id: &str,
        page_token: Option<&str>,
    ) -> CrawlResult<SubscriptionPage> {
        self.record(format!("subscriptions:{channel_id}"));
        let index: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let pages = self
            .subscriptions
            .lock()
            .unwrap()
            .get(channel_id)
            .cloned()
            .unwrap_or_default();

        match pages.get(index) {
            None => Ok(SubscriptionPage {
                items: Vec::new(),
                next_page_token: None,
            }),
            Some(None) => Err(CrawlError::Status {
                endpoint: "subscriptions",
                status: 500,
            }),
            Some(Some(ids)) => Ok(SubscriptionPage {
                items: ids.iter().map(|id| subscription(id)).collect(),
                next_page_token: (index + 1 < pages.len()).then(|| (index + 1).to_string()),
            }),
        }
    }

    async fn channel_videos_page(
        &self,
        channel_id: &str,
        _page_token: Option<&str>,
    ) -> CrawlResult<VideoPage> {
        self.record(format!("videos:{channel_id}"));
        Ok(VideoPage {
            videos: self
                .uploads
                .lock()
                .unwrap()
                .get(channel_id)
                .cloned()
                .unwrap_or_default(),
            next_page_token: None,
        })
    }

    async fn video_details(&self, video_id: &str) -> CrawlResult<Option<VideoDetails>> {
        self.record(format!("video:{video_id}"));
        Ok(self.videos.lock().unwrap().get(video_id).cloned())
    }
}

#[derive(Default)]
pub struct FakeFeed {
    entries: Mutex<HashMap<String, Vec<FeedEntry>>>,
}

impl FakeFeed {
    pub fn set_entries(&self, channel_id: &str, entries: Vec<FeedEntry>) {
        self.entries
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), entries);
    }
}

#[async_trait]
impl FeedSource for FakeFeed {
    async fn fetch_feed(&self, channel_id: &str) -> CrawlResult<Vec<FeedEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(channel_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct RecordingAnnouncer {
    pub sent: Mutex<Vec<Announcement>>,
}

impl RecordingAnnouncer {
    pub fn sent(&self) -> Vec<Announcement> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn announce(&self, announcement: &Announcement) -> CrawlResult<()> {
        self.sent.lock().unwrap().push(announcement.clone());
        Ok(())
    }
}

pub struct FakeDetector {
    pub detection: Option<Detection>,
}

#[async_trait]
impl LanguageDetector for FakeDetector {
    async fn detect(&self, _text: &str) -> Option<Detection> {
        self.detection.clone()
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub platform: Arc<FakePlatform>,
    pub feed: Arc<FakeFeed>,
    pub announcer: Arc<RecordingAnnouncer>,
}

impl Harness {
    pub fn new() -> Self {
        Harness {
            store: Arc::new(MemoryStore::with_domain_terms(DOMAIN_TERMS)),
            platform: Arc::new(FakePlatform::new()),
            feed: Arc::new(FakeFeed::default()),
            announcer: Arc::new(RecordingAnnouncer::default()),
        }
    }

    pub fn crawler(&self) -> ChannelCrawler {
        self.crawler_with(StalenessPolicy::default(), None)
    }

    pub fn crawler_with(
        &self,
        policy: StalenessPolicy,
        detection: Option<Detection>,
    ) -> ChannelCrawler {
        let detect = detection.is_some();
        ChannelCrawler::new(
            self.store.clone(),
            self.platform.clone(),
            Arc::new(FakeDetector { detection }),
            self.announcer.clone(),
            policy,
            detect,
        )
    }
}

pub fn details(id: &str, title: &str, description: &str, video_count: i64) -> ChannelDetails {
    ChannelDetails {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        published_at: 1_500_000_000,
        thumbnail: format!("https://img.example/{id}.jpg"),
        subscriber_count: 1000,
        view_count: 50_000,
        subscribers_hidden: false,
        video_count,
        country: Some("DE".to_string()),
        keywords: Some("sailing \"blue water\" boat".to_string()),
    }
}

/// A channel that matches a domain term and reports `videos` uploads.
pub fn sailing_channel(platform: &FakePlatform, id: &str, videos: usize) {
    let uploads = (0..videos)
        .map(|n| stub(&format!("{id}-v{n}"), 1_600_000_000 + n as i64))
        .collect();
    platform.add_channel(
        details(id, &format!("Sailing {id}"), "Life aboard", videos as i64),
        uploads,
    );
}

pub fn cooking_channel(platform: &FakePlatform, id: &str) {
    platform.add_channel(
        details(id, &format!("Cooking {id}"), "Recipes", 3),
        vec![stub(&format!("{id}-v0"), 1_600_000_000)],
    );
}

pub fn stub(id: &str, published_at: i64) -> VideoStub {
    VideoStub {
        id: id.to_string(),
        title: format!("Video {id}"),
        description: "Crossing the Atlantic".to_string(),
        published_at,
    }
}

pub fn video_details(stub: &VideoStub, privacy_status: &str) -> VideoDetails {
    VideoDetails {
        id: stub.id.clone(),
        title: stub.title.clone(),
        description: stub.description.clone(),
        published_at: stub.published_at,
        view_count: Some(120),
        like_count: Some(10),
        dislike_count: None,
        comment_count: Some(2),
        tags: vec!["sailing".to_string()],
        privacy_status: privacy_status.to_string(),
    }
}

pub fn feed_entry(video_id: &str, published_at: i64) -> FeedEntry {
    FeedEntry {
        video_id: video_id.to_string(),
        title: format!("Video {video_id}"),
        description: String::new(),
        published_at,
        views: None,
    }
}

pub fn subscription(channel_id: &str) -> SubscriptionItem {
    SubscriptionItem {
        kind: KIND_CHANNEL.to_string(),
        channel_id: channel_id.to_string(),
        title: String::new(),
        description: String::new(),
    }
}

pub fn now() -> i64 {
    Utc::now().timestamp()
}
