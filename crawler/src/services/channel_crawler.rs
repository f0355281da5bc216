use crate::error::{CrawlError, CrawlResult};
use crate::models::{Channel, ChannelDetails, Snapshot, SnapshotKind, VideoStub};
use crate::services::announcer::Announcer;
use crate::services::classifier::{Candidate, Classifier, RejectReason, Verdict};
use crate::services::language_service::LanguageDetector;
use crate::services::popularity::{popularity_score, TREND_WINDOW};
use crate::services::staleness::StalenessPolicy;
use crate::services::store::CrawlStore;
use crate::services::video_sync::VideoSync;
use crate::services::youtube_service::VideoPlatform;
use crate::utils::{date_key, parse_keywords};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Crawled within the cooldown window.
    Cooldown,
    /// The platform does not know the channel.
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOutcome {
    Accepted { video_count: i64 },
    Rejected(RejectReason),
    Skipped(SkipReason),
}

impl ChannelOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ChannelOutcome::Accepted { .. })
    }

    /// The channel is stored after this outcome. A cooldown skip only happens
    /// for a channel that already has a record.
    pub fn in_corpus(&self) -> bool {
        matches!(
            self,
            ChannelOutcome::Accepted { .. } | ChannelOutcome::Skipped(SkipReason::Cooldown)
        )
    }
}

/// Fetches, classifies and persists a single channel.
///
/// This is the step shared by the subscription walk, the candidate queue and
/// the periodic refresh. Blacklist and memoized rejections are checked before
/// any API call, then the channel cooldown, so a skipped channel costs no quota.
pub struct ChannelCrawler {
    store: Arc<dyn CrawlStore>,
    platform: Arc<dyn VideoPlatform>,
    language: Arc<dyn LanguageDetector>,
    videos: VideoSync,
    policy: StalenessPolicy,
    detect_language: bool,
}

impl ChannelCrawler {
    pub fn new(
        store: Arc<dyn CrawlStore>,
        platform: Arc<dyn VideoPlatform>,
        language: Arc<dyn LanguageDetector>,
        announcer: Arc<dyn Announcer>,
        policy: StalenessPolicy,
        detect_language: bool,
    ) -> Self {
        let videos = VideoSync::new(store.clone(), platform.clone(), announcer, policy);

        ChannelCrawler {
            store,
            platform,
            language,
            videos,
            policy,
            detect_language,
        }
    }

    pub fn videos(&self) -> &VideoSync {
        &self.videos
    }

    pub async fn crawl_channel(
        &self,
        classifier: &Classifier,
        channel_id: &str,
        ignore_sailing_term: bool,
        cancel: &CancellationToken,
    ) -> CrawlResult<ChannelOutcome> {
        let now = Utc::now();

        if classifier.is_blacklisted(channel_id) {
            let verdict = Verdict::Rejected(RejectReason::Blacklisted);
            classifier
                .apply(self.store.as_ref(), channel_id, verdict, now.timestamp())
                .await?;
            return Ok(ChannelOutcome::Rejected(RejectReason::Blacklisted));
        }

        if !ignore_sailing_term && self.store.is_non_domain(channel_id).await? {
            debug!("Channel {channel_id} was rejected before, skipping");
            return Ok(ChannelOutcome::Rejected(RejectReason::KnownNonDomain));
        }

        let existing = self.store.get_channel(channel_id).await?;
        let last_crawl = existing.as_ref().map(|c| c.last_crawl);
        if !self.policy.channel_due(last_crawl, now) {
            info!("Channel {channel_id} is not crawled now, last crawl less than a day ago");
            return Ok(ChannelOutcome::Skipped(SkipReason::Cooldown));
        }

        let details = match self.platform.channel_details(channel_id).await? {
            Some(details) => details,
            None => {
                warn!("Could not read stats for channel {channel_id}");
                return Ok(ChannelOutcome::Skipped(SkipReason::NotFound));
            }
        };

        let verdict = classifier.classify(&Candidate {
            channel_id,
            title: &details.title,
            description: &details.description,
            video_count: details.video_count,
            ignore_sailing_term,
        });
        info!(
            "Channel {channel_id} classified as {verdict:?} ({} videos reported)",
            details.video_count
        );

        classifier
            .apply(self.store.as_ref(), channel_id, verdict, now.timestamp())
            .await?;
        if let Verdict::Rejected(reason) = verdict {
            return Ok(ChannelOutcome::Rejected(reason));
        }

        self.store_snapshots(channel_id, &details, now).await?;
        let recent_views = self
            .store
            .recent_snapshots(SnapshotKind::Views, channel_id, TREND_WINDOW)
            .await?;
        let popularity = popularity_score(&recent_views);

        let listed = self.read_videos(channel_id, cancel).await?;
        for stub in &listed {
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }
            if let Err(e) = self
                .videos
                .sync_video(channel_id, &details.title, &stub.id, now)
                .await
            {
                warn!(
                    "Failed to sync video {} of channel {channel_id} ({:?}): {e}",
                    stub.id,
                    e.kind()
                );
            }
        }

        let channel = self
            .build_channel(details, existing.as_ref(), &listed, popularity, now)
            .await;
        let video_count = channel.video_count;

        self.store.upsert_channel(&channel).await?;
        self.store.remove_candidate(channel_id).await?;

        info!("Updated channel {channel_id} ({video_count} videos, popularity {popularity:.2})");
        Ok(ChannelOutcome::Accepted { video_count })
    }

    async fn store_snapshots(
        &self,
        channel_id: &str,
        details: &ChannelDetails,
        now: DateTime<Utc>,
    ) -> CrawlResult<()> {
        let (date, year, month, day) = date_key(now);
        let snapshot = |value| Snapshot {
            channel_id: channel_id.to_string(),
            date,
            year,
            month,
            day,
            recorded_at: now.timestamp(),
            value,
        };

        self.store
            .upsert_snapshot(SnapshotKind::Subscribers, &snapshot(details.subscriber_count))
            .await?;
        self.store
            .upsert_snapshot(SnapshotKind::Views, &snapshot(details.view_count))
            .await
    }

    /// Pages through the channel uploads; a failing page ends the listing early.
    async fn read_videos(
        &self,
        channel_id: &str,
        cancel: &CancellationToken,
    ) -> CrawlResult<Vec<VideoStub>> {
        let mut videos = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }

            let page = match self
                .platform
                .channel_videos_page(channel_id, page_token.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!("Stopped reading videos of channel {channel_id}: {e}");
                    break;
                }
            };

            videos.extend(page.videos);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(videos)
    }

    async fn build_channel(
        &self,
        details: ChannelDetails,
        existing: Option<&Channel>,
        listed: &[VideoStub],
        popularity: f64,
        now: DateTime<Utc>,
    ) -> Channel {
        let video_count = if listed.is_empty() {
            details.video_count
        } else {
            listed.len() as i64
        };
        let last_upload_at = listed
            .iter()
            .map(|v| v.published_at)
            .max()
            .or(existing.map(|c| c.last_upload_at))
            .unwrap_or(0);

        let keywords = details
            .keywords
            .as_deref()
            .map(parse_keywords)
            .filter(|keywords| !keywords.is_empty());

        let (language, detected_language) = match existing {
            Some(channel) if channel.detected_language => (channel.language.clone(), true),
            _ => self.resolve_language(&details.description, listed).await,
        };

        Channel {
            id: details.id,
            title: details.title,
            description: details.description,
            published_at: details.published_at,
            thumbnail: details.thumbnail,
            subscribers: details.subscriber_count,
            views: details.view_count,
            subscribers_hidden: details.subscribers_hidden,
            country: details.country.map(|c| c.to_lowercase()),
            keywords,
            language,
            detected_language,
            last_crawl: now.timestamp(),
            video_count,
            last_upload_at,
            popularity,
        }
    }

    async fn resolve_language(
        &self,
        description: &str,
        listed: &[VideoStub],
    ) -> (Option<String>, bool) {
        let fallback = (Some(DEFAULT_LANGUAGE.to_string()), false);
        if !self.detect_language {
            return fallback;
        }

        let mut text = description.to_string();
        for video in listed {
            text.push(' ');
            text.push_str(&video.description);
        }

        match self.language.detect(&text).await {
            Some(detection) if detection.is_reliable => (Some(detection.language), true),
            _ => fallback,
        }
    }
}
