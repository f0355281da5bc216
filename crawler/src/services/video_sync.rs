use crate::error::CrawlResult;
use crate::models::{FeedEntry, Video, PRIVACY_PUBLIC};
use crate::services::announcer::{within_announce_window, Announcement, Announcer};
use crate::services::staleness::StalenessPolicy;
use crate::services::store::CrawlStore;
use crate::services::youtube_service::VideoPlatform;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoOutcome {
    /// Stored record is recent enough for its age bracket.
    Fresh,
    Stored { first_seen: bool },
    /// Upstream no longer lists the video as public, or no longer returns it.
    Removed,
    /// The platform returned no item for an id that was never stored.
    Missing,
}

/// Refreshes single videos under the age-bracketed staleness policy.
pub struct VideoSync {
    store: Arc<dyn CrawlStore>,
    platform: Arc<dyn VideoPlatform>,
    announcer: Arc<dyn Announcer>,
    policy: StalenessPolicy,
}

impl VideoSync {
    pub fn new(
        store: Arc<dyn CrawlStore>,
        platform: Arc<dyn VideoPlatform>,
        announcer: Arc<dyn Announcer>,
        policy: StalenessPolicy,
    ) -> Self {
        VideoSync {
            store,
            platform,
            announcer,
            policy,
        }
    }

    /// Refreshes a video found through the upload search.
    pub async fn sync_video(
        &self,
        channel_id: &str,
        channel_title: &str,
        video_id: &str,
        now: DateTime<Utc>,
    ) -> CrawlResult<VideoOutcome> {
        self.sync(channel_id, channel_title, video_id, None, now).await
    }

    /// Refreshes a video listed in the channel feed. The entry is the base
    /// record: API statistics overwrite it, and without an API item the video
    /// is stored from the entry alone.
    pub async fn sync_feed_entry(
        &self,
        channel_id: &str,
        channel_title: &str,
        entry: &FeedEntry,
        now: DateTime<Utc>,
    ) -> CrawlResult<VideoOutcome> {
        self.sync(channel_id, channel_title, &entry.video_id, Some(entry), now)
            .await
    }

    async fn sync(
        &self,
        channel_id: &str,
        channel_title: &str,
        video_id: &str,
        entry: Option<&FeedEntry>,
        now: DateTime<Utc>,
    ) -> CrawlResult<VideoOutcome> {
        let existing = self.store.get_video(video_id).await?;

        if let Some(video) = &existing {
            if !self
                .policy
                .video_due(video.published_at, video.updated_at, now)
            {
                debug!("Video {video_id} is fresh, skipping statistics fetch");
                return Ok(VideoOutcome::Fresh);
            }
        }

        let previous_views = existing.as_ref().map(|v| v.views).unwrap_or(0);
        let feed_views = entry.and_then(|e| e.views);

        let video = match (self.platform.video_details(video_id).await?, entry) {
            (Some(details), _) => {
                if details.privacy_status != PRIVACY_PUBLIC {
                    info!(
                        "Video {video_id} is {}, removing it",
                        details.privacy_status
                    );
                    self.store.delete_video(video_id).await?;
                    return Ok(VideoOutcome::Removed);
                }

                Video {
                    id: video_id.to_string(),
                    channel_id: channel_id.to_string(),
                    title: details.title,
                    description: details.description,
                    published_at: details.published_at,
                    updated_at: now.timestamp(),
                    views: details
                        .view_count
                        .or(feed_views)
                        .unwrap_or(previous_views),
                    likes: details.like_count,
                    dislikes: details.dislike_count,
                    comments: details.comment_count,
                    tags: details.tags,
                    privacy_status: details.privacy_status,
                }
            }
            (None, Some(entry)) => {
                debug!("No statistics for feed video {video_id}, storing the feed entry");
                Video {
                    id: video_id.to_string(),
                    channel_id: channel_id.to_string(),
                    title: entry.title.clone(),
                    description: entry.description.clone(),
                    published_at: entry.published_at,
                    updated_at: now.timestamp(),
                    views: feed_views.unwrap_or(previous_views),
                    likes: existing.as_ref().and_then(|v| v.likes),
                    dislikes: existing.as_ref().and_then(|v| v.dislikes),
                    comments: existing.as_ref().and_then(|v| v.comments),
                    tags: existing.as_ref().map(|v| v.tags.clone()).unwrap_or_default(),
                    privacy_status: PRIVACY_PUBLIC.to_string(),
                }
            }
            (None, None) if existing.is_some() => {
                info!("Video {video_id} of channel {channel_id} is gone upstream, removing it");
                self.store.delete_video(video_id).await?;
                return Ok(VideoOutcome::Removed);
            }
            (None, None) => {
                warn!("No statistics returned for video {video_id} of channel {channel_id}");
                return Ok(VideoOutcome::Missing);
            }
        };

        let first_seen = existing.is_none();
        if first_seen && within_announce_window(video.published_at, now.timestamp()) {
            let announcement = Announcement {
                channel_id: channel_id.to_string(),
                channel_title: channel_title.to_string(),
                video_title: video.title.clone(),
            };
            if let Err(e) = self.announcer.announce(&announcement).await {
                warn!("Failed to announce new video {video_id}: {e}");
            }
        }

        self.store.upsert_video(&video).await?;
        Ok(VideoOutcome::Stored { first_seen })
    }
}
