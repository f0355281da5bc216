//! Persistence seam of the crawler.
//!
//! [`CrawlStore`] is the typed view of the document store: one group of
//! operations per collection. Writes are upserts keyed by the entity id (or by
//! `(channel, date)` for snapshots), so replaying a crawl never duplicates data.

use crate::error::CrawlResult;
use crate::models::{
    AdminStats, Channel, DiscoveryCandidate, NonDomainChannel, Snapshot, SnapshotKind, Video,
};
use async_trait::async_trait;

#[async_trait]
pub trait CrawlStore: Send + Sync {
    async fn get_channel(&self, id: &str) -> CrawlResult<Option<Channel>>;

    /// Replaces the stored channel document.
    async fn upsert_channel(&self, channel: &Channel) -> CrawlResult<()>;

    async fn list_channel_ids(&self) -> CrawlResult<Vec<String>>;

    /// Channels ranked by popularity score, highest first.
    async fn top_channels(&self, limit: usize) -> CrawlResult<Vec<Channel>>;

    async fn set_channel_video_stats(
        &self,
        id: &str,
        video_count: i64,
        last_upload_at: i64,
    ) -> CrawlResult<()>;

    /// Removes the channel together with its videos and snapshots.
    async fn delete_channel(&self, id: &str) -> CrawlResult<()>;

    async fn get_video(&self, id: &str) -> CrawlResult<Option<Video>>;

    async fn upsert_video(&self, video: &Video) -> CrawlResult<()>;

    async fn delete_video(&self, id: &str) -> CrawlResult<()>;

    async fn count_videos(&self, channel_id: &str) -> CrawlResult<i64>;

    /// Overwrites the point for `(snapshot.channel_id, snapshot.date)`.
    async fn upsert_snapshot(&self, kind: SnapshotKind, snapshot: &Snapshot) -> CrawlResult<()>;

    /// At most `limit` snapshots of a channel, newest first.
    async fn recent_snapshots(
        &self,
        kind: SnapshotKind,
        channel_id: &str,
        limit: usize,
    ) -> CrawlResult<Vec<Snapshot>>;

    async fn add_candidate(&self, candidate: &DiscoveryCandidate) -> CrawlResult<()>;

    async fn list_candidates(&self) -> CrawlResult<Vec<DiscoveryCandidate>>;

    async fn remove_candidate(&self, channel_id: &str) -> CrawlResult<()>;

    async fn is_non_domain(&self, channel_id: &str) -> CrawlResult<bool>;

    async fn record_non_domain(&self, entry: &NonDomainChannel) -> CrawlResult<()>;

    async fn domain_terms(&self) -> CrawlResult<Vec<String>>;

    async fn blacklist(&self) -> CrawlResult<Vec<String>>;

    async fn add_blacklist_entry(&self, channel_id: &str) -> CrawlResult<()>;

    async fn last_subscriber_crawl(&self) -> CrawlResult<Option<i64>>;

    async fn set_last_subscriber_crawl(&self, timestamp: i64) -> CrawlResult<()>;

    async fn stats(&self) -> CrawlResult<AdminStats>;
}
