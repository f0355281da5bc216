use crate::error::{CrawlError, CrawlResult};
use crate::models::{
    AdminStats, Channel, DiscoveryCandidate, NonDomainChannel, Snapshot, SnapshotKind, Video,
};
use crate::services::store::CrawlStore;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Collections {
    channels: HashMap<String, Channel>,
    videos: HashMap<String, Video>,
    snapshots: HashMap<SnapshotKind, BTreeMap<(String, i32), Snapshot>>,
    candidates: BTreeMap<String, DiscoveryCandidate>,
    non_domain: HashMap<String, NonDomainChannel>,
    domain_terms: BTreeSet<String>,
    blacklist: BTreeSet<String>,
    last_subscriber_crawl: Option<i64>,
}

/// In-process [`CrawlStore`] with the same upsert semantics as the
/// Elasticsearch store. Used by the integration tests.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        if let Ok(mut collections) = store.collections.lock() {
            collections.domain_terms = terms.into_iter().map(Into::into).collect();
        }
        store
    }

    fn lock(&self) -> CrawlResult<MutexGuard<'_, Collections>> {
        self.collections
            .lock()
            .map_err(|e| CrawlError::store("lock", e))
    }

    pub fn snapshots(&self, kind: SnapshotKind, channel_id: &str) -> Vec<Snapshot> {
        match self.collections.lock() {
            Ok(collections) => collections
                .snapshots
                .get(&kind)
                .map(|points| {
                    points
                        .values()
                        .filter(|s| s.channel_id == channel_id)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    pub fn videos_of(&self, channel_id: &str) -> Vec<Video> {
        match self.collections.lock() {
            Ok(collections) => collections
                .videos
                .values()
                .filter(|v| v.channel_id == channel_id)
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn non_domain_ids(&self) -> Vec<String> {
        match self.collections.lock() {
            Ok(collections) => collections.non_domain.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl CrawlStore for MemoryStore {
    async fn get_channel(&self, id: &str) -> CrawlResult<Option<Channel>> {
        Ok(self.lock()?.channels.get(id).cloned())
    }

    async fn upsert_channel(&self, channel: &Channel) -> CrawlResult<()> {
        self.lock()?
            .channels
            .insert(channel.id.clone(), channel.clone());
        Ok(())
    }

    async fn list_channel_ids(&self) -> CrawlResult<Vec<String>> {
        let mut ids: Vec<String> = self.lock()?.channels.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn top_channels(&self, limit: usize) -> CrawlResult<Vec<Channel>> {
        let mut channels: Vec<Channel> = self.lock()?.channels.values().cloned().collect();
        channels.sort_by(|a, b| {
            b.popularity
                .partial_cmp(&a.popularity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        channels.truncate(limit);
        Ok(channels)
    }

    async fn set_channel_video_stats(
        &self,
        id: &str,
        video_count: i64,
        last_upload_at: i64,
    ) -> CrawlResult<()> {
        if let Some(channel) = self.lock()?.channels.get_mut(id) {
            channel.video_count = video_count;
            channel.last_upload_at = last_upload_at;
        }
        Ok(())
    }

    async fn delete_channel(&self, id: &str) -> CrawlResult<()> {
        let mut collections = self.lock()?;
        collections.channels.remove(id);
        collections.videos.retain(|_, video| video.channel_id != id);
        for points in collections.snapshots.values_mut() {
            points.retain(|(channel_id, _), _| channel_id != id);
        }
        Ok(())
    }

    async fn get_video(&self, id: &str) -> CrawlResult<Option<Video>> {
        Ok(self.lock()?.videos.get(id).cloned())
    }

    async fn upsert_video(&self, video: &Video) -> CrawlResult<()> {
        self.lock()?.videos.insert(video.id.clone(), video.clone());
        Ok(())
    }

    async fn delete_video(&self, id: &str) -> CrawlResult<()> {
        self.lock()?.videos.remove(id);
        Ok(())
    }

    async fn count_videos(&self, channel_id: &str) -> CrawlResult<i64> {
        let count = self
            .lock()?
            .videos
            .values()
            .filter(|v| v.channel_id == channel_id)
            .count();
        Ok(count as i64)
    }

    async fn upsert_snapshot(&self, kind: SnapshotKind, snapshot: &Snapshot) -> CrawlResult<()> {
        self.lock()?
            .snapshots
            .entry(kind)
            .or_default()
            .insert(
                (snapshot.channel_id.clone(), snapshot.date),
                snapshot.clone(),
            );
        Ok(())
    }

    async fn recent_snapshots(
        &self,
        kind: SnapshotKind,
        channel_id: &str,
        limit: usize,
    ) -> CrawlResult<Vec<Snapshot>> {
        let collections = self.lock()?;
        let recent = collections
            .snapshots
            .get(&kind)
            .map(|points| {
                points
                    .values()
                    .rev()
                    .filter(|s| s.channel_id == channel_id)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(recent)
    }

    async fn add_candidate(&self, candidate: &DiscoveryCandidate) -> CrawlResult<()> {
        self.lock()?
            .candidates
            .insert(candidate.channel_id.clone(), candidate.clone());
        Ok(())
    }

    async fn list_candidates(&self) -> CrawlResult<Vec<DiscoveryCandidate>> {
        Ok(self.lock()?.candidates.values().cloned().collect())
    }

    async fn remove_candidate(&self, channel_id: &str) -> CrawlResult<()> {
        self.lock()?.candidates.remove(channel_id);
        Ok(())
    }

    async fn is_non_domain(&self, channel_id: &str) -> CrawlResult<bool> {
        Ok(self.lock()?.non_domain.contains_key(channel_id))
    }

    async fn record_non_domain(&self, entry: &NonDomainChannel) -> CrawlResult<()> {
        self.lock()?
            .non_domain
            .insert(entry.channel_id.clone(), entry.clone());
        Ok(())
    }

    async fn domain_terms(&self) -> CrawlResult<Vec<String>> {
        Ok(self.lock()?.domain_terms.iter().cloned().collect())
    }

    async fn blacklist(&self) -> CrawlResult<Vec<String>> {
        Ok(self.lock()?.blacklist.iter().cloned().collect())
    }

    async fn add_blacklist_entry(&self, channel_id: &str) -> CrawlResult<()> {
        self.lock()?.blacklist.insert(channel_id.to_string());
        Ok(())
    }

    async fn last_subscriber_crawl(&self) -> CrawlResult<Option<i64>> {
        Ok(self.lock()?.last_subscriber_crawl)
    }

    async fn set_last_subscriber_crawl(&self, timestamp: i64) -> CrawlResult<()> {
        self.lock()?.last_subscriber_crawl = Some(timestamp);
        Ok(())
    }

    async fn stats(&self) -> CrawlResult<AdminStats> {
        let collections = self.lock()?;
        Ok(AdminStats {
            total_channels: collections.channels.len() as i64,
            total_videos: collections.videos.len() as i64,
            pending_candidates: collections.candidates.len() as i64,
            non_domain_channels: collections.non_domain.len() as i64,
            last_subscriber_crawl: collections.last_subscriber_crawl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn views(date: i32, value: i64) -> Snapshot {
        Snapshot {
            channel_id: "UC1".to_string(),
            date,
            year: 2024,
            month: 5,
            day: (date % 100) as u32,
            recorded_at: 0,
            value,
        }
    }

    #[tokio::test]
    async fn snapshot_upsert_overwrites_same_day() {
        let store = MemoryStore::new();

        store
            .upsert_snapshot(SnapshotKind::Views, &views(20240501, 100))
            .await
            .unwrap();
        store
            .upsert_snapshot(SnapshotKind::Views, &views(20240501, 120))
            .await
            .unwrap();

        let stored = store.snapshots(SnapshotKind::Views, "UC1");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, 120);
    }

    #[tokio::test]
    async fn recent_snapshots_are_newest_first_and_bounded() {
        let store = MemoryStore::new();
        for (day, value) in [(1, 10), (2, 20), (3, 30), (4, 40)] {
            store
                .upsert_snapshot(SnapshotKind::Views, &views(20240500 + day, value))
                .await
                .unwrap();
        }

        let recent = store
            .recent_snapshots(SnapshotKind::Views, "UC1", 3)
            .await
            .unwrap();

        let values: Vec<i64> = recent.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![40, 30, 20]);
    }
}
