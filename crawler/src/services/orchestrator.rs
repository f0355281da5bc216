use crate::error::{CrawlError, CrawlResult};
use crate::models::Channel;
use crate::services::channel_crawler::{ChannelCrawler, ChannelOutcome};
use crate::services::classifier::Classifier;
use crate::services::discovery_queue::DiscoveryQueue;
use crate::services::feed_service::FeedSource;
use crate::services::store::CrawlStore;
use crate::services::walker::{SubscriptionWalker, WalkReport};
use crate::services::youtube_service::VideoPlatform;
use chrono::Utc;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Minimum time between two full subscription walks.
pub const WALK_INTERVAL_SECS: i64 = 86_400;

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub seed_channel_id: String,
    pub max_depth: usize,
    pub interval: Duration,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PhaseReport {
    pub processed: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub candidates: PhaseReport,
    pub refresh: PhaseReport,
    pub feeds: PhaseReport,
    /// `None` when the walk was not due this cycle.
    pub walk: Option<WalkReport>,
    pub cancelled: bool,
}

/// Drives the crawl cycle: pending candidates, stat refresh, feed refresh and
/// the daily subscription walk, in that order.
pub struct CrawlOrchestrator {
    store: Arc<dyn CrawlStore>,
    platform: Arc<dyn VideoPlatform>,
    feeds: Arc<dyn FeedSource>,
    crawler: ChannelCrawler,
    queue: DiscoveryQueue,
    settings: CycleSettings,
}

impl CrawlOrchestrator {
    pub fn new(
        store: Arc<dyn CrawlStore>,
        platform: Arc<dyn VideoPlatform>,
        feeds: Arc<dyn FeedSource>,
        crawler: ChannelCrawler,
        settings: CycleSettings,
    ) -> Self {
        let queue = DiscoveryQueue::new(store.clone());

        CrawlOrchestrator {
            store,
            platform,
            feeds,
            crawler,
            queue,
            settings,
        }
    }

    /// Runs cycles until the token is cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Crawl loop started, one cycle every {}s",
            self.settings.interval.as_secs()
        );

        loop {
            let report = self.run_cycle(&cancel).await;
            if report.cancelled {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        info!("Crawl loop stopped");
    }

    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let mut report = CycleReport::default();

        let classifier = match Classifier::load(self.store.as_ref()).await {
            Ok(classifier) => classifier,
            Err(e) => {
                error!("Could not load classification data, skipping cycle: {e}");
                return report;
            }
        };

        info!("Phase 1: pending candidates");
        match self.process_candidates(&classifier, cancel).await {
            Ok(phase) => report.candidates = phase,
            Err(_) => {
                report.cancelled = true;
                return report;
            }
        }

        let channel_ids = match self.store.list_channel_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Could not list channels: {e}");
                Vec::new()
            }
        };

        info!("Phase 2: refreshing {} channels", channel_ids.len());
        match self.refresh_channels(&classifier, &channel_ids, cancel).await {
            Ok(phase) => report.refresh = phase,
            Err(_) => {
                report.cancelled = true;
                return report;
            }
        }

        info!("Phase 3: reading feeds");
        match self.refresh_feeds(&channel_ids, cancel).await {
            Ok(phase) => report.feeds = phase,
            Err(_) => {
                report.cancelled = true;
                return report;
            }
        }

        if self.walk_due().await {
            info!("Phase 4: subscription walk");
            let walker = SubscriptionWalker::new(
                &self.crawler,
                self.platform.clone(),
                self.settings.max_depth,
            );
            let walk = walker
                .walk(&self.settings.seed_channel_id, &classifier, cancel)
                .await;

            if walk.cancelled {
                report.cancelled = true;
            } else if let Err(e) = self
                .store
                .set_last_subscriber_crawl(Utc::now().timestamp())
                .await
            {
                error!("Failed to advance subscription crawl cursor: {e}");
            }
            report.walk = Some(walk);
        }

        info!(
            "Cycle finished: candidates {:?}, refresh {:?}, feeds {:?}",
            report.candidates, report.refresh, report.feeds
        );
        report
    }

    async fn process_candidates(
        &self,
        classifier: &Classifier,
        cancel: &CancellationToken,
    ) -> CrawlResult<PhaseReport> {
        let mut phase = PhaseReport::default();
        let candidates = match self.queue.pending().await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!("Could not read discovery queue: {e}");
                return Ok(phase);
            }
        };

        for candidate in candidates {
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }

            let id = &candidate.channel_id;
            match self
                .crawler
                .crawl_channel(classifier, id, candidate.ignore_sailing_term, cancel)
                .await
            {
                Ok(outcome) => {
                    phase.processed += 1;
                    // accepted channels already left the queue inside the pipeline
                    if !outcome.is_accepted() {
                        info!("Candidate {id} resolved as {outcome:?}");
                        if let Err(e) = self.queue.mark_completed(id).await {
                            warn!("Failed to remove candidate {id}: {e}");
                        }
                    }
                }
                Err(CrawlError::Cancelled) => return Err(CrawlError::Cancelled),
                Err(e) => {
                    phase.failed += 1;
                    warn!("Candidate {id} stays queued ({:?}): {e}", e.kind());
                }
            }
        }

        Ok(phase)
    }

    async fn refresh_channels(
        &self,
        classifier: &Classifier,
        channel_ids: &[String],
        cancel: &CancellationToken,
    ) -> CrawlResult<PhaseReport> {
        let mut phase = PhaseReport::default();

        for id in channel_ids {
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }

            match self.crawler.crawl_channel(classifier, id, true, cancel).await {
                Ok(ChannelOutcome::Rejected(reason)) => {
                    phase.processed += 1;
                    info!("Channel {id} dropped from corpus: {reason:?}");
                }
                Ok(_) => phase.processed += 1,
                Err(CrawlError::Cancelled) => return Err(CrawlError::Cancelled),
                Err(e) => {
                    phase.failed += 1;
                    warn!("Failed to refresh channel {id} ({:?}): {e}", e.kind());
                }
            }
        }

        Ok(phase)
    }

    async fn refresh_feeds(
        &self,
        channel_ids: &[String],
        cancel: &CancellationToken,
    ) -> CrawlResult<PhaseReport> {
        let mut phase = PhaseReport::default();

        for id in channel_ids {
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }

            let channel = match self.store.get_channel(id).await {
                Ok(Some(channel)) => channel,
                // removed during the refresh phase
                Ok(None) => continue,
                Err(e) => {
                    phase.failed += 1;
                    warn!("Failed to load channel {id}: {e}");
                    continue;
                }
            };

            match self.refresh_feed(&channel, cancel).await {
                Ok(_) => phase.processed += 1,
                Err(CrawlError::Cancelled) => return Err(CrawlError::Cancelled),
                Err(e) => {
                    phase.failed += 1;
                    warn!("Failed to read feed of channel {id} ({:?}): {e}", e.kind());
                }
            }
        }

        Ok(phase)
    }

    /// Syncs every feed entry of one channel and updates its video stats.
    pub async fn refresh_feed(
        &self,
        channel: &Channel,
        cancel: &CancellationToken,
    ) -> CrawlResult<usize> {
        let entries = self.feeds.fetch_feed(&channel.id).await?;
        if entries.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut last_upload_at = channel.last_upload_at;

        for entry in &entries {
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }

            if let Err(e) = self
                .crawler
                .videos()
                .sync_feed_entry(&channel.id, &channel.title, entry, now)
                .await
            {
                warn!("Failed to sync feed video {}: {e}", entry.video_id);
            }
            last_upload_at = last_upload_at.max(entry.published_at);
        }

        let video_count = self.store.count_videos(&channel.id).await?;
        self.store
            .set_channel_video_stats(&channel.id, video_count, last_upload_at)
            .await?;

        Ok(entries.len())
    }

    async fn walk_due(&self) -> bool {
        match self.store.last_subscriber_crawl().await {
            Ok(Some(last)) => Utc::now().timestamp() - last >= WALK_INTERVAL_SECS,
            Ok(None) => true,
            Err(e) => {
                error!("Could not read subscription crawl cursor: {e}");
                false
            }
        }
    }
}
