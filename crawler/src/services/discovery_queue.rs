use crate::error::CrawlResult;
use crate::models::DiscoveryCandidate;
use crate::services::store::CrawlStore;
use log::info;
use std::sync::Arc;

/// Channels waiting for classification, persisted in the `additional` collection.
///
/// Anything found outside the subscription walk (operator additions, feed
/// mentions) lands here and is drained by the first phase of every cycle.
#[derive(Clone)]
pub struct DiscoveryQueue {
    store: Arc<dyn CrawlStore>,
}

impl DiscoveryQueue {
    pub fn new(store: Arc<dyn CrawlStore>) -> Self {
        DiscoveryQueue { store }
    }

    /// Queues a channel unless it is already part of the corpus.
    pub async fn add_channel(
        &self,
        channel_id: &str,
        ignore_sailing_term: bool,
        now: i64,
    ) -> CrawlResult<bool> {
        if self.store.get_channel(channel_id).await?.is_some() {
            info!("Channel {channel_id} already crawled, not queueing it");
            return Ok(false);
        }

        self.store
            .add_candidate(&DiscoveryCandidate {
                channel_id: channel_id.to_string(),
                ignore_sailing_term,
                added_at: now,
            })
            .await?;

        info!("Added channel to discovery queue: {channel_id}");
        Ok(true)
    }

    pub async fn pending(&self) -> CrawlResult<Vec<DiscoveryCandidate>> {
        self.store.list_candidates().await
    }

    pub async fn mark_completed(&self, channel_id: &str) -> CrawlResult<()> {
        self.store.remove_candidate(channel_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory_store::MemoryStore;

    #[tokio::test]
    async fn queue_round_trip() {
        let queue = DiscoveryQueue::new(Arc::new(MemoryStore::new()));

        assert!(queue.add_channel("UC1", true, 10).await.unwrap());
        assert_eq!(queue.pending().await.unwrap().len(), 1);

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending[0].channel_id, "UC1");
        assert!(pending[0].ignore_sailing_term);

        queue.mark_completed("UC1").await.unwrap();
        assert!(queue.pending().await.unwrap().is_empty());
    }
}
