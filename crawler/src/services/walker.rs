use crate::error::{CrawlError, FailureKind};
use crate::services::channel_crawler::{ChannelCrawler, ChannelOutcome};
use crate::services::classifier::Classifier;
use crate::services::youtube_service::{VideoPlatform, KIND_CHANNEL};
use log::{debug, info, warn};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a subscription walk did, for logging and tests.
#[derive(Debug, Default)]
pub struct WalkReport {
    pub visited: HashSet<String>,
    /// Channel, discovery depth and result of every processed neighbor.
    pub outcomes: Vec<(String, usize, ChannelOutcome)>,
    pub failures: Vec<(String, FailureKind)>,
    /// Channels whose subscriptions were paginated, in order.
    pub expanded: Vec<String>,
    pub failed_pages: usize,
    pub cancelled: bool,
}

impl WalkReport {
    pub fn accepted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, _, outcome)| outcome.is_accepted())
            .count()
    }
}

/// Bounded walk over the public subscription graph starting at a seed channel.
///
/// The seed sits at depth 0. A channel at depth `k` only has its own
/// subscriptions read when `k + 1 < max_depth`, and only if it is in the
/// corpus (accepted now, or stored and still in its cooldown).
/// Every channel is processed at most once per walk.
pub struct SubscriptionWalker<'a> {
    crawler: &'a ChannelCrawler,
    platform: Arc<dyn VideoPlatform>,
    max_depth: usize,
}

impl<'a> SubscriptionWalker<'a> {
    pub fn new(
        crawler: &'a ChannelCrawler,
        platform: Arc<dyn VideoPlatform>,
        max_depth: usize,
    ) -> Self {
        SubscriptionWalker {
            crawler,
            platform,
            max_depth,
        }
    }

    pub async fn walk(
        &self,
        seed_channel_id: &str,
        classifier: &Classifier,
        cancel: &CancellationToken,
    ) -> WalkReport {
        let mut report = WalkReport::default();
        let mut work: VecDeque<(String, usize)> = VecDeque::new();

        report.visited.insert(seed_channel_id.to_string());
        work.push_back((seed_channel_id.to_string(), 0));

        info!(
            "Starting subscription walk from {seed_channel_id} (max depth {})",
            self.max_depth
        );

        while let Some((channel_id, depth)) = work.pop_front() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if depth + 1 >= self.max_depth {
                continue;
            }

            report.expanded.push(channel_id.clone());
            let neighbor_depth = depth + 1;
            let mut page_token: Option<String> = None;

            loop {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    return report;
                }

                let page = match self
                    .platform
                    .subscriptions_page(&channel_id, page_token.as_deref())
                    .await
                {
                    Ok(page) => page,
                    Err(e) => {
                        warn!("Failed to read subscriptions of {channel_id}: {e}");
                        report.failed_pages += 1;
                        break;
                    }
                };

                for item in page.items {
                    if item.kind != KIND_CHANNEL || item.channel_id.is_empty() {
                        continue;
                    }
                    if !report.visited.insert(item.channel_id.clone()) {
                        debug!("Channel {} already visited in this walk", item.channel_id);
                        continue;
                    }

                    match self
                        .crawler
                        .crawl_channel(classifier, &item.channel_id, false, cancel)
                        .await
                    {
                        Ok(outcome) => {
                            if outcome.in_corpus() && neighbor_depth + 1 < self.max_depth {
                                work.push_back((item.channel_id.clone(), neighbor_depth));
                            }
                            report
                                .outcomes
                                .push((item.channel_id, neighbor_depth, outcome));
                        }
                        Err(CrawlError::Cancelled) => {
                            report.cancelled = true;
                            return report;
                        }
                        Err(e) => {
                            warn!("Failed to crawl channel {}: {e}", item.channel_id);
                            report.failures.push((item.channel_id, e.kind()));
                        }
                    }
                }

                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
        }

        info!(
            "Subscription walk finished: {} visited, {} accepted, {} failed pages",
            report.visited.len(),
            report.accepted(),
            report.failed_pages
        );
        report
    }
}
