mod common;

use channel_crawler::error::FailureKind;
use channel_crawler::services::channel_crawler::ChannelOutcome;
use channel_crawler::services::classifier::{Classifier, RejectReason};
use channel_crawler::services::store::CrawlStore;
use channel_crawler::services::walker::SubscriptionWalker;
use common::*;
use tokio_util::sync::CancellationToken;

async fn classifier(harness: &Harness) -> Classifier {
    Classifier::load(harness.store.as_ref()).await.unwrap()
}

#[tokio::test]
async fn channel_at_last_level_is_stored_but_not_expanded() {
    let h = Harness::new();
    h.platform.set_subscriptions("SEED", vec![Some(vec!["A"])]);
    h.platform.set_subscriptions("A", vec![Some(vec!["B"])]);
    h.platform.set_subscriptions("B", vec![Some(vec!["C"])]);
    for id in ["A", "B", "C"] {
        sailing_channel(&h.platform, id, 2);
    }

    let crawler = h.crawler();
    let walker = SubscriptionWalker::new(&crawler, h.platform.clone(), 3);
    let report = walker
        .walk("SEED", &classifier(&h).await, &CancellationToken::new())
        .await;

    assert_eq!(report.expanded, vec!["SEED", "A"]);
    assert!(h.store.get_channel("B").await.unwrap().is_some());
    assert_eq!(h.platform.call_count("subscriptions:B"), 0);
    assert!(h.store.get_channel("C").await.unwrap().is_none());
    assert!(report
        .outcomes
        .iter()
        .any(|(id, depth, outcome)| id == "B" && *depth == 2 && outcome.is_accepted()));
}

#[tokio::test]
async fn depth_one_only_reads_seed_subscriptions() {
    let h = Harness::new();
    h.platform.set_subscriptions("SEED", vec![Some(vec!["A"])]);
    sailing_channel(&h.platform, "A", 1);

    let crawler = h.crawler();
    let walker = SubscriptionWalker::new(&crawler, h.platform.clone(), 1);
    let report = walker
        .walk("SEED", &classifier(&h).await, &CancellationToken::new())
        .await;

    assert!(report.expanded.is_empty());
    assert!(h.platform.calls().is_empty());
}

#[tokio::test]
async fn failing_page_only_stops_that_channel() {
    let h = Harness::new();
    h.platform
        .set_subscriptions("SEED", vec![Some(vec!["A", "B"]), None, Some(vec!["Z"])]);
    h.platform.set_subscriptions("A", vec![None]);
    h.platform.set_subscriptions("B", vec![Some(vec!["C"])]);
    for id in ["A", "B", "C", "Z"] {
        sailing_channel(&h.platform, id, 1);
    }

    let crawler = h.crawler();
    let walker = SubscriptionWalker::new(&crawler, h.platform.clone(), 3);
    let report = walker
        .walk("SEED", &classifier(&h).await, &CancellationToken::new())
        .await;

    assert_eq!(report.failed_pages, 2);
    for id in ["A", "B", "C"] {
        assert!(h.store.get_channel(id).await.unwrap().is_some(), "{id}");
    }
    // the page after the failing one is never requested
    assert!(h.store.get_channel("Z").await.unwrap().is_none());
}

#[tokio::test]
async fn channel_is_processed_once_per_walk() {
    let h = Harness::new();
    h.platform.set_subscriptions("SEED", vec![Some(vec!["A", "B"])]);
    h.platform.set_subscriptions("A", vec![Some(vec!["B", "SEED"])]);
    sailing_channel(&h.platform, "A", 1);
    sailing_channel(&h.platform, "B", 1);

    let crawler = h.crawler();
    let walker = SubscriptionWalker::new(&crawler, h.platform.clone(), 4);
    let report = walker
        .walk("SEED", &classifier(&h).await, &CancellationToken::new())
        .await;

    assert_eq!(h.platform.call_count("details:B"), 1);
    assert_eq!(h.platform.call_count("details:SEED"), 0);
    assert_eq!(report.outcomes.len(), 2);
}

#[tokio::test]
async fn rejected_channels_are_not_expanded() {
    let h = Harness::new();
    h.platform.set_subscriptions("SEED", vec![Some(vec!["X"])]);
    h.platform.set_subscriptions("X", vec![Some(vec!["Y"])]);
    cooking_channel(&h.platform, "X");
    sailing_channel(&h.platform, "Y", 1);

    let crawler = h.crawler();
    let walker = SubscriptionWalker::new(&crawler, h.platform.clone(), 3);
    let report = walker
        .walk("SEED", &classifier(&h).await, &CancellationToken::new())
        .await;

    assert_eq!(
        report.outcomes[0].2,
        ChannelOutcome::Rejected(RejectReason::NoDomainTerm)
    );
    assert_eq!(h.platform.call_count("subscriptions:X"), 0);
    assert_eq!(h.store.non_domain_ids(), vec!["X".to_string()]);
}

#[tokio::test]
async fn transient_failure_is_reported_and_walk_continues() {
    let h = Harness::new();
    h.platform.set_subscriptions("SEED", vec![Some(vec!["A", "B"])]);
    h.platform.fail_details("A");
    sailing_channel(&h.platform, "B", 1);

    let crawler = h.crawler();
    let walker = SubscriptionWalker::new(&crawler, h.platform.clone(), 2);
    let report = walker
        .walk("SEED", &classifier(&h).await, &CancellationToken::new())
        .await;

    assert_eq!(report.failures, vec![("A".to_string(), FailureKind::Transient)]);
    assert!(h.store.get_channel("B").await.unwrap().is_some());
}

#[tokio::test]
async fn seed_with_one_domain_neighbor_yields_one_channel() {
    let h = Harness::new();
    h.platform.set_subscriptions("SEED", vec![Some(vec!["A"])]);
    sailing_channel(&h.platform, "A", 5);

    let crawler = h.crawler();
    let walker = SubscriptionWalker::new(&crawler, h.platform.clone(), 3);
    walker
        .walk("SEED", &classifier(&h).await, &CancellationToken::new())
        .await;

    let ids = h.store.list_channel_ids().await.unwrap();
    assert_eq!(ids, vec!["A".to_string()]);

    let channel = h.store.get_channel("A").await.unwrap().unwrap();
    assert_eq!(channel.video_count, 5);
    assert_eq!(h.store.videos_of("A").len(), 5);
    assert!(h.store.non_domain_ids().is_empty());
    assert!(h.store.blacklist().await.unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_walk_stops_before_any_request() {
    let h = Harness::new();
    h.platform.set_subscriptions("SEED", vec![Some(vec!["A"])]);
    sailing_channel(&h.platform, "A", 1);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let crawler = h.crawler();
    let walker = SubscriptionWalker::new(&crawler, h.platform.clone(), 3);
    let report = walker.walk("SEED", &classifier(&h).await, &cancel).await;

    assert!(report.cancelled);
    assert!(h.platform.calls().is_empty());
}
