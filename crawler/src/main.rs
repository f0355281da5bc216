#[macro_use]
extern crate rocket;

use anyhow::Result;
use channel_crawler::api::*;
use channel_crawler::config::{
    create_cors, create_store, init_logger, load_environment, CrawlerSettings,
};
use channel_crawler::services::announcer::{Announcer, LogAnnouncer, WebhookAnnouncer};
use channel_crawler::services::channel_crawler::ChannelCrawler;
use channel_crawler::services::feed_service::YoutubeFeedClient;
use channel_crawler::services::key_rotator::KeyRotator;
use channel_crawler::services::language_service::DetectLanguageClient;
use channel_crawler::services::orchestrator::{CrawlOrchestrator, CycleSettings};
use channel_crawler::services::staleness::StalenessPolicy;
use channel_crawler::services::store::CrawlStore;
use channel_crawler::services::youtube_service::YoutubeClient;
use channel_crawler::AppState;
use log::{error, info};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn create_announcer(settings: &CrawlerSettings) -> Result<Arc<dyn Announcer>> {
    match (&settings.announce_webhook_url, settings.development) {
        (Some(webhook), false) => Ok(Arc::new(WebhookAnnouncer::new(
            webhook,
            &settings.site_url,
            settings.request_timeout,
        )?)),
        _ => Ok(Arc::new(LogAnnouncer::new(&settings.site_url))),
    }
}

fn create_orchestrator(
    settings: &CrawlerSettings,
    store: Arc<dyn CrawlStore>,
) -> Result<CrawlOrchestrator> {
    let general_keys = KeyRotator::new("youtube", settings.youtube_api_keys.clone())?;
    let video_keys = KeyRotator::new("youtube-video", settings.youtube_video_api_keys.clone())?;
    info!(
        "Using {} general and {} per-video API keys",
        general_keys.len(),
        video_keys.len()
    );

    let platform = Arc::new(YoutubeClient::new(
        general_keys,
        video_keys,
        settings.request_timeout,
    )?);
    let feeds = Arc::new(YoutubeFeedClient::new(settings.request_timeout)?);
    let language = Arc::new(DetectLanguageClient::new(
        settings.detect_language_api_keys.clone(),
        settings.request_timeout,
    )?);

    let crawler = ChannelCrawler::new(
        store.clone(),
        platform.clone(),
        language,
        create_announcer(settings)?,
        StalenessPolicy::default(),
        settings.detect_language(),
    );

    Ok(CrawlOrchestrator::new(
        store,
        platform,
        feeds,
        crawler,
        CycleSettings {
            seed_channel_id: settings.seed_channel_id.clone(),
            max_depth: settings.max_depth,
            interval: settings.cycle_interval,
        },
    ))
}

#[rocket::main]
async fn main() -> Result<()> {
    load_environment();
    init_logger();

    let settings = CrawlerSettings::from_env()?;
    let store: Arc<dyn CrawlStore> = Arc::new(create_store(&settings).await?);
    let orchestrator = create_orchestrator(&settings, store.clone())?;

    let cancel = CancellationToken::new();
    let crawl_token = cancel.clone();
    let crawl_loop = tokio::spawn(async move { orchestrator.run(crawl_token).await });

    let launched = rocket::build()
        .manage(AppState::new(store, &settings.admin_token))
        .mount("/api/channels", routes![popular_channels])
        .mount(
            "/api/admin",
            routes![admin_stats, get_candidates, add_candidate, blacklist_channel],
        )
        .attach(create_cors(&settings)?)
        .launch()
        .await;

    info!("HTTP server stopped, shutting down crawler");
    cancel.cancel();
    if let Err(e) = crawl_loop.await {
        error!("Crawl loop ended abnormally: {e}");
    }

    launched?;
    Ok(())
}
