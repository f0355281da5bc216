pub mod announcer;
pub mod channel_crawler;
pub mod classifier;
pub mod discovery_queue;
pub mod elasticsearch_service;
pub mod feed_service;
pub mod key_rotator;
pub mod language_service;
pub mod memory_store;
pub mod orchestrator;
pub mod popularity;
pub mod staleness;
pub mod store;
pub mod video_sync;
pub mod walker;
pub mod youtube_service;
