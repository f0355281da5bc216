//! Discovery crawler for a curated corpus of sailing channels.
//!
//! The crawler walks the public subscription graph from a seed channel,
//! keeps channels that mention a domain term, and periodically refreshes
//! their statistics, videos and daily snapshots in Elasticsearch. A small
//! rocket API exposes the popularity ranking and a few admin operations.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

use services::discovery_queue::DiscoveryQueue;
use services::store::CrawlStore;
use std::sync::Arc;

/// Shared state of the rocket handlers.
pub struct AppState {
    pub store: Arc<dyn CrawlStore>,
    pub queue: DiscoveryQueue,
    pub admin_token: String,
}

impl AppState {
    pub fn new(store: Arc<dyn CrawlStore>, admin_token: &str) -> Self {
        AppState {
            queue: DiscoveryQueue::new(store.clone()),
            store,
            admin_token: admin_token.to_string(),
        }
    }
}
