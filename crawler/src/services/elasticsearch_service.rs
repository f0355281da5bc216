use crate::error::{CrawlError, CrawlResult};
use crate::models::{
    AdminStats, Channel, DiscoveryCandidate, NonDomainChannel, Snapshot, SnapshotKind, Video,
};
use crate::services::store::CrawlStore;
use async_trait::async_trait;
use elasticsearch::http::response::Response;
use elasticsearch::{
    indices::IndicesCreateParts, params::Refresh, ClearScrollParts, CountParts,
    DeleteByQueryParts, DeleteParts, Elasticsearch, GetParts, IndexParts, ScrollParts,
    SearchParts, UpdateParts,
};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Page size of full-collection scans; the scroll walks every page.
const SCAN_PAGE_SIZE: usize = 1000;
const SCROLL_KEEP_ALIVE: &str = "1m";
const LAST_SUBSCRIBER_CRAWL: &str = "lastSubscriberCrawl";

const CHANNELS: &str = "channels";
const VIDEOS: &str = "videos";
const VIEWS: &str = "views";
const SUBSCRIBERS: &str = "subscribers";
const ADDITIONAL: &str = "additional";
const NON_DOMAIN: &str = "nonsailingchannels";
const DOMAIN_TERMS: &str = "sailingterms";
const BLACKLIST: &str = "blacklist";
const SETTINGS: &str = "settings";

/// Document store backed by one Elasticsearch index per collection, all
/// prefixed with the environment namespace (`sailing-channels`, `sailing-channels-dev`).
#[derive(Clone)]
pub struct ElasticsearchStore {
    client: Elasticsearch,
    namespace: String,
}

impl ElasticsearchStore {
    pub fn new(client: Elasticsearch, namespace: &str) -> Self {
        ElasticsearchStore {
            client,
            namespace: namespace.to_string(),
        }
    }

    fn index(&self, collection: &str) -> String {
        format!("{}-{}", self.namespace, collection)
    }

    fn snapshot_index(&self, kind: SnapshotKind) -> String {
        match kind {
            SnapshotKind::Subscribers => self.index(SUBSCRIBERS),
            SnapshotKind::Views => self.index(VIEWS),
        }
    }

    /// Creates every index with its mapping; existing indices are left alone.
    pub async fn create_indices(&self) {
        let channel_id_mapping = json!({
            "mappings": {
                "properties": {
                    "channel_id": { "type": "keyword" },
                    "date": { "type": "integer" },
                    "published_at": { "type": "long" },
                    "updated_at": { "type": "long" },
                    "value": { "type": "long" }
                }
            }
        });

        let channel_mapping = json!({
            "mappings": {
                "properties": {
                    "id": { "type": "keyword" },
                    "title": { "type": "text" },
                    "last_crawl": { "type": "long" },
                    "last_upload_at": { "type": "long" },
                    "popularity": { "type": "double" }
                }
            }
        });

        let plain_mapping = json!({ "mappings": { "properties": {} } });

        let indices = [
            (CHANNELS, &channel_mapping),
            (VIDEOS, &channel_id_mapping),
            (VIEWS, &channel_id_mapping),
            (SUBSCRIBERS, &channel_id_mapping),
            (ADDITIONAL, &channel_id_mapping),
            (NON_DOMAIN, &channel_id_mapping),
            (DOMAIN_TERMS, &plain_mapping),
            (BLACKLIST, &channel_id_mapping),
            (SETTINGS, &plain_mapping),
        ];

        for (collection, mapping) in indices {
            let index = self.index(collection);
            match self
                .client
                .indices()
                .create(IndicesCreateParts::Index(&index))
                .body(mapping.clone())
                .send()
                .await
            {
                Ok(response) => {
                    if response.status_code().is_success() {
                        info!("Elasticsearch index '{index}' created.");
                    } else {
                        let response_text = response.text().await.unwrap_or_default();
                        if response_text.contains("resource_already_exists_exception") {
                            info!("Elasticsearch index '{index}' already exists.");
                        } else {
                            error!("Failed to create Elasticsearch index '{index}': {response_text}");
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to connect to Elasticsearch to create index '{index}': {e:?}");
                }
            }
        }
    }

    async fn get_source<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
        operation: &'static str,
    ) -> CrawlResult<Option<T>> {
        let index = self.index(collection);
        let response = self.client.get(GetParts::IndexId(&index, id)).send().await?;

        if response.status_code().as_u16() == 404 {
            return Ok(None);
        }

        let body: Value = ensure_success(response, operation).await?.json().await?;
        serde_json::from_value(body["_source"].clone())
            .map(Some)
            .map_err(|e| CrawlError::store(operation, e))
    }

    async fn exists(&self, collection: &str, id: &str, operation: &'static str) -> CrawlResult<bool> {
        let index = self.index(collection);
        let response = self.client.get(GetParts::IndexId(&index, id)).send().await?;

        match response.status_code().as_u16() {
            404 => Ok(false),
            _ => ensure_success(response, operation).await.map(|_| true),
        }
    }

    async fn put_document(
        &self,
        index: &str,
        id: &str,
        body: Value,
        refresh: bool,
        operation: &'static str,
    ) -> CrawlResult<()> {
        let mut request = self.client.index(IndexParts::IndexId(index, id)).body(body);
        if refresh {
            request = request.refresh(Refresh::WaitFor);
        }

        ensure_success(request.send().await?, operation).await?;
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: &str, operation: &'static str) -> CrawlResult<()> {
        let response = self.client.delete(DeleteParts::IndexId(index, id)).send().await?;

        if response.status_code().as_u16() == 404 {
            return Ok(());
        }
        ensure_success(response, operation).await?;
        Ok(())
    }

    async fn delete_by_channel(&self, index: &str, channel_id: &str) -> CrawlResult<()> {
        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&[index]))
            .body(json!({
                "query": {
                    "term": { "channel_id": channel_id }
                }
            }))
            .send()
            .await?;

        if response.status_code().as_u16() == 404 {
            return Ok(());
        }
        ensure_success(response, "delete_by_channel").await?;
        Ok(())
    }

    async fn search(&self, index: &str, body: Value, operation: &'static str) -> CrawlResult<Vec<Value>> {
        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(body)
            .send()
            .await?;

        if response.status_code().as_u16() == 404 {
            return Ok(Vec::new());
        }

        let body: Value = ensure_success(response, operation).await?.json().await?;
        Ok(body["hits"]["hits"].as_array().cloned().unwrap_or_default())
    }

    async fn search_sources<T: DeserializeOwned>(
        &self,
        index: &str,
        body: Value,
        operation: &'static str,
    ) -> CrawlResult<Vec<T>> {
        let hits = self.search(index, body, operation).await?;

        hits.into_iter()
            .map(|hit| {
                serde_json::from_value(hit["_source"].clone())
                    .map_err(|e| CrawlError::store(operation, e))
            })
            .collect()
    }

    /// Reads every hit of `query` through a scroll, page by page.
    async fn scan(
        &self,
        index: &str,
        query: Value,
        with_source: bool,
        operation: &'static str,
    ) -> CrawlResult<Vec<Value>> {
        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .scroll(SCROLL_KEEP_ALIVE)
            .body(json!({
                "size": SCAN_PAGE_SIZE,
                "query": query,
                "_source": with_source,
                "sort": ["_doc"]
            }))
            .send()
            .await?;

        if response.status_code().as_u16() == 404 {
            return Ok(Vec::new());
        }

        let mut page: Value = ensure_success(response, operation).await?.json().await?;
        let mut hits = Vec::new();
        let mut last_scroll_id = None;

        loop {
            let (batch, scroll_id) = scroll_page(&page);
            let done = batch.len() < SCAN_PAGE_SIZE;
            hits.extend(batch);
            if scroll_id.is_some() {
                last_scroll_id = scroll_id;
            }

            let scroll_id = match (&last_scroll_id, done) {
                (Some(id), false) => id.clone(),
                _ => break,
            };
            let response = self
                .client
                .scroll(ScrollParts::None)
                .body(json!({ "scroll": SCROLL_KEEP_ALIVE, "scroll_id": scroll_id }))
                .send()
                .await?;
            page = ensure_success(response, operation).await?.json().await?;
        }

        if let Some(scroll_id) = last_scroll_id {
            if let Err(e) = self
                .client
                .clear_scroll(ClearScrollParts::None)
                .body(json!({ "scroll_id": [scroll_id] }))
                .send()
                .await
            {
                warn!("Failed to clear scroll of {operation}: {e}");
            }
        }

        debug!("{operation} scanned {} documents in {index}", hits.len());
        Ok(hits)
    }

    async fn search_ids(&self, collection: &str, operation: &'static str) -> CrawlResult<Vec<String>> {
        let hits = self
            .scan(
                &self.index(collection),
                json!({ "match_all": {} }),
                false,
                operation,
            )
            .await?;

        Ok(hits
            .iter()
            .filter_map(|hit| hit["_id"].as_str().map(String::from))
            .collect())
    }

    async fn count(&self, index: &str, query: Value) -> CrawlResult<i64> {
        let response = self
            .client
            .count(CountParts::Index(&[index]))
            .body(json!({ "query": query }))
            .send()
            .await?;

        if response.status_code().as_u16() == 404 {
            return Ok(0);
        }

        let body: Value = ensure_success(response, "count").await?.json().await?;
        Ok(body["count"].as_i64().unwrap_or(0))
    }
}

/// Hits and scroll id of one scroll response.
fn scroll_page(body: &Value) -> (Vec<Value>, Option<String>) {
    let hits = body["hits"]["hits"].as_array().cloned().unwrap_or_default();
    let scroll_id = body["_scroll_id"].as_str().map(String::from);
    (hits, scroll_id)
}

async fn ensure_success(response: Response, operation: &'static str) -> CrawlResult<Response> {
    let status = response.status_code();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    Err(CrawlError::store(
        operation,
        format!("status {}: {}", status.as_u16(), text),
    ))
}

#[async_trait]
impl CrawlStore for ElasticsearchStore {
    async fn get_channel(&self, id: &str) -> CrawlResult<Option<Channel>> {
        self.get_source(CHANNELS, id, "get_channel").await
    }

    async fn upsert_channel(&self, channel: &Channel) -> CrawlResult<()> {
        self.put_document(
            &self.index(CHANNELS),
            &channel.id,
            json!(channel),
            false,
            "upsert_channel",
        )
        .await
    }

    async fn list_channel_ids(&self) -> CrawlResult<Vec<String>> {
        self.search_ids(CHANNELS, "list_channel_ids").await
    }

    async fn top_channels(&self, limit: usize) -> CrawlResult<Vec<Channel>> {
        self.search_sources(
            &self.index(CHANNELS),
            json!({
                "size": limit,
                "query": { "match_all": {} },
                "sort": [ { "popularity": { "order": "desc" } } ]
            }),
            "top_channels",
        )
        .await
    }

    async fn set_channel_video_stats(
        &self,
        id: &str,
        video_count: i64,
        last_upload_at: i64,
    ) -> CrawlResult<()> {
        let index = self.index(CHANNELS);
        let response = self
            .client
            .update(UpdateParts::IndexId(&index, id))
            .body(json!({
                "doc": {
                    "video_count": video_count,
                    "last_upload_at": last_upload_at
                }
            }))
            .send()
            .await?;

        if response.status_code().as_u16() == 404 {
            return Ok(());
        }
        ensure_success(response, "set_channel_video_stats").await?;
        Ok(())
    }

    async fn delete_channel(&self, id: &str) -> CrawlResult<()> {
        self.delete_document(&self.index(CHANNELS), id, "delete_channel")
            .await?;
        self.delete_by_channel(&self.index(VIDEOS), id).await?;
        self.delete_by_channel(&self.index(VIEWS), id).await?;
        self.delete_by_channel(&self.index(SUBSCRIBERS), id).await?;

        info!("Deleted channel {id} with its videos and snapshots");
        Ok(())
    }

    async fn get_video(&self, id: &str) -> CrawlResult<Option<Video>> {
        self.get_source(VIDEOS, id, "get_video").await
    }

    async fn upsert_video(&self, video: &Video) -> CrawlResult<()> {
        self.put_document(
            &self.index(VIDEOS),
            &video.id,
            json!(video),
            true,
            "upsert_video",
        )
        .await
    }

    async fn delete_video(&self, id: &str) -> CrawlResult<()> {
        self.delete_document(&self.index(VIDEOS), id, "delete_video")
            .await
    }

    async fn count_videos(&self, channel_id: &str) -> CrawlResult<i64> {
        self.count(
            &self.index(VIDEOS),
            json!({ "term": { "channel_id": channel_id } }),
        )
        .await
    }

    async fn upsert_snapshot(&self, kind: SnapshotKind, snapshot: &Snapshot) -> CrawlResult<()> {
        self.put_document(
            &self.snapshot_index(kind),
            &snapshot.document_id(),
            json!(snapshot),
            true,
            "upsert_snapshot",
        )
        .await
    }

    async fn recent_snapshots(
        &self,
        kind: SnapshotKind,
        channel_id: &str,
        limit: usize,
    ) -> CrawlResult<Vec<Snapshot>> {
        self.search_sources(
            &self.snapshot_index(kind),
            json!({
                "size": limit,
                "query": { "term": { "channel_id": channel_id } },
                "sort": [ { "date": { "order": "desc" } } ]
            }),
            "recent_snapshots",
        )
        .await
    }

    async fn add_candidate(&self, candidate: &DiscoveryCandidate) -> CrawlResult<()> {
        self.put_document(
            &self.index(ADDITIONAL),
            &candidate.channel_id,
            json!(candidate),
            false,
            "add_candidate",
        )
        .await
    }

    async fn list_candidates(&self) -> CrawlResult<Vec<DiscoveryCandidate>> {
        let hits = self
            .scan(
                &self.index(ADDITIONAL),
                json!({ "match_all": {} }),
                true,
                "list_candidates",
            )
            .await?;

        hits.into_iter()
            .map(|hit| {
                serde_json::from_value(hit["_source"].clone())
                    .map_err(|e| CrawlError::store("list_candidates", e))
            })
            .collect()
    }

    async fn remove_candidate(&self, channel_id: &str) -> CrawlResult<()> {
        self.delete_document(&self.index(ADDITIONAL), channel_id, "remove_candidate")
            .await
    }

    async fn is_non_domain(&self, channel_id: &str) -> CrawlResult<bool> {
        self.exists(NON_DOMAIN, channel_id, "is_non_domain").await
    }

    async fn record_non_domain(&self, entry: &NonDomainChannel) -> CrawlResult<()> {
        self.put_document(
            &self.index(NON_DOMAIN),
            &entry.channel_id,
            json!(entry),
            false,
            "record_non_domain",
        )
        .await
    }

    async fn domain_terms(&self) -> CrawlResult<Vec<String>> {
        let terms = self.search_ids(DOMAIN_TERMS, "domain_terms").await?;
        Ok(terms.into_iter().map(|term| term.to_lowercase()).collect())
    }

    async fn blacklist(&self) -> CrawlResult<Vec<String>> {
        self.search_ids(BLACKLIST, "blacklist").await
    }

    async fn add_blacklist_entry(&self, channel_id: &str) -> CrawlResult<()> {
        self.put_document(
            &self.index(BLACKLIST),
            channel_id,
            json!({
                "channel_id": channel_id,
                "added_at": chrono::Utc::now().timestamp()
            }),
            false,
            "add_blacklist_entry",
        )
        .await
    }

    async fn last_subscriber_crawl(&self) -> CrawlResult<Option<i64>> {
        let setting: Option<Value> = self
            .get_source(SETTINGS, LAST_SUBSCRIBER_CRAWL, "last_subscriber_crawl")
            .await?;

        Ok(setting.and_then(|s| s["value"].as_i64()))
    }

    async fn set_last_subscriber_crawl(&self, timestamp: i64) -> CrawlResult<()> {
        self.put_document(
            &self.index(SETTINGS),
            LAST_SUBSCRIBER_CRAWL,
            json!({ "value": timestamp }),
            false,
            "set_last_subscriber_crawl",
        )
        .await
    }

    async fn stats(&self) -> CrawlResult<AdminStats> {
        let match_all = json!({ "match_all": {} });

        Ok(AdminStats {
            total_channels: self.count(&self.index(CHANNELS), match_all.clone()).await?,
            total_videos: self.count(&self.index(VIDEOS), match_all.clone()).await?,
            pending_candidates: self.count(&self.index(ADDITIONAL), match_all.clone()).await?,
            non_domain_channels: self.count(&self.index(NON_DOMAIN), match_all).await?,
            last_subscriber_crawl: self.last_subscriber_crawl().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_page_reads_hits_and_id() {
        let body = json!({
            "_scroll_id": "c2Nyb2xs",
            "hits": { "hits": [ { "_id": "UC1" }, { "_id": "UC2" } ] }
        });

        let (hits, scroll_id) = scroll_page(&body);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1]["_id"], "UC2");
        assert_eq!(scroll_id.as_deref(), Some("c2Nyb2xs"));
    }

    #[test]
    fn exhausted_scroll_has_no_hits() {
        let body = json!({ "_scroll_id": "c2Nyb2xs", "hits": { "hits": [] } });

        let (hits, _) = scroll_page(&body);

        assert!(hits.is_empty());
        assert!(hits.len() < SCAN_PAGE_SIZE);
    }
}
