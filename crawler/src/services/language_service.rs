use crate::error::{CrawlError, CrawlResult};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const BASE_URL: &str = "https://ws.detectlanguage.com/0.2/detect";
const MAX_TEXT_CHARS: usize = 4000;

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub language: String,
    pub is_reliable: bool,
}

#[async_trait]
pub trait LanguageDetector: Send + Sync {
    /// Best guess for `text`, or `None` when every credential failed.
    async fn detect(&self, text: &str) -> Option<Detection>;
}

#[derive(Debug, Deserialize)]
struct DetectLanguageResponse {
    data: DetectLanguageData,
}

#[derive(Debug, Deserialize)]
struct DetectLanguageData {
    #[serde(default)]
    detections: Vec<DetectionItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectionItem {
    language: String,
    #[serde(default)]
    is_reliable: bool,
}

/// detectlanguage.com client with its own small key pool.
///
/// Keys are tried in order; a failing key hands over to the next one until
/// the pool is exhausted.
pub struct DetectLanguageClient {
    client: Client,
    api_keys: Vec<String>,
}

impl DetectLanguageClient {
    pub fn new(api_keys: Vec<String>, timeout: Duration) -> CrawlResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| CrawlError::Request {
                endpoint: "detect",
                source,
            })?;

        Ok(DetectLanguageClient { client, api_keys })
    }

    async fn detect_with_key(&self, text: &str, api_key: &str) -> CrawlResult<Option<Detection>> {
        let response = self
            .client
            .post(BASE_URL)
            .bearer_auth(api_key)
            .form(&[("q", text)])
            .send()
            .await
            .map_err(|source| CrawlError::Request {
                endpoint: "detect",
                source,
            })?;

        if !response.status().is_success() {
            return Err(CrawlError::Status {
                endpoint: "detect",
                status: response.status().as_u16(),
            });
        }

        let body = response
            .json::<DetectLanguageResponse>()
            .await
            .map_err(|e| CrawlError::payload("detect", e))?;

        Ok(body.data.detections.into_iter().next().map(|d| Detection {
            language: d.language.to_lowercase(),
            is_reliable: d.is_reliable,
        }))
    }
}

#[async_trait]
impl LanguageDetector for DetectLanguageClient {
    async fn detect(&self, text: &str) -> Option<Detection> {
        let text: String = text.chars().take(MAX_TEXT_CHARS).collect();
        if text.trim().is_empty() {
            return None;
        }

        for (index, api_key) in self.api_keys.iter().enumerate() {
            match self.detect_with_key(&text, api_key).await {
                Ok(detection) => return detection,
                Err(e) => warn!("Language detection with key #{index} failed: {e}"),
            }
        }

        debug!("Language detection key pool exhausted");
        None
    }
}
