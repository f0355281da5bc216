use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::Responder;
use rocket::{response, Response};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

pub const PRIVACY_PUBLIC: &str = "public";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub title: String,
    pub description: String,
    pub published_at: i64, // unix
    pub thumbnail: String,
    pub subscribers: i64,
    pub views: i64,
    pub subscribers_hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub detected_language: bool,
    pub last_crawl: i64, // unix
    pub video_count: i64,
    pub last_upload_at: i64, // unix
    pub popularity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub published_at: i64, // unix
    pub updated_at: i64,   // unix, time of the last statistics fetch
    pub views: i64,
    #[serde(default)]
    pub likes: Option<i64>,
    #[serde(default)]
    pub dislikes: Option<i64>,
    #[serde(default)]
    pub comments: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub privacy_status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    Subscribers,
    Views,
}

/// One data point of a daily time series, unique per (channel, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub channel_id: String,
    pub date: i32, // yyyymmdd
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub recorded_at: i64, // unix
    pub value: i64,
}

impl Snapshot {
    pub fn document_id(&self) -> String {
        format!("{}_{}", self.channel_id, self.date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryCandidate {
    pub channel_id: String,
    #[serde(default)]
    pub ignore_sailing_term: bool,
    pub added_at: i64, // unix
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonDomainChannel {
    pub channel_id: String,
    pub decided_at: i64, // unix
}

/// Channel statistics, snippet and branding as reported by the platform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelDetails {
    pub id: String,
    pub title: String,
    pub description: String,
    pub published_at: i64,
    pub thumbnail: String,
    pub subscriber_count: i64,
    pub view_count: i64,
    pub subscribers_hidden: bool,
    pub video_count: i64,
    pub country: Option<String>,
    pub keywords: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionItem {
    pub kind: String,
    pub channel_id: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionPage {
    pub items: Vec<SubscriptionItem>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoStub {
    pub id: String,
    pub title: String,
    pub description: String,
    pub published_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoPage {
    pub videos: Vec<VideoStub>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoDetails {
    pub id: String,
    pub title: String,
    pub description: String,
    pub published_at: i64,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub dislike_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub tags: Vec<String>,
    pub privacy_status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub published_at: i64,
    pub views: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminToken(pub String);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_channels: i64,
    pub total_videos: i64,
    pub pending_candidates: i64,
    pub non_domain_channels: i64,
    pub last_subscriber_crawl: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminCandidateRequest {
    pub channel_id: String,
    #[serde(default)]
    pub ignore_sailing_term: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminBlacklistRequest {
    pub channel_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminActionResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: impl ToString) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

impl<'r> Responder<'r, 'static> for ErrorResponse {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let json = serde_json::to_string(&self).unwrap_or_default();
        Response::build()
            .status(Status::InternalServerError)
            .header(ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}
