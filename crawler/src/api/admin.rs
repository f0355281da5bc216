use crate::error::CrawlResult;
use crate::models::{
    AdminActionResponse, AdminBlacklistRequest, AdminCandidateRequest, AdminStats, AdminToken,
    DiscoveryCandidate, ErrorResponse,
};
use crate::services::store::CrawlStore;
use crate::AppState;
use chrono::Utc;
use log::{error, info};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, post, State};

#[get("/stats")]
pub async fn admin_stats(
    _token: AdminToken,
    state: &State<AppState>,
) -> Result<Json<AdminStats>, ErrorResponse> {
    match state.store.stats().await {
        Ok(stats) => {
            info!("Admin stats retrieved successfully");
            Ok(Json(stats))
        }
        Err(e) => {
            error!("Failed to get admin stats: {e}");
            Err(ErrorResponse::new("Stats unavailable", e))
        }
    }
}

#[get("/candidates")]
pub async fn get_candidates(
    _token: AdminToken,
    state: &State<AppState>,
) -> Result<Json<Vec<DiscoveryCandidate>>, ErrorResponse> {
    state
        .queue
        .pending()
        .await
        .map(Json)
        .map_err(|e| {
            error!("Failed to read discovery queue: {e}");
            ErrorResponse::new("Queue unavailable", e)
        })
}

#[post("/candidates", data = "<request>")]
pub async fn add_candidate(
    _token: AdminToken,
    state: &State<AppState>,
    request: Json<AdminCandidateRequest>,
) -> Result<Json<AdminActionResponse>, Status> {
    let channel_id = request.channel_id.trim();
    if channel_id.is_empty() {
        return Err(Status::BadRequest);
    }

    match state
        .queue
        .add_channel(channel_id, request.ignore_sailing_term, Utc::now().timestamp())
        .await
    {
        Ok(true) => Ok(Json(AdminActionResponse {
            success: true,
            message: format!("Channel {channel_id} queued"),
        })),
        Ok(false) => Ok(Json(AdminActionResponse {
            success: false,
            message: format!("Channel {channel_id} is already known"),
        })),
        Err(e) => {
            error!("Failed to queue channel {channel_id}: {e}");
            Err(Status::InternalServerError)
        }
    }
}

/// Blacklists a channel and removes everything stored for it right away.
#[post("/blacklist", data = "<request>")]
pub async fn blacklist_channel(
    _token: AdminToken,
    state: &State<AppState>,
    request: Json<AdminBlacklistRequest>,
) -> Result<Json<AdminActionResponse>, Status> {
    let channel_id = request.channel_id.trim();
    if channel_id.is_empty() {
        return Err(Status::BadRequest);
    }

    match blacklist_and_remove(state.store.as_ref(), channel_id).await {
        Ok(()) => {
            info!("Channel {channel_id} blacklisted");
            Ok(Json(AdminActionResponse {
                success: true,
                message: format!("Channel {channel_id} blacklisted and removed"),
            }))
        }
        Err(e) => {
            error!("Failed to blacklist channel {channel_id}: {e}");
            Err(Status::InternalServerError)
        }
    }
}

async fn blacklist_and_remove(store: &dyn CrawlStore, channel_id: &str) -> CrawlResult<()> {
    store.add_blacklist_entry(channel_id).await?;
    store.delete_channel(channel_id).await?;
    store.remove_candidate(channel_id).await
}
