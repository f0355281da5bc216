use crate::models::{Channel, ErrorResponse};
use crate::AppState;
use log::error;
use rocket::serde::json::Json;
use rocket::{get, State};

const DEFAULT_LIMIT: usize = 25;
const MAX_LIMIT: usize = 100;

/// Channels ranked by their view-trend popularity score.
#[get("/popular?<limit>")]
pub async fn popular_channels(
    limit: Option<usize>,
    state: &State<AppState>,
) -> Result<Json<Vec<Channel>>, ErrorResponse> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    match state.store.top_channels(limit).await {
        Ok(channels) => Ok(Json(channels)),
        Err(e) => {
            error!("Failed to load popular channels: {e}");
            Err(ErrorResponse::new("Ranking failed", e))
        }
    }
}
