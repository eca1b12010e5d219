use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::error::ApiError;
use crate::state::AppState;
use crate::status::TargetStatus;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/targets", get(list_targets))
        .route("/targets/{name}", get(get_target))
}

/// GET /api/v1/targets
async fn list_targets(State(state): State<AppState>) -> Json<Vec<TargetStatus>> {
    Json(state.statuses())
}

/// GET /api/v1/targets/:name
async fn get_target(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TargetStatus>, ApiError> {
    state
        .targets
        .get(&name)
        .map(|entry| Json(entry.value().clone()))
        .ok_or_else(|| ApiError::NotFound(format!("Target '{}' not found", name)))
}
