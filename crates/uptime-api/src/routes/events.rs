use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use uptime_core::MonitorEvent;

use crate::error::ApiError;
use crate::state::{AppState, EVENT_HISTORY};

const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(list_events))
}

/// GET /api/v1/events?limit=N
async fn list_events(
    State(state): State<AppState>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> Result<Json<Vec<MonitorEvent>>, ApiError> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > EVENT_HISTORY {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            EVENT_HISTORY
        )));
    }
    Ok(Json(state.recent_events(limit)))
}
