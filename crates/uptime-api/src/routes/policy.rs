use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use uptime_core::PolicyConfig;

use crate::state::AppState;

/// Retry policy applied to every target, in seconds.
#[derive(Debug, Serialize)]
pub struct PolicyView {
    pub timeout_secs: f64,
    pub max_retries: u32,
    pub retry_delay_secs: f64,
    pub shutdown_grace_secs: f64,
}

impl From<&PolicyConfig> for PolicyView {
    fn from(policy: &PolicyConfig) -> Self {
        Self {
            timeout_secs: policy.timeout.as_secs_f64(),
            max_retries: policy.max_retries,
            retry_delay_secs: policy.retry_delay.as_secs_f64(),
            shutdown_grace_secs: policy.shutdown_grace.as_secs_f64(),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/policy", get(get_policy))
}

/// GET /api/v1/policy
async fn get_policy(State(state): State<AppState>) -> Json<PolicyView> {
    Json(PolicyView::from(&state.policy))
}
