pub mod events;
pub mod policy;
pub mod targets;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(targets::router())
        .merge(events::router())
        .merge(policy::router())
}
