mod get_health;
mod get_metrics;
mod post_execute;
mod post_translate;

use axum::routing::{get, post};
use axum::Router;

use crate::state::ServerState;

pub use get_health::get_health;
pub use get_metrics::get_metrics;
pub use post_execute::post_execute;
pub use post_translate::post_translate;

pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .route("/translate", post(post_translate))
        .route("/execute", post(post_execute))
        .with_state(state)
}
