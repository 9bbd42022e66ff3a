use axum::extract::State;
use axum::http::StatusCode;
use prometheus::Encoder;

use query_engine_execution::metrics::update_pool_metrics;

use crate::state::ServerState;

/// Metrics in the Prometheus text exposition format.
pub async fn get_metrics(State(state): State<ServerState>) -> Result<String, (StatusCode, String)> {
    update_pool_metrics(&state.pools, &state.metrics);

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&state.metrics_registry.gather(), &mut buffer)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    String::from_utf8(buffer).map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
}
