use axum::body::Bytes;
use axum::extract::State;
use tracing::{info_span, Instrument};

use crate::execute::execute;
use crate::request::PipelineRequest;
use crate::response::ExecuteResponse;
use crate::state::ServerState;

pub async fn post_execute(State(state): State<ServerState>, body: Bytes) -> ExecuteResponse {
    state.metrics.execute_total.inc();

    let result = async {
        let request = PipelineRequest::from_body(&body)?;
        execute(&state, request).await
    }
    .instrument(info_span!("Execute request"))
    .await;

    if let Err(err) = &result {
        err.log("execute");
        state
            .metrics
            .execute_failures
            .with_label_values(&[err.kind()])
            .inc();
    }

    ExecuteResponse::shape(result)
}
