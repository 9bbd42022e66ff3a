use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::{info_span, Instrument};

use crate::request::PipelineRequest;
use crate::response::TranslateResponse;
use crate::state::ServerState;
use crate::translate::translate;

pub async fn post_translate(
    State(state): State<ServerState>,
    body: Bytes,
) -> (StatusCode, Json<TranslateResponse>) {
    state.metrics.translate_total.inc();

    let result = async {
        let request = PipelineRequest::from_body(&body)?;
        translate(&state, request).await
    }
    .instrument(info_span!("Translate request"))
    .await;

    if let Err(err) = &result {
        err.log("translate");
        state
            .metrics
            .translate_failures
            .with_label_values(&[err.kind()])
            .inc();
    }

    let (status, response) = TranslateResponse::shape(result);
    (status, Json(response))
}
