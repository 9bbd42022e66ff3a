//! Steps both endpoints share: connecting, reading the schema and validating a candidate.

use std::sync::Arc;

use query_engine_execution::metrics::update_pool_metrics;
use query_engine_execution::{ConnectionParams, ScopedConnection};
use query_engine_metadata::metadata::SchemaDescription;
use query_engine_sql::sql::{validate, ValidatedStatement, ValidationError};
use tracing::{info_span, Instrument};

use crate::error::PipelineError;
use crate::state::ServerState;

/// Acquire a connection for this request.
pub async fn connect(
    state: &ServerState,
    params: &ConnectionParams,
) -> Result<ScopedConnection, PipelineError> {
    let connection = state.pools.acquire(params).await;
    update_pool_metrics(&state.pools, &state.metrics);
    Ok(connection?)
}

pub async fn load_schema(
    state: &ServerState,
    connection: &mut ScopedConnection,
    params: &ConnectionParams,
) -> Result<Arc<SchemaDescription>, PipelineError> {
    let schema = state
        .schema_cache
        .load(connection, params, state.configuration.timeouts.schema_read)
        .await?;
    Ok(schema)
}

/// Validate a candidate statement.
///
/// When the candidate names a table or column the cached description lacks, the schema is read
/// again. If it changed, the candidate is judged against the fresh description; otherwise the
/// original rejection stands. `held` is the request's connection, if it still has one.
pub async fn validate_candidate(
    state: &ServerState,
    params: &ConnectionParams,
    candidate: &str,
    schema: &SchemaDescription,
    held: Option<&mut ScopedConnection>,
) -> Result<ValidatedStatement, PipelineError> {
    let span = info_span!("Validate statement");
    async move {
        let err = match validate(candidate, schema) {
            Ok(statement) => return Ok(statement),
            Err(err) => err,
        };
        if !(err.is_unknown_identifier() && state.schema_cache.is_enabled()) {
            return Err(rejected(state, err));
        }

        let timeout = state.configuration.timeouts.schema_read;
        let (fresh, mismatch) = match held {
            Some(connection) => state.schema_cache.refresh(connection, params, timeout).await?,
            None => {
                let mut connection = connect(state, params).await?;
                let refreshed = state
                    .schema_cache
                    .refresh(&mut connection, params, timeout)
                    .await;
                connection.release().await;
                refreshed?
            }
        };
        if mismatch.is_empty() {
            return Err(rejected(state, err));
        }
        validate(candidate, &fresh).map_err(|err| rejected(state, err))
    }
    .instrument(span)
    .await
}

fn rejected(state: &ServerState, err: ValidationError) -> PipelineError {
    tracing::info!(code = err.code(), reason = %err, "candidate statement rejected");
    state
        .metrics
        .validation_rejections
        .with_label_values(&[err.code()])
        .inc();
    PipelineError::Validation(err)
}
