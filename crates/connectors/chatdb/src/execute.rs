//! Validate and run a SQL statement supplied by the caller.

use query_engine_execution::{
    execute as execute_statement, ConnectionParams, ExecutionError, ExecutionOutcome,
    ScopedConnection,
};

use crate::error::PipelineError;
use crate::pipeline::{connect, load_schema, validate_candidate};
use crate::request::PipelineRequest;
use crate::state::ServerState;

/// SQLSTATEs meaning the statement named something the database does not have.
const UNDEFINED_OBJECT_CODES: [&str; 2] = ["42P01", "42703"];

pub async fn execute(
    state: &ServerState,
    request: PipelineRequest,
) -> Result<ExecutionOutcome, PipelineError> {
    let (sql, params) = request.resolve(&state.configuration.database)?;

    let mut connection = connect(state, &params).await?;
    let result = execute_on(state, &mut connection, &params, &sql).await;
    connection.release().await;
    result
}

async fn execute_on(
    state: &ServerState,
    connection: &mut ScopedConnection,
    params: &ConnectionParams,
    sql: &str,
) -> Result<ExecutionOutcome, PipelineError> {
    let schema = load_schema(state, connection, params).await?;
    let statement =
        validate_candidate(state, params, sql, &schema, Some(&mut *connection)).await?;

    match execute_statement(connection, &statement, state.configuration.timeouts.execution).await
    {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            if let ExecutionError::Database { code, .. } = &err {
                if UNDEFINED_OBJECT_CODES.contains(&code.as_str()) {
                    // the cached description no longer matches the database
                    state.schema_cache.invalidate(params);
                }
            }
            Err(err.into())
        }
    }
}
