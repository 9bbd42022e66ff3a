//! Turn a natural-language request into a validated statement.

use query_engine_sql::sql::ValidatedStatement;
use query_engine_translation::translation::{build_prompt, TranslationResult};

use crate::error::PipelineError;
use crate::pipeline::{connect, load_schema, validate_candidate};
use crate::request::PipelineRequest;
use crate::state::ServerState;

/// Read the schema, prompt the model and validate what it answered. Nothing is executed.
///
/// The connection is only held while the schema is read, never across the model call.
pub async fn translate(
    state: &ServerState,
    request: PipelineRequest,
) -> Result<ValidatedStatement, PipelineError> {
    let (query, params) = request.resolve(&state.configuration.database)?;

    let schema = {
        let mut connection = connect(state, &params).await?;
        let schema = load_schema(state, &mut connection, &params).await;
        connection.release().await;
        schema?
    };

    let prompt = build_prompt(&query, &schema);
    let candidate = match state.translator.translate(&prompt).await {
        TranslationResult::Success { sql_text } => sql_text,
        TranslationResult::Unsupported { reason } => {
            return Err(PipelineError::Unsupported(reason))
        }
        TranslationResult::ModelError { reason, timed_out } => {
            return Err(PipelineError::Model { reason, timed_out })
        }
    };

    validate_candidate(state, &params, &candidate, &schema, None).await
}
