//! Failures of the pipeline, one variant per stage.

use axum::http::StatusCode;
use query_engine_execution::{ConnectionError, ExecutionError, IntrospectionError};
use query_engine_sql::sql::ValidationError;
use thiserror::Error;

use crate::request::RequestError;

/// Returned in place of an empty message, which callers would read as success.
const UNSPECIFIED_REASON: &str = "The request failed for an unspecified reason";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    BadRequest(#[from] RequestError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    SchemaRead(#[from] IntrospectionError),
    #[error("{reason}")]
    Model { reason: String, timed_out: bool },
    #[error("{0}")]
    Unsupported(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl PipelineError {
    /// The broad class of failure, used as the `kind` of error bodies and as a metrics label.
    pub fn kind(&self) -> &'static str {
        if self.is_timeout() {
            return "timeout";
        }
        match self {
            PipelineError::BadRequest(_) => "bad_request",
            PipelineError::Connection(_)
            | PipelineError::SchemaRead(IntrospectionError::Connection(_))
            | PipelineError::Execution(ExecutionError::Connection(_)) => "connection_error",
            PipelineError::SchemaRead(_) => "schema_read_error",
            PipelineError::Model { .. } => "model_error",
            PipelineError::Unsupported(_) => "unsupported_query",
            PipelineError::Validation(_) => "validation_error",
            PipelineError::Execution(_) => "execution_error",
        }
    }

    /// A machine-usable code: the SQLSTATE for backend errors, otherwise a fixed name.
    pub fn code(&self) -> String {
        match self {
            PipelineError::BadRequest(_) => "bad_request".to_string(),
            PipelineError::Connection(err) => err.code().to_string(),
            PipelineError::SchemaRead(err) => err.code().to_string(),
            PipelineError::Model { timed_out, .. } => {
                if *timed_out { "model_timeout" } else { "model_error" }.to_string()
            }
            PipelineError::Unsupported(_) => "unsupported_query".to_string(),
            PipelineError::Validation(err) => err.code().to_string(),
            PipelineError::Execution(err) => err.code().to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            PipelineError::Connection(err) => err.is_timeout(),
            PipelineError::SchemaRead(IntrospectionError::Timeout(_)) => true,
            PipelineError::SchemaRead(IntrospectionError::Connection(err)) => err.is_timeout(),
            PipelineError::Model { timed_out, .. } => *timed_out,
            PipelineError::Execution(ExecutionError::Timeout(_)) => true,
            PipelineError::Execution(ExecutionError::Connection(err)) => err.is_timeout(),
            _ => false,
        }
    }

    /// Human-readable and never empty.
    pub fn reason(&self) -> String {
        let reason = self.to_string();
        if reason.trim().is_empty() {
            UNSPECIFIED_REASON.to_string()
        } else {
            reason
        }
    }

    /// The status the execute endpoint answers with.
    pub fn status(&self) -> StatusCode {
        if self.is_timeout() {
            return StatusCode::GATEWAY_TIMEOUT;
        }
        match self.kind() {
            "bad_request" => StatusCode::BAD_REQUEST,
            "validation_error" => StatusCode::UNPROCESSABLE_ENTITY,
            "connection_error" | "schema_read_error" | "model_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log the failure with the structured fields every error carries.
    pub fn log(&self, endpoint: &str) {
        tracing::error!(
            meta.signal_type = "log",
            event.domain = "chatdb",
            event.name = "Pipeline error",
            name = "Pipeline error",
            endpoint,
            kind = self.kind(),
            code = %self.code(),
            body = %self.reason(),
            error = true,
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn classifies_each_stage() {
        let cases = [
            (
                PipelineError::BadRequest(RequestError::MissingQuery),
                "bad_request",
                StatusCode::BAD_REQUEST,
            ),
            (
                PipelineError::Connection(ConnectionError::Rejected {
                    code: "28P01".to_string(),
                    message: "password authentication failed for user \"postgres\"".to_string(),
                }),
                "connection_error",
                StatusCode::BAD_GATEWAY,
            ),
            (
                PipelineError::Validation(ValidationError::UnknownColumn("experience".to_string())),
                "validation_error",
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                PipelineError::Execution(ExecutionError::Database {
                    code: "23505".to_string(),
                    message: "duplicate key value violates unique constraint".to_string(),
                }),
                "execution_error",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                PipelineError::Execution(ExecutionError::Timeout(Duration::from_secs(30))),
                "timeout",
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                PipelineError::Model {
                    reason: "model request timed out after 10 seconds".to_string(),
                    timed_out: true,
                },
                "timeout",
                StatusCode::GATEWAY_TIMEOUT,
            ),
        ];
        for (err, kind, status) in cases {
            assert_eq!(err.kind(), kind, "{err:?}");
            assert_eq!(err.status(), status, "{err:?}");
        }
    }

    #[test]
    fn backend_codes_and_messages_are_kept() {
        let err = PipelineError::Execution(ExecutionError::Database {
            code: "23505".to_string(),
            message: "duplicate key value violates unique constraint \"customers_pkey\"".to_string(),
        });
        assert_eq!(err.code(), "23505");
        assert_eq!(
            err.reason(),
            "duplicate key value violates unique constraint \"customers_pkey\""
        );
    }

    #[test]
    fn reasons_are_never_empty() {
        assert_eq!(
            PipelineError::Unsupported("  ".to_string()).reason(),
            UNSPECIFIED_REASON
        );
    }
}
