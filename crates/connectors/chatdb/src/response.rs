//! Shape pipeline outcomes into the bodies callers see.
//!
//! Translate always answers `{sql_query, error_reason}`, with exactly one of the two non-empty.
//! Execute answers a JSON array of records for reads, `{"rowcount": N}` for writes and
//! `{"error", "code", "kind"}` for failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use query_engine_execution::{ExecutionOutcome, Record};
use query_engine_sql::sql::ValidatedStatement;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub sql_query: String,
    pub error_reason: String,
}

impl TranslateResponse {
    pub fn shape(result: Result<ValidatedStatement, PipelineError>) -> (StatusCode, Self) {
        match result {
            Ok(statement) => (
                StatusCode::OK,
                TranslateResponse {
                    sql_query: statement.sql_text().to_string(),
                    error_reason: String::new(),
                },
            ),
            Err(err) => {
                let status = match err {
                    PipelineError::BadRequest(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::OK,
                };
                (
                    status,
                    TranslateResponse {
                        sql_query: String::new(),
                        error_reason: err.reason(),
                    },
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    pub kind: String,
}

impl From<&PipelineError> for ErrorBody {
    fn from(err: &PipelineError) -> Self {
        ErrorBody {
            error: err.reason(),
            code: err.code(),
            kind: err.kind().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCount {
    pub rowcount: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteResponse {
    Rows(Vec<Record>),
    RowCount(RowCount),
    Error(StatusCode, ErrorBody),
}

impl ExecuteResponse {
    pub fn shape(result: Result<ExecutionOutcome, PipelineError>) -> Self {
        match result {
            Ok(ExecutionOutcome::Rows(records)) => ExecuteResponse::Rows(records),
            Ok(ExecutionOutcome::RowsAffected(rowcount)) => {
                ExecuteResponse::RowCount(RowCount { rowcount })
            }
            Err(err) => ExecuteResponse::Error(err.status(), ErrorBody::from(&err)),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ExecuteResponse::Rows(_) | ExecuteResponse::RowCount(_) => StatusCode::OK,
            ExecuteResponse::Error(status, _) => *status,
        }
    }
}

impl IntoResponse for ExecuteResponse {
    fn into_response(self) -> Response {
        match self {
            ExecuteResponse::Rows(records) => (StatusCode::OK, Json(records)).into_response(),
            ExecuteResponse::RowCount(count) => (StatusCode::OK, Json(count)).into_response(),
            ExecuteResponse::Error(status, body) => (status, Json(body)).into_response(),
        }
    }
}
