//! Run a validated statement against the database.

use std::time::Duration;

use query_engine_sql::sql::ValidatedStatement;
use sqlx::{Connection, PgConnection};
use tracing::{info_span, Instrument};

use crate::error::ExecutionError;
use crate::introspection::{statement_timeout, TIMEOUT_GRACE};
use crate::values::{record_from_row, Record};

/// What running a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Every row of the result set, fetched eagerly, in the order the database returned them.
    Rows(Vec<Record>),
    /// How many rows a write touched.
    RowsAffected(u64),
}

/// Execute a statement in its own transaction.
///
/// Reads run in a `READ ONLY` transaction that is always rolled back. Writes are committed on
/// success; on error, timeout or cancellation the transaction is dropped and rolled back. The
/// statement runs under `statement_timeout`, with a client-side bound slightly past it.
pub async fn execute(
    connection: &mut PgConnection,
    statement: &ValidatedStatement,
    timeout: Duration,
) -> Result<ExecutionOutcome, ExecutionError> {
    tracing::debug!(
        sql = %sqlformat::format(
            statement.sql_text(),
            &sqlformat::QueryParams::None,
            sqlformat::FormatOptions::default()
        ),
        "executing statement",
    );

    let span = info_span!(
        "Execute statement",
        kind = %statement.kind(),
        read_only = statement.is_read_only()
    );
    match tokio::time::timeout(timeout + TIMEOUT_GRACE, run(connection, statement, timeout))
        .instrument(span)
        .await
    {
        Ok(result) => result,
        Err(_) => Err(ExecutionError::Timeout(timeout)),
    }
}

async fn run(
    connection: &mut PgConnection,
    statement: &ValidatedStatement,
    timeout: Duration,
) -> Result<ExecutionOutcome, ExecutionError> {
    let to_error = |err| ExecutionError::from_sqlx(err, timeout);

    let mut transaction = connection.begin().await.map_err(to_error)?;
    if statement.is_read_only() {
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *transaction)
            .await
            .map_err(to_error)?;
    }
    sqlx::query(&statement_timeout(timeout))
        .execute(&mut *transaction)
        .await
        .map_err(to_error)?;

    // The model's literals are inline, so the whole text is the unit of execution. The extended
    // protocol refuses to run more than one statement.
    let query = sqlx::query(statement.sql_text()).persistent(false);
    let outcome = if statement.returns_rows() {
        let rows = query.fetch_all(&mut *transaction).await.map_err(to_error)?;
        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        ExecutionOutcome::Rows(records)
    } else {
        let result = query.execute(&mut *transaction).await.map_err(to_error)?;
        ExecutionOutcome::RowsAffected(result.rows_affected())
    };

    if statement.is_read_only() {
        transaction.rollback().await.map_err(to_error)?;
    } else {
        transaction.commit().await.map_err(to_error)?;
    }

    match &outcome {
        ExecutionOutcome::Rows(records) => {
            tracing::info!(rows = records.len(), "statement returned rows");
        }
        ExecutionOutcome::RowsAffected(count) => {
            tracing::info!(rows_affected = count, "statement affected rows");
        }
    }
    Ok(outcome)
}
