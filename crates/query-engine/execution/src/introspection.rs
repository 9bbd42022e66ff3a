//! Read the schema description from the live database.

use std::time::Duration;

use query_engine_metadata::metadata::{
    ColumnInfo, ForeignKey, Nullable, PortableType, SchemaDescription, TableInfo,
};
use sqlx::postgres::PgRow;
use sqlx::{Connection, PgConnection, Row};
use tracing::{info_span, Instrument};

use crate::error::IntrospectionError;

const INTROSPECTION_QUERY: &str = include_str!("introspection.sql");

/// Enumerate every table visible to the connected role, in a read-only transaction that is rolled
/// back before returning.
pub async fn introspect(
    connection: &mut PgConnection,
    timeout: Duration,
) -> Result<SchemaDescription, IntrospectionError> {
    let span = info_span!("Introspect schema");
    match tokio::time::timeout(timeout + TIMEOUT_GRACE, read_schema(connection, timeout))
        .instrument(span)
        .await
    {
        Ok(result) => result,
        Err(_) => Err(IntrospectionError::Timeout(timeout)),
    }
}

/// How long past the server-side timeout we wait before abandoning the call.
pub(crate) const TIMEOUT_GRACE: Duration = Duration::from_secs(1);

async fn read_schema(
    connection: &mut PgConnection,
    timeout: Duration,
) -> Result<SchemaDescription, IntrospectionError> {
    let to_error = |err| IntrospectionError::from_sqlx(err, timeout);

    let mut transaction = connection.begin().await.map_err(to_error)?;
    sqlx::query("SET TRANSACTION READ ONLY")
        .execute(&mut *transaction)
        .await
        .map_err(to_error)?;
    sqlx::query(&statement_timeout(timeout))
        .execute(&mut *transaction)
        .await
        .map_err(to_error)?;

    let rows = sqlx::query(INTROSPECTION_QUERY)
        .fetch_all(&mut *transaction)
        .await
        .map_err(to_error)?;
    transaction.rollback().await.map_err(to_error)?;

    let schema = group_columns(&rows).map_err(to_error)?;
    tracing::info!(tables = schema.tables.len(), "read database schema");
    Ok(schema)
}

pub(crate) fn statement_timeout(timeout: Duration) -> String {
    format!("SET LOCAL statement_timeout = {}", timeout.as_millis().max(1))
}

/// Rows arrive ordered by schema, table and ordinal position.
fn group_columns(rows: &[PgRow]) -> Result<SchemaDescription, sqlx::Error> {
    let mut tables: Vec<TableInfo> = Vec::new();
    for row in rows {
        let schema_name: String = row.try_get("schema_name")?;
        let table_name: String = row.try_get("table_name")?;
        let foreign_table: Option<String> = row.try_get("foreign_table")?;
        let foreign_column: Option<String> = row.try_get("foreign_column")?;
        let column = ColumnInfo {
            name: row.try_get::<String, _>("column_name")?,
            r#type: PortableType::from_declared_type(row.try_get::<&str, _>("data_type")?),
            nullable: if row.try_get::<bool, _>("is_nullable")? {
                Nullable::Nullable
            } else {
                Nullable::NonNullable
            },
            is_primary_key: row.try_get::<bool, _>("is_primary_key")?,
            foreign_key: foreign_table
                .zip(foreign_column)
                .map(|(table, column)| ForeignKey { table, column }),
        };

        match tables.last_mut() {
            Some(table) if table.schema_name == schema_name && table.table_name == table_name => {
                table.columns.push(column);
            }
            _ => tables.push(TableInfo {
                schema_name,
                table_name,
                columns: vec![column],
            }),
        }
    }
    Ok(SchemaDescription::new(tables))
}
