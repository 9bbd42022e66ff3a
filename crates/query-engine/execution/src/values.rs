//! Conversion of PostgreSQL rows into JSON records.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::types::{PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use uuid::Uuid;

use crate::error::ExecutionError;

/// One result row: column label to value, in projection order. SQL NULL is `Value::Null`.
pub type Record = IndexMap<String, Value>;

/// Convert a row, keeping every column. Repeated labels get a numeric suffix (`id`, `id_2`).
pub fn record_from_row(row: &PgRow) -> Result<Record, ExecutionError> {
    let mut record = Record::with_capacity(row.columns().len());
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.name(), column.type_info().name())?;
        record.insert(unique_label(&record, column.name()), value);
    }
    Ok(record)
}

fn unique_label(record: &Record, name: &str) -> String {
    if !record.contains_key(name) {
        return name.to_string();
    }
    (2..)
        .map(|suffix| format!("{name}_{suffix}"))
        .find(|label| !record.contains_key(label))
        .unwrap_or_else(|| name.to_string())
}

fn decode_column(
    row: &PgRow,
    index: usize,
    column: &str,
    type_name: &str,
) -> Result<Value, ExecutionError> {
    let raw = row.try_get_raw(index).map_err(|err| decode_error(column, type_name, &err))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    decode_by_type(row, index, type_name)
        .map_err(|err| decode_error(column, type_name, &err))?
        .ok_or_else(|| ExecutionError::Decode {
            column: column.to_string(),
            type_name: type_name.to_string(),
        })
}

fn decode_error(column: &str, type_name: &str, err: &sqlx::Error) -> ExecutionError {
    tracing::warn!(column, type_name, %err, "could not decode column");
    ExecutionError::Decode {
        column: column.to_string(),
        type_name: type_name.to_string(),
    }
}

/// Decode a non-null value based on its PostgreSQL type name. `None` means the type has no
/// JSON rendering.
fn decode_by_type(row: &PgRow, index: usize, type_name: &str) -> Result<Option<Value>, sqlx::Error> {
    let value = match type_name {
        "BOOL" => Value::Bool(row.try_get::<bool, _>(index)?),

        "INT2" => Value::from(row.try_get::<i16, _>(index)?),
        "INT4" => Value::from(row.try_get::<i32, _>(index)?),
        "INT8" => Value::from(row.try_get::<i64, _>(index)?),
        "OID" => Value::from(row.try_get::<sqlx::postgres::types::Oid, _>(index)?.0),

        "FLOAT4" => float(f64::from(row.try_get::<f32, _>(index)?)),
        "FLOAT8" => float(row.try_get::<f64, _>(index)?),

        // exact values travel as strings
        "NUMERIC" => Value::String(row.try_get::<Decimal, _>(index)?.to_string()),
        "MONEY" => Value::String(row.try_get::<PgMoney, _>(index)?.to_decimal(2).to_string()),

        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" | "XML" => {
            Value::String(row.try_get_unchecked::<String, _>(index)?)
        }

        "BYTEA" => {
            let bytes = row.try_get::<Vec<u8>, _>(index)?;
            let hex: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
            Value::String(format!("\\x{hex}"))
        }

        "DATE" => Value::String(row.try_get::<NaiveDate, _>(index)?.to_string()),
        "TIME" => Value::String(row.try_get::<NaiveTime, _>(index)?.to_string()),
        "TIMETZ" => {
            let time = row.try_get::<PgTimeTz, _>(index)?;
            Value::String(format!("{}{}", time.time, time.offset))
        }
        "TIMESTAMP" => Value::String(
            row.try_get::<NaiveDateTime, _>(index)?
                .format("%Y-%m-%dT%H:%M:%S%.f")
                .to_string(),
        ),
        "TIMESTAMPTZ" => Value::String(row.try_get::<DateTime<Utc>, _>(index)?.to_rfc3339()),
        "INTERVAL" => Value::String(interval(&row.try_get::<PgInterval, _>(index)?)),

        "UUID" => Value::String(row.try_get::<Uuid, _>(index)?.to_string()),

        "JSON" | "JSONB" => row.try_get::<Value, _>(index)?,

        "INT2[]" => Value::from(row.try_get::<Vec<i16>, _>(index)?),
        "INT4[]" => Value::from(row.try_get::<Vec<i32>, _>(index)?),
        "INT8[]" => Value::from(row.try_get::<Vec<i64>, _>(index)?),
        "BOOL[]" => Value::from(row.try_get::<Vec<bool>, _>(index)?),
        "FLOAT8[]" => Value::Array(
            row.try_get::<Vec<f64>, _>(index)?
                .into_iter()
                .map(float)
                .collect(),
        ),
        "NUMERIC[]" => Value::Array(
            row.try_get::<Vec<Decimal>, _>(index)?
                .into_iter()
                .map(|decimal| Value::String(decimal.to_string()))
                .collect(),
        ),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => {
            Value::from(row.try_get::<Vec<String>, _>(index)?)
        }

        // Enums and other types whose binary form is their text label.
        _ => return Ok(text_fallback(row, index)),
    };
    Ok(Some(value))
}

fn text_fallback(row: &PgRow, index: usize) -> Option<Value> {
    let raw = row.try_get_raw(index).ok()?;
    let bytes = raw.as_bytes().ok()?;
    std::str::from_utf8(bytes)
        .ok()
        .filter(|text| !text.chars().any(|c| c.is_control() && !c.is_whitespace()))
        .map(|text| Value::String(text.to_string()))
}

/// JSON has no NaN or infinity; those become strings.
fn float(value: f64) -> Value {
    serde_json::Number::from_f64(value).map_or_else(|| Value::String(value.to_string()), Value::Number)
}

fn interval(interval: &PgInterval) -> String {
    let micros = interval.microseconds;
    let sign = if micros < 0 { "-" } else { "" };
    let micros = micros.unsigned_abs();
    let seconds = micros / 1_000_000;
    let fraction = micros % 1_000_000;
    let mut time = format!(
        "{sign}{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    );
    if fraction > 0 {
        time.push_str(&format!(".{fraction:06}"));
    }
    format!("{} mons {} days {time}", interval.months, interval.days)
}
