//! Dynamic PgRow -> JSON conversion for result envelopes.

use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};

/// Convert one row to a JSON object keyed by column name. Unknown column
/// types degrade to their text form, or null if even that fails.
pub fn row_to_json(row: &PgRow) -> Value {
    let mut object = Map::new();

    for (i, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, i, column.type_info().name());
        object.insert(column.name().to_string(), value);
    }

    Value::Object(object)
}

/// Convert a batch of rows; also returns the column names of the first row.
pub fn rows_to_json(rows: &[PgRow]) -> (Vec<Value>, Vec<String>) {
    let converted: Vec<Value> = rows.iter().map(row_to_json).collect();
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    (converted, columns)
}

fn decode_column(row: &PgRow, i: usize, type_name: &str) -> Value {
    match type_name {
        "BOOL" => opt(row.try_get::<Option<bool>, _>(i).map(|o| o.map(Value::Bool))),
        "INT2" => opt(row
            .try_get::<Option<i16>, _>(i)
            .map(|o| o.map(|v| Value::Number(v.into())))),
        "INT4" => opt(row
            .try_get::<Option<i32>, _>(i)
            .map(|o| o.map(|v| Value::Number(v.into())))),
        "INT8" => opt(row
            .try_get::<Option<i64>, _>(i)
            .map(|o| o.map(|v| Value::Number(v.into())))),
        "FLOAT4" => opt(row
            .try_get::<Option<f32>, _>(i)
            .map(|o| o.map(|v| number_from_f64(f64::from(v))))),
        "FLOAT8" => opt(row
            .try_get::<Option<f64>, _>(i)
            .map(|o| o.map(number_from_f64))),
        "NUMERIC" => opt(row.try_get::<Option<rust_decimal::Decimal>, _>(i).map(|o| {
            o.map(|d| {
                d.to_f64()
                    .map(number_from_f64)
                    .unwrap_or_else(|| Value::String(d.to_string()))
            })
        })),
        "UUID" => opt(row
            .try_get::<Option<uuid::Uuid>, _>(i)
            .map(|o| o.map(|v| Value::String(v.to_string())))),
        "DATE" => opt(row
            .try_get::<Option<chrono::NaiveDate>, _>(i)
            .map(|o| o.map(|v| Value::String(v.to_string())))),
        "TIME" => opt(row
            .try_get::<Option<chrono::NaiveTime>, _>(i)
            .map(|o| o.map(|v| Value::String(v.to_string())))),
        "TIMESTAMP" => opt(row
            .try_get::<Option<chrono::NaiveDateTime>, _>(i)
            .map(|o| o.map(|v| Value::String(v.to_string())))),
        "TIMESTAMPTZ" => opt(row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i)
            .map(|o| o.map(|v| Value::String(v.to_rfc3339())))),
        "JSON" | "JSONB" => opt(row.try_get::<Option<Value>, _>(i)),
        _ => opt(row
            .try_get::<Option<String>, _>(i)
            .map(|o| o.map(Value::String))),
    }
}

fn opt(result: Result<Option<Value>, sqlx::Error>) -> Value {
    match result {
        Ok(Some(value)) => value,
        Ok(None) => Value::Null,
        Err(_) => Value::Null,
    }
}

fn number_from_f64(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
