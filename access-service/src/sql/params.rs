//! Typed raw-SQL parameters and their coercion table.
//!
//! Every parameter arrives as `{value, type}`; the type tag drives an
//! exhaustive conversion, so adding a type means adding a case here rather
//! than guessing at runtime.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use service_core::error::AppError;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;

#[derive(Debug, Clone, Deserialize)]
pub struct QueryParameter {
    pub value: Value,
    #[serde(rename = "type")]
    pub param_type: String,
}

/// A parameter after coercion, ready to bind.
#[derive(Debug, Clone, PartialEq)]
pub enum CoercedParam {
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Int(i64),
    Float(f64),
    Bool(bool),
    Json(Value),
    Text(String),
    Null,
}

/// Convert all parameters, reporting the 1-based index of the first failure.
pub fn coerce_params(params: &[QueryParameter]) -> Result<Vec<CoercedParam>, AppError> {
    params
        .iter()
        .enumerate()
        .map(|(i, param)| {
            coerce_one(param).map_err(|reason| {
                AppError::ParameterInvalid(format!(
                    "Failed to convert parameter {} (value: {}) to type {}: {}",
                    i + 1,
                    param.value,
                    param.param_type,
                    reason
                ))
            })
        })
        .collect()
}

fn coerce_one(param: &QueryParameter) -> Result<CoercedParam, String> {
    if param.value.is_null() {
        return Ok(CoercedParam::Null);
    }

    match param.param_type.to_lowercase().as_str() {
        "date" => coerce_date(&param.value),
        "timestamp" | "datetime" | "timestamptz" => coerce_timestamp(&param.value),
        "int" | "integer" => coerce_int(&param.value),
        "float" | "decimal" | "numeric" | "real" | "double" => coerce_float(&param.value),
        "bool" | "boolean" => coerce_bool(&param.value),
        "json" => coerce_json(&param.value),
        // Unknown tags fall back to string, like explicit text types.
        _ => Ok(CoercedParam::Text(stringify(&param.value))),
    }
}

fn coerce_date(value: &Value) -> Result<CoercedParam, String> {
    let Value::String(s) = value else {
        return Err("expected a string date".to_string());
    };

    if s.len() == 10 {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(CoercedParam::Date)
            .map_err(|e| e.to_string())
    } else {
        parse_datetime(s).map(|dt| CoercedParam::Date(dt.date()))
    }
}

fn coerce_timestamp(value: &Value) -> Result<CoercedParam, String> {
    let Value::String(s) = value else {
        return Err("expected a string timestamp".to_string());
    };

    if s.len() == 10 {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string())?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| "invalid time".to_string())?;
        return Ok(CoercedParam::Timestamp(midnight));
    }

    parse_datetime(s).map(CoercedParam::Timestamp)
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, String> {
    // ISO 8601 with offset (Z normalized), then the common space-separated form.
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&s.replace('Z', "+00:00")) {
        return Ok(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    Err(format!("unrecognized datetime: {}", s))
}

fn coerce_int(value: &Value) -> Result<CoercedParam, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(CoercedParam::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(CoercedParam::Int(f as i64))
            } else {
                Err("number out of range".to_string())
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(CoercedParam::Int)
            .map_err(|e| e.to_string()),
        Value::Bool(b) => Ok(CoercedParam::Int(i64::from(*b))),
        _ => Err("expected a number".to_string()),
    }
}

fn coerce_float(value: &Value) -> Result<CoercedParam, String> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(CoercedParam::Float)
            .ok_or_else(|| "number out of range".to_string()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(CoercedParam::Float)
            .map_err(|e| e.to_string()),
        _ => Err("expected a number".to_string()),
    }
}

fn coerce_bool(value: &Value) -> Result<CoercedParam, String> {
    match value {
        Value::Bool(b) => Ok(CoercedParam::Bool(*b)),
        Value::String(s) => Ok(CoercedParam::Bool(matches!(
            s.to_lowercase().as_str(),
            "true" | "1" | "yes" | "t" | "y"
        ))),
        Value::Number(n) => Ok(CoercedParam::Bool(n.as_f64().unwrap_or(0.0) != 0.0)),
        _ => Err("expected a boolean".to_string()),
    }
}

fn coerce_json(value: &Value) -> Result<CoercedParam, String> {
    match value {
        Value::String(s) => serde_json::from_str(s)
            .map(CoercedParam::Json)
            .map_err(|e| e.to_string()),
        other => Ok(CoercedParam::Json(other.clone())),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Bind a coerced parameter onto a dynamic query.
pub fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &CoercedParam,
) -> Query<'q, Postgres, PgArguments> {
    match param {
        CoercedParam::Date(d) => query.bind(*d),
        CoercedParam::Timestamp(ts) => query.bind(*ts),
        CoercedParam::Int(i) => query.bind(*i),
        CoercedParam::Float(f) => query.bind(*f),
        CoercedParam::Bool(b) => query.bind(*b),
        CoercedParam::Json(v) => query.bind(v.clone()),
        CoercedParam::Text(s) => query.bind(s.clone()),
        CoercedParam::Null => query.bind(Option::<String>::None),
    }
}

/// Bind an untyped JSON value (structured CRUD path) by its own shape.
pub fn bind_json_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(value: Value, param_type: &str) -> QueryParameter {
        QueryParameter {
            value,
            param_type: param_type.to_string(),
        }
    }

    #[test]
    fn date_formats() {
        let result = coerce_params(&[param(Value::String("2024-01-15".into()), "date")]).unwrap();
        assert_eq!(
            result[0],
            CoercedParam::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );

        let result =
            coerce_params(&[param(Value::String("2024-01-15T08:30:00Z".into()), "date")]).unwrap();
        assert_eq!(
            result[0],
            CoercedParam::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
    }

    #[test]
    fn timestamp_formats() {
        for input in [
            "2024-01-15T08:30:00Z",
            "2024-01-15T08:30:00",
            "2024-01-15 08:30:00",
        ] {
            let result = coerce_params(&[param(Value::String(input.into()), "timestamp")]).unwrap();
            match &result[0] {
                CoercedParam::Timestamp(ts) => {
                    assert_eq!(ts.to_string(), "2024-01-15 08:30:00", "{}", input);
                }
                other => panic!("unexpected coercion for {}: {:?}", input, other),
            }
        }

        let result = coerce_params(&[param(Value::String("2024-01-15".into()), "datetime")]).unwrap();
        assert_eq!(
            result[0],
            CoercedParam::Timestamp(
                NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(0, 0, 0).unwrap()
            )
        );
    }

    #[test]
    fn int_accepts_strings_and_numbers() {
        assert_eq!(
            coerce_params(&[param(Value::String("42".into()), "integer")]).unwrap()[0],
            CoercedParam::Int(42)
        );
        assert_eq!(
            coerce_params(&[param(serde_json::json!(42), "int")]).unwrap()[0],
            CoercedParam::Int(42)
        );
        assert!(coerce_params(&[param(Value::String("nope".into()), "int")]).is_err());
    }

    #[test]
    fn bool_string_forms() {
        for truthy in ["true", "1", "yes", "t", "y", "TRUE", "Yes"] {
            assert_eq!(
                coerce_params(&[param(Value::String(truthy.into()), "bool")]).unwrap()[0],
                CoercedParam::Bool(true),
                "{}",
                truthy
            );
        }
        for falsy in ["false", "0", "no", "f", "n", "anything"] {
            assert_eq!(
                coerce_params(&[param(Value::String(falsy.into()), "boolean")]).unwrap()[0],
                CoercedParam::Bool(false),
                "{}",
                falsy
            );
        }
    }

    #[test]
    fn json_strings_are_parsed() {
        let result =
            coerce_params(&[param(Value::String(r#"{"a": 1}"#.into()), "json")]).unwrap();
        assert_eq!(result[0], CoercedParam::Json(serde_json::json!({"a": 1})));
        assert!(coerce_params(&[param(Value::String("{not json".into()), "json")]).is_err());
    }

    #[test]
    fn unknown_type_falls_back_to_string() {
        let result = coerce_params(&[param(serde_json::json!(7), "mystery")]).unwrap();
        assert_eq!(result[0], CoercedParam::Text("7".into()));
    }

    #[test]
    fn null_passes_through() {
        let result = coerce_params(&[param(Value::Null, "int")]).unwrap();
        assert_eq!(result[0], CoercedParam::Null);
    }

    #[test]
    fn failure_reports_one_based_index() {
        let err = coerce_params(&[
            param(Value::String("1".into()), "int"),
            param(Value::String("x".into()), "int"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("parameter 2"), "{}", err);
    }
}
