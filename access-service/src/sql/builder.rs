//! SQL text assembly for the structured CRUD and DDL endpoints.
//!
//! Identifiers are validated before interpolation; values always come back
//! as a parameter list for binding.

use crate::dtos::requests::{
    AlterTableRequest, ColumnDefinition, ConstraintDefinition, CreateTableRequest,
    IndexDefinition,
};
use crate::services::identifiers::require_identifier;
use serde_json::{Map, Value};
use service_core::error::AppError;

/// A statement plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Equality WHERE clauses from a JSON object; returns clause strings and
/// the values to bind, numbering parameters from `start + 1`.
fn where_clauses(
    conditions: &Map<String, Value>,
    start: usize,
) -> Result<(Vec<String>, Vec<Value>), AppError> {
    let mut clauses = Vec::with_capacity(conditions.len());
    let mut params = Vec::with_capacity(conditions.len());

    for (i, (column, value)) in conditions.iter().enumerate() {
        require_identifier(column, "column")?;
        clauses.push(format!("{} = ${}", column, start + i + 1));
        params.push(value.clone());
    }

    Ok((clauses, params))
}

pub fn build_select(
    schema: &str,
    table: &str,
    select: Option<&[String]>,
    conditions: &Map<String, Value>,
    order_by: Option<&str>,
    order: &str,
    limit: i64,
    offset: i64,
) -> Result<BuiltQuery, AppError> {
    require_identifier(schema, "schema")?;
    require_identifier(table, "table")?;

    let columns = match select {
        Some(columns) if !columns.is_empty() => {
            for column in columns {
                require_identifier(column, "column")?;
            }
            columns.join(", ")
        }
        _ => "*".to_string(),
    };

    let mut sql = format!("SELECT {} FROM {}.{}", columns, schema, table);
    let (clauses, params) = where_clauses(conditions, 0)?;
    if !clauses.is_empty() {
        sql.push_str(&format!(" WHERE {}", clauses.join(" AND ")));
    }

    if let Some(order_by) = order_by {
        require_identifier(order_by, "order_by column")?;
        let direction = match order.to_uppercase().as_str() {
            "DESC" => "DESC",
            _ => "ASC",
        };
        sql.push_str(&format!(" ORDER BY {} {}", order_by, direction));
    }

    sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));

    Ok(BuiltQuery { sql, params })
}

pub fn build_count(
    schema: &str,
    table: &str,
    conditions: &Map<String, Value>,
) -> Result<BuiltQuery, AppError> {
    require_identifier(schema, "schema")?;
    require_identifier(table, "table")?;

    let mut sql = format!("SELECT COUNT(*) AS count FROM {}.{}", schema, table);
    let (clauses, params) = where_clauses(conditions, 0)?;
    if !clauses.is_empty() {
        sql.push_str(&format!(" WHERE {}", clauses.join(" AND ")));
    }

    Ok(BuiltQuery { sql, params })
}

pub fn build_insert(
    schema: &str,
    table: &str,
    record: &Map<String, Value>,
    returning: Option<&[String]>,
) -> Result<BuiltQuery, AppError> {
    require_identifier(schema, "schema")?;
    require_identifier(table, "table")?;

    if record.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("No data provided")));
    }

    let mut columns = Vec::with_capacity(record.len());
    let mut placeholders = Vec::with_capacity(record.len());
    let mut params = Vec::with_capacity(record.len());

    for (i, (column, value)) in record.iter().enumerate() {
        require_identifier(column, "column")?;
        columns.push(column.as_str());
        placeholders.push(format!("${}", i + 1));
        params.push(value.clone());
    }

    let sql = format!(
        "INSERT INTO {}.{} ({}) VALUES ({}) {}",
        schema,
        table,
        columns.join(", "),
        placeholders.join(", "),
        returning_clause(returning, true)?
    );

    Ok(BuiltQuery {
        sql: sql.trim_end().to_string(),
        params,
    })
}

pub fn build_update(
    schema: &str,
    table: &str,
    set: &Map<String, Value>,
    conditions: &Map<String, Value>,
    returning: Option<&[String]>,
) -> Result<BuiltQuery, AppError> {
    require_identifier(schema, "schema")?;
    require_identifier(table, "table")?;

    if set.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("No columns to update")));
    }
    if conditions.is_empty() {
        return Err(AppError::MissingWhereClause);
    }

    let mut set_clauses = Vec::with_capacity(set.len());
    let mut params = Vec::with_capacity(set.len() + conditions.len());

    for (i, (column, value)) in set.iter().enumerate() {
        require_identifier(column, "column")?;
        set_clauses.push(format!("{} = ${}", column, i + 1));
        params.push(value.clone());
    }

    let (where_parts, where_params) = where_clauses(conditions, set.len())?;
    params.extend(where_params);

    let sql = format!(
        "UPDATE {}.{} SET {} WHERE {} {}",
        schema,
        table,
        set_clauses.join(", "),
        where_parts.join(" AND "),
        returning_clause(returning, false)?
    );

    Ok(BuiltQuery {
        sql: sql.trim_end().to_string(),
        params,
    })
}

pub fn build_delete(
    schema: &str,
    table: &str,
    conditions: &Map<String, Value>,
    returning: Option<&[String]>,
) -> Result<BuiltQuery, AppError> {
    require_identifier(schema, "schema")?;
    require_identifier(table, "table")?;

    if conditions.is_empty() {
        return Err(AppError::MissingWhereClause);
    }

    let (where_parts, params) = where_clauses(conditions, 0)?;

    let sql = format!(
        "DELETE FROM {}.{} WHERE {} {}",
        schema,
        table,
        where_parts.join(" AND "),
        returning_clause(returning, false)?
    );

    Ok(BuiltQuery {
        sql: sql.trim_end().to_string(),
        params,
    })
}

fn returning_clause(returning: Option<&[String]>, default_all: bool) -> Result<String, AppError> {
    match returning {
        Some(columns) if !columns.is_empty() => {
            for column in columns {
                require_identifier(column, "returning column")?;
            }
            Ok(format!("RETURNING {}", columns.join(", ")))
        }
        _ if default_all => Ok("RETURNING *".to_string()),
        _ => Ok(String::new()),
    }
}

/// Free-text SQL fragments (types, defaults, CHECK conditions) cannot be
/// parameterized; reject anything that could break out of the statement.
fn require_safe_fragment<'a>(fragment: &'a str, what: &str) -> Result<&'a str, AppError> {
    let trimmed = fragment.trim();
    if trimmed.is_empty() || trimmed.len() > 200 {
        return Err(AppError::ParameterInvalid(format!("{} is empty or too long", what)));
    }
    if trimmed.contains(';') || trimmed.contains("--") || trimmed.contains("/*") {
        return Err(AppError::ParameterInvalid(format!(
            "{} contains disallowed characters: {}",
            what, trimmed
        )));
    }
    Ok(trimmed)
}

fn column_definition_sql(column: &ColumnDefinition) -> Result<String, AppError> {
    require_identifier(&column.name, "column")?;
    let column_type = require_safe_fragment(&column.column_type, "column type")?;

    let mut sql = format!("{} {}", column.name, column_type);
    if let Some(default) = &column.default {
        sql.push_str(&format!(" DEFAULT {}", require_safe_fragment(default, "default")?));
    }
    for constraint in &column.constraints {
        sql.push(' ');
        sql.push_str(require_safe_fragment(constraint, "constraint")?);
    }
    Ok(sql)
}

fn table_constraint_sql(constraint: &ConstraintDefinition) -> Result<Option<String>, AppError> {
    require_identifier(&constraint.name, "constraint")?;

    match constraint.constraint_type.to_uppercase().as_str() {
        "CHECK" => {
            let condition = constraint.condition.as_deref().ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("CHECK constraint requires a condition"))
            })?;
            Ok(Some(format!(
                "CONSTRAINT {} CHECK ({})",
                constraint.name,
                require_safe_fragment(condition, "check condition")?
            )))
        }
        "UNIQUE" => match &constraint.columns {
            Some(columns) if !columns.is_empty() => {
                for column in columns {
                    require_identifier(column, "constraint column")?;
                }
                Ok(Some(format!(
                    "CONSTRAINT {} UNIQUE ({})",
                    constraint.name,
                    columns.join(", ")
                )))
            }
            _ => Ok(None),
        },
        "FOREIGN KEY" => match (&constraint.columns, &constraint.references) {
            (Some(columns), Some(references)) if !columns.is_empty() => {
                for column in columns {
                    require_identifier(column, "constraint column")?;
                }
                Ok(Some(format!(
                    "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}",
                    constraint.name,
                    columns.join(", "),
                    require_safe_fragment(references, "references")?
                )))
            }
            _ => Ok(None),
        },
        other => Err(AppError::BadRequest(anyhow::anyhow!(
            "Unsupported constraint type: {}",
            other
        ))),
    }
}

pub fn build_create_table(request: &CreateTableRequest) -> Result<String, AppError> {
    require_identifier(&request.schema_name, "schema")?;
    require_identifier(&request.table, "table")?;

    if request.columns.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("No columns provided")));
    }

    let mut parts = Vec::with_capacity(request.columns.len() + request.constraints.len());
    for column in &request.columns {
        parts.push(column_definition_sql(column)?);
    }
    for constraint in &request.constraints {
        if let Some(sql) = table_constraint_sql(constraint)? {
            parts.push(sql);
        }
    }

    let if_not_exists = if request.if_not_exists { "IF NOT EXISTS " } else { "" };

    Ok(format!(
        "CREATE TABLE {}{}.{} ({})",
        if_not_exists,
        request.schema_name,
        request.table,
        parts.join(", ")
    ))
}

pub fn build_create_index(
    schema: &str,
    table: &str,
    index: &IndexDefinition,
) -> Result<String, AppError> {
    require_identifier(schema, "schema")?;
    require_identifier(table, "table")?;
    require_identifier(&index.name, "index")?;

    if index.columns.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("Index requires columns")));
    }
    for column in &index.columns {
        require_identifier(column, "index column")?;
    }

    let method = match index.method.to_lowercase().as_str() {
        "btree" => String::new(),
        m @ ("hash" | "gin" | "gist") => format!(" USING {}", m),
        other => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Unsupported index method: {}",
                other
            )))
        }
    };

    let unique = if index.unique { "UNIQUE " } else { "" };

    Ok(format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {}.{}{} ({})",
        unique,
        index.name,
        schema,
        table,
        method,
        index.columns.join(", ")
    ))
}

pub fn build_alter_table(
    table: &str,
    request: &AlterTableRequest,
) -> Result<String, AppError> {
    require_identifier(&request.schema_name, "schema")?;
    require_identifier(table, "table")?;

    let prefix = format!("ALTER TABLE {}.{}", request.schema_name, table);

    match request.action.to_uppercase().as_str() {
        "ADD_COLUMN" => {
            let column = request.column.as_ref().ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("ADD_COLUMN requires a column definition"))
            })?;
            Ok(format!("{} ADD COLUMN {}", prefix, column_definition_sql(column)?))
        }
        "DROP_COLUMN" => {
            let column = request.old_column_name.as_deref().ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("DROP_COLUMN requires old_column_name"))
            })?;
            require_identifier(column, "column")?;
            Ok(format!("{} DROP COLUMN {}", prefix, column))
        }
        "RENAME_COLUMN" => {
            let old = request.old_column_name.as_deref().ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("RENAME_COLUMN requires old_column_name"))
            })?;
            let new = request.new_column_name.as_deref().ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("RENAME_COLUMN requires new_column_name"))
            })?;
            require_identifier(old, "column")?;
            require_identifier(new, "column")?;
            Ok(format!("{} RENAME COLUMN {} TO {}", prefix, old, new))
        }
        "ALTER_COLUMN" => {
            let column = request.column.as_ref().ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("ALTER_COLUMN requires a column definition"))
            })?;
            require_identifier(&column.name, "column")?;
            let column_type = require_safe_fragment(&column.column_type, "column type")?;
            Ok(format!(
                "{} ALTER COLUMN {} TYPE {}",
                prefix, column.name, column_type
            ))
        }
        other => Err(AppError::BadRequest(anyhow::anyhow!(
            "Unsupported alter action: {}",
            other
        ))),
    }
}

pub fn build_drop_table(
    schema: &str,
    table: &str,
    if_exists: bool,
    cascade: bool,
) -> Result<String, AppError> {
    require_identifier(schema, "schema")?;
    require_identifier(table, "table")?;

    Ok(format!(
        "DROP TABLE {}{}.{}{}",
        if if_exists { "IF EXISTS " } else { "" },
        schema,
        table,
        if cascade { " CASCADE" } else { "" }
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn select_with_filters_and_ordering() {
        let built = build_select(
            "public",
            "orders",
            Some(&["id".to_string(), "total".to_string()]),
            &map(&[("status", json!("open"))]),
            Some("id"),
            "desc",
            100,
            0,
        )
        .unwrap();

        assert_eq!(
            built.sql,
            "SELECT id, total FROM public.orders WHERE status = $1 ORDER BY id DESC LIMIT 100 OFFSET 0"
        );
        assert_eq!(built.params, vec![json!("open")]);
    }

    #[test]
    fn select_star_when_no_columns_given() {
        let built =
            build_select("public", "orders", None, &Map::new(), None, "ASC", 50, 10).unwrap();
        assert_eq!(built.sql, "SELECT * FROM public.orders LIMIT 50 OFFSET 10");
        assert!(built.params.is_empty());
    }

    #[test]
    fn select_rejects_bad_identifiers() {
        assert!(build_select(
            "public",
            "orders; DROP TABLE x",
            None,
            &Map::new(),
            None,
            "ASC",
            10,
            0
        )
        .is_err());

        assert!(build_select(
            "public",
            "orders",
            None,
            &map(&[("id; --", json!(1))]),
            None,
            "ASC",
            10,
            0
        )
        .is_err());
    }

    #[test]
    fn insert_numbers_placeholders() {
        let built = build_insert(
            "public",
            "orders",
            &map(&[("status", json!("open")), ("total", json!(10))]),
            None,
        )
        .unwrap();

        assert_eq!(
            built.sql,
            "INSERT INTO public.orders (status, total) VALUES ($1, $2) RETURNING *"
        );
        assert_eq!(built.params.len(), 2);
    }

    #[test]
    fn update_requires_where() {
        let err = build_update(
            "public",
            "orders",
            &map(&[("status", json!("closed"))]),
            &Map::new(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::MissingWhereClause));
    }

    #[test]
    fn update_numbers_params_across_set_and_where() {
        let built = build_update(
            "public",
            "orders",
            &map(&[("status", json!("closed"))]),
            &map(&[("id", json!(7))]),
            Some(&["id".to_string()]),
        )
        .unwrap();

        assert_eq!(
            built.sql,
            "UPDATE public.orders SET status = $1 WHERE id = $2 RETURNING id"
        );
        assert_eq!(built.params, vec![json!("closed"), json!(7)]);
    }

    #[test]
    fn delete_requires_where() {
        let err = build_delete("public", "orders", &Map::new(), None).unwrap_err();
        assert!(matches!(err, AppError::MissingWhereClause));

        let built = build_delete("public", "orders", &map(&[("id", json!(7))]), None).unwrap();
        assert_eq!(built.sql, "DELETE FROM public.orders WHERE id = $1");
    }

    #[test]
    fn create_table_assembles_columns_and_constraints() {
        let request = CreateTableRequest {
            database: "analytics".into(),
            schema_name: "public".into(),
            table: "events".into(),
            columns: vec![
                ColumnDefinition {
                    name: "id".into(),
                    column_type: "SERIAL".into(),
                    constraints: vec!["PRIMARY KEY".into()],
                    default: None,
                },
                ColumnDefinition {
                    name: "kind".into(),
                    column_type: "TEXT".into(),
                    constraints: vec!["NOT NULL".into()],
                    default: Some("'generic'".into()),
                },
            ],
            indexes: vec![],
            constraints: vec![ConstraintDefinition {
                constraint_type: "UNIQUE".into(),
                name: "events_kind_key".into(),
                condition: None,
                columns: Some(vec!["kind".into()]),
                references: None,
            }],
            if_not_exists: true,
        };

        let sql = build_create_table(&request).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS public.events (id SERIAL PRIMARY KEY, \
             kind TEXT DEFAULT 'generic' NOT NULL, CONSTRAINT events_kind_key UNIQUE (kind))"
        );
    }

    #[test]
    fn create_table_rejects_statement_breakouts() {
        let request = CreateTableRequest {
            database: "analytics".into(),
            schema_name: "public".into(),
            table: "events".into(),
            columns: vec![ColumnDefinition {
                name: "id".into(),
                column_type: "INT); DROP TABLE users; --".into(),
                constraints: vec![],
                default: None,
            }],
            indexes: vec![],
            constraints: vec![],
            if_not_exists: true,
        };

        assert!(build_create_table(&request).is_err());
    }

    #[test]
    fn index_sql() {
        let index = IndexDefinition {
            name: "idx_events_kind".into(),
            columns: vec!["kind".into()],
            unique: true,
            method: "btree".into(),
        };
        let sql = build_create_index("public", "events", &index).unwrap();
        assert_eq!(
            sql,
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_events_kind ON public.events (kind)"
        );

        let gin = IndexDefinition {
            name: "idx_events_payload".into(),
            columns: vec!["payload".into()],
            unique: false,
            method: "gin".into(),
        };
        let sql = build_create_index("public", "events", &gin).unwrap();
        assert!(sql.contains("USING gin"));
    }

    #[test]
    fn drop_table_variants() {
        assert_eq!(
            build_drop_table("public", "events", true, false).unwrap(),
            "DROP TABLE IF EXISTS public.events"
        );
        assert_eq!(
            build_drop_table("public", "events", false, true).unwrap(),
            "DROP TABLE public.events CASCADE"
        );
    }
}
