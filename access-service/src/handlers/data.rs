//! Structured CRUD over `/data/{schema}/{table}`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Map, Value};
use service_core::error::AppError;
use sqlx::postgres::PgPool;

use crate::dtos::requests::{DeleteDataRequest, InsertDataRequest, QueryDataParams, UpdateDataRequest};
use crate::dtos::{ApiResponse, Pagination, RequestMeta};
use crate::middleware::Caller;
use crate::services::AuditEvent;
use crate::sql::{builder, params as sql_params, rows};
use crate::AppState;

async fn authorize(
    state: &AppState,
    caller: &Caller,
    database: &str,
    schema: &str,
    operation: &str,
) -> Result<(), AppError> {
    let allowed = state
        .authz
        .check_permission(caller.effective_user_id, database, schema, operation)
        .await?;
    if allowed {
        Ok(())
    } else {
        Err(AppError::AuthzDenied(format!(
            "No {} permission on schema {}",
            operation, schema
        )))
    }
}

async fn user_pool(state: &AppState, caller: &Caller, database: &str) -> Result<PgPool, AppError> {
    state.pools.user_pool(caller.effective_user_id, database).await
}

fn bind_values<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    values: &[Value],
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    for value in values {
        query = sql_params::bind_json_value(query, value);
    }
    query
}

fn parse_where(raw: Option<&str>) -> Result<Map<String, Value>, AppError> {
    match raw {
        None => Ok(Map::new()),
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid WHERE conditions JSON"
            ))),
        },
    }
}

pub async fn query_data(
    State(state): State<AppState>,
    caller: Caller,
    Path((schema, table)): Path<(String, String)>,
    Query(query_params): Query<QueryDataParams>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    authorize(&state, &caller, &query_params.database, &schema, "select").await?;

    let conditions = parse_where(query_params.r#where.as_deref())?;
    let select_columns: Option<Vec<String>> = query_params
        .select
        .as_ref()
        .map(|raw| raw.split(',').map(|c| c.trim().to_string()).collect());

    let limit = query_params
        .limit
        .unwrap_or(state.config.limits.default_page_size)
        .clamp(1, state.config.limits.max_rows_per_query);
    let offset = query_params.offset.max(0);

    let built = builder::build_select(
        &schema,
        &table,
        select_columns.as_deref(),
        &conditions,
        query_params.order_by.as_deref(),
        &query_params.order,
        limit,
        offset,
    )?;

    let pool = user_pool(&state, &caller, &query_params.database).await?;

    let fetched = bind_values(sqlx::query(&built.sql), &built.params)
        .fetch_all(&pool)
        .await
        .map_err(|e| AppError::TargetError(e.to_string()))?;
    let (converted, _) = rows::rows_to_json(&fetched);

    let count_query = builder::build_count(&schema, &table, &conditions)?;
    let count_row = bind_values(sqlx::query(&count_query.sql), &count_query.params)
        .fetch_one(&pool)
        .await
        .map_err(|e| AppError::TargetError(e.to_string()))?;
    let total: i64 = sqlx::Row::try_get(&count_row, 0).unwrap_or(0);

    state.audit.log(
        AuditEvent::new(&format!("/data/{}/{}", schema, table), "GET", 200)
            .user(caller.effective_user_id, caller.key.key_id)
            .database(&query_params.database)
            .schema(&schema)
            .table(&table)
            .operation("SELECT")
            .elapsed_ms(meta.elapsed_ms()),
    );

    Ok(Json(
        ApiResponse::new(
            json!({
                "rows": converted,
                "row_count": converted.len(),
            }),
            meta.metadata()
                .with_database(&query_params.database)
                .with_schema(&schema)
                .with_table(&table),
        )
        .with_pagination(Pagination::new(total, limit, offset)),
    ))
}

pub async fn insert_data(
    State(state): State<AppState>,
    caller: Caller,
    Path((schema, table)): Path<(String, String)>,
    Json(request): Json<InsertDataRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    authorize(&state, &caller, &request.database, &schema, "insert").await?;

    let records: Vec<Map<String, Value>> = match &request.data {
        Value::Object(record) => vec![record.clone()],
        Value::Array(values) => values
            .iter()
            .map(|value| match value {
                Value::Object(record) => Ok(record.clone()),
                _ => Err(AppError::BadRequest(anyhow::anyhow!(
                    "Each record must be a JSON object"
                ))),
            })
            .collect::<Result<_, _>>()?,
        _ => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "data must be an object or a list of objects"
            )))
        }
    };

    if records.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("No data provided")));
    }

    let pool = user_pool(&state, &caller, &request.database).await?;
    let returning = request.returning.as_deref();

    let mut inserted_rows = Vec::with_capacity(records.len());
    for record in &records {
        let built = builder::build_insert(&schema, &table, record, returning)?;
        let row = bind_values(sqlx::query(&built.sql), &built.params)
            .fetch_optional(&pool)
            .await
            .map_err(|e| AppError::TargetError(e.to_string()))?;
        if let Some(row) = row {
            inserted_rows.push(rows::row_to_json(&row));
        }
    }

    state.audit.log(
        AuditEvent::new(&format!("/data/{}/{}", schema, table), "POST", 201)
            .user(caller.effective_user_id, caller.key.key_id)
            .database(&request.database)
            .schema(&schema)
            .table(&table)
            .operation("INSERT")
            .request_body(json!({"records": records.len()}))
            .elapsed_ms(meta.elapsed_ms()),
    );

    let rows_payload = if request.returning.is_some() {
        Value::Array(inserted_rows.clone())
    } else {
        Value::Null
    };

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            json!({
                "message": format!("Successfully inserted {} record(s)", inserted_rows.len()),
                "inserted": inserted_rows.len(),
                "rows": rows_payload,
            }),
            meta.metadata()
                .with_database(&request.database)
                .with_schema(&schema)
                .with_table(&table),
        )),
    ))
}

pub async fn update_data(
    State(state): State<AppState>,
    caller: Caller,
    Path((schema, table)): Path<(String, String)>,
    Json(request): Json<UpdateDataRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    authorize(&state, &caller, &request.database, &schema, "update").await?;

    let built = builder::build_update(
        &schema,
        &table,
        &request.set,
        &request.r#where,
        request.returning.as_deref(),
    )?;

    let pool = user_pool(&state, &caller, &request.database).await?;

    let (affected_rows, updated_rows) = if request.returning.is_some() {
        let fetched = bind_values(sqlx::query(&built.sql), &built.params)
            .fetch_all(&pool)
            .await
            .map_err(|e| AppError::TargetError(e.to_string()))?;
        let (converted, _) = rows::rows_to_json(&fetched);
        (converted.len() as u64, Some(converted))
    } else {
        let result = bind_values(sqlx::query(&built.sql), &built.params)
            .execute(&pool)
            .await
            .map_err(|e| AppError::TargetError(e.to_string()))?;
        (result.rows_affected(), None)
    };

    state.audit.log(
        AuditEvent::new(&format!("/data/{}/{}", schema, table), "PUT", 200)
            .user(caller.effective_user_id, caller.key.key_id)
            .database(&request.database)
            .schema(&schema)
            .table(&table)
            .operation("UPDATE")
            .request_body(json!({
                "set": request.set,
                "where": request.r#where,
            }))
            .elapsed_ms(meta.elapsed_ms()),
    );

    Ok(Json(ApiResponse::new(
        json!({
            "message": "Update successful",
            "affected_rows": affected_rows,
            "rows": updated_rows,
        }),
        meta.metadata()
            .with_database(&request.database)
            .with_schema(&schema)
            .with_table(&table),
    )))
}

pub async fn delete_data(
    State(state): State<AppState>,
    caller: Caller,
    Path((schema, table)): Path<(String, String)>,
    Json(request): Json<DeleteDataRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    authorize(&state, &caller, &request.database, &schema, "delete").await?;

    let built = builder::build_delete(
        &schema,
        &table,
        &request.r#where,
        request.returning.as_deref(),
    )?;

    let pool = user_pool(&state, &caller, &request.database).await?;

    let (affected_rows, deleted_rows) = if request.returning.is_some() {
        let fetched = bind_values(sqlx::query(&built.sql), &built.params)
            .fetch_all(&pool)
            .await
            .map_err(|e| AppError::TargetError(e.to_string()))?;
        let (converted, _) = rows::rows_to_json(&fetched);
        (converted.len() as u64, Some(converted))
    } else {
        let result = bind_values(sqlx::query(&built.sql), &built.params)
            .execute(&pool)
            .await
            .map_err(|e| AppError::TargetError(e.to_string()))?;
        (result.rows_affected(), None)
    };

    state.audit.log(
        AuditEvent::new(&format!("/data/{}/{}", schema, table), "DELETE", 200)
            .user(caller.effective_user_id, caller.key.key_id)
            .database(&request.database)
            .schema(&schema)
            .table(&table)
            .operation("DELETE")
            .request_body(json!({"where": request.r#where}))
            .elapsed_ms(meta.elapsed_ms()),
    );

    Ok(Json(ApiResponse::new(
        json!({
            "message": "Delete successful",
            "affected_rows": affected_rows,
            "rows": deleted_rows,
        }),
        meta.metadata()
            .with_database(&request.database)
            .with_schema(&schema)
            .with_table(&table),
    )))
}
