//! DDL endpoints: create, list, describe, alter, and drop tables.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use service_core::error::AppError;

use crate::dtos::requests::{
    AlterTableRequest, CreateTableRequest, DropTableRequest, ListTablesQuery,
};
use crate::dtos::{ApiResponse, RequestMeta};
use crate::middleware::Caller;
use crate::services::identifiers::require_identifier;
use crate::services::AuditEvent;
use crate::sql::{builder, rows};
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

pub async fn create_table(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<CreateTableRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    authorize(&state, &caller, &request.database, &request.schema_name, "create").await?;

    let create_sql = builder::build_create_table(&request)?;

    let index_statements = request
        .indexes
        .iter()
        .map(|index| builder::build_create_index(&request.schema_name, &request.table, index))
        .collect::<Result<Vec<_>, _>>()?;

    let pool = state
        .pools
        .user_pool(caller.effective_user_id, &request.database)
        .await?;

    sqlx::query(&create_sql)
        .execute(&pool)
        .await
        .map_err(|e| AppError::TargetError(e.to_string()))?;

    for statement in &index_statements {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .map_err(|e| AppError::TargetError(e.to_string()))?;
    }

    state.audit.log(
        AuditEvent::new("/tables", "POST", 201)
            .user(caller.effective_user_id, caller.key.key_id)
            .database(&request.database)
            .schema(&request.schema_name)
            .table(&request.table)
            .operation("CREATE_TABLE")
            .elapsed_ms(meta.elapsed_ms()),
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            json!({
                "message": format!("Table {}.{} created", request.schema_name, request.table),
                "indexes_created": index_statements.len(),
            }),
            meta.metadata()
                .with_database(&request.database)
                .with_schema(&request.schema_name)
                .with_table(&request.table),
        )),
    ))
}

pub async fn list_tables(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListTablesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    authorize(&state, &caller, &query.database, &query.schema_name, "list").await?;
    require_identifier(&query.schema_name, "schema")?;

    let pool = state
        .pools
        .user_pool(caller.effective_user_id, &query.database)
        .await?;

    let tables: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT table_name
        FROM information_schema.tables
        WHERE table_schema = $1 AND table_type = 'BASE TABLE'
        ORDER BY table_name
        "#,
    )
    .bind(&query.schema_name)
    .fetch_all(&pool)
    .await
    .map_err(|e| AppError::TargetError(e.to_string()))?;

    let table_names: Vec<String> = tables.into_iter().map(|(name,)| name).collect();

    state.audit.log(
        AuditEvent::new("/tables", "GET", 200)
            .user(caller.effective_user_id, caller.key.key_id)
            .database(&query.database)
            .schema(&query.schema_name)
            .operation("LIST_TABLES")
            .elapsed_ms(meta.elapsed_ms()),
    );

    Ok(Json(ApiResponse::new(
        json!({
            "tables": table_names,
            "count": table_names.len(),
        }),
        meta.metadata()
            .with_database(&query.database)
            .with_schema(&query.schema_name),
    )))
}

pub async fn describe_table(
    State(state): State<AppState>,
    caller: Caller,
    Path(table): Path<String>,
    Query(query): Query<ListTablesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    authorize(&state, &caller, &query.database, &query.schema_name, "describe").await?;
    require_identifier(&query.schema_name, "schema")?;
    require_identifier(&table, "table")?;

    let pool = state
        .pools
        .user_pool(caller.effective_user_id, &query.database)
        .await?;

    let columns = sqlx::query(
        r#"
        SELECT
            c.column_name,
            c.data_type,
            (c.is_nullable = 'YES') AS is_nullable,
            c.column_default,
            c.character_maximum_length,
            c.numeric_precision,
            c.numeric_scale,
            COALESCE(pk.is_primary, false) AS is_primary_key
        FROM information_schema.columns c
        LEFT JOIN (
            SELECT kcu.column_name, true AS is_primary
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON tc.constraint_name = kcu.constraint_name
             AND tc.table_schema = kcu.table_schema
            WHERE tc.constraint_type = 'PRIMARY KEY'
              AND tc.table_schema = $1
              AND tc.table_name = $2
        ) pk ON pk.column_name = c.column_name
        WHERE c.table_schema = $1 AND c.table_name = $2
        ORDER BY c.ordinal_position
        "#,
    )
    .bind(&query.schema_name)
    .bind(&table)
    .fetch_all(&pool)
    .await
    .map_err(|e| AppError::TargetError(e.to_string()))?;

    if columns.is_empty() {
        return Err(AppError::NotFound(format!(
            "Table {}.{} not found",
            query.schema_name, table
        )));
    }

    let (converted, _) = rows::rows_to_json(&columns);

    state.audit.log(
        AuditEvent::new(&format!("/tables/{}", table), "GET", 200)
            .user(caller.effective_user_id, caller.key.key_id)
            .database(&query.database)
            .schema(&query.schema_name)
            .table(&table)
            .operation("DESCRIBE_TABLE")
            .elapsed_ms(meta.elapsed_ms()),
    );

    Ok(Json(ApiResponse::new(
        json!({
            "columns": converted,
            "column_count": converted.len(),
        }),
        meta.metadata()
            .with_database(&query.database)
            .with_schema(&query.schema_name)
            .with_table(&table),
    )))
}

pub async fn alter_table(
    State(state): State<AppState>,
    caller: Caller,
    Path(table): Path<String>,
    Json(request): Json<AlterTableRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    authorize(&state, &caller, &request.database, &request.schema_name, "alter").await?;

    let alter_sql = builder::build_alter_table(&table, &request)?;

    let pool = state
        .pools
        .user_pool(caller.effective_user_id, &request.database)
        .await?;

    sqlx::query(&alter_sql)
        .execute(&pool)
        .await
        .map_err(|e| AppError::TargetError(e.to_string()))?;

    state.audit.log(
        AuditEvent::new(&format!("/tables/{}", table), "PUT", 200)
            .user(caller.effective_user_id, caller.key.key_id)
            .database(&request.database)
            .schema(&request.schema_name)
            .table(&table)
            .operation("ALTER_TABLE")
            .request_body(json!({"action": request.action}))
            .elapsed_ms(meta.elapsed_ms()),
    );

    Ok(Json(ApiResponse::new(
        json!({
            "message": format!("Table {}.{} altered", request.schema_name, table),
            "action": request.action,
        }),
        meta.metadata()
            .with_database(&request.database)
            .with_schema(&request.schema_name)
            .with_table(&table),
    )))
}

pub async fn drop_table(
    State(state): State<AppState>,
    caller: Caller,
    Path(table): Path<String>,
    Json(request): Json<DropTableRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    authorize(&state, &caller, &request.database, &request.schema_name, "drop").await?;

    let drop_sql = builder::build_drop_table(
        &request.schema_name,
        &table,
        request.if_exists,
        request.cascade,
    )?;

    let pool = state
        .pools
        .user_pool(caller.effective_user_id, &request.database)
        .await?;

    sqlx::query(&drop_sql)
        .execute(&pool)
        .await
        .map_err(|e| AppError::TargetError(e.to_string()))?;

    state.audit.log(
        AuditEvent::new(&format!("/tables/{}", table), "DELETE", 200)
            .user(caller.effective_user_id, caller.key.key_id)
            .database(&request.database)
            .schema(&request.schema_name)
            .table(&table)
            .operation("DROP_TABLE")
            .elapsed_ms(meta.elapsed_ms()),
    );

    Ok(Json(ApiResponse::new(
        json!({
            "message": format!("Table {}.{} dropped", request.schema_name, table),
        }),
        meta.metadata()
            .with_database(&request.database)
            .with_schema(&request.schema_name)
            .with_table(&table),
    )))
}
