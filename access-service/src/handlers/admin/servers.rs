//! Database server registry administration.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{ApiResponse, RequestMeta};
use crate::middleware::Caller;
use crate::models::{CreateDatabaseServerRequest, DatabaseServerResponse, UpdateDatabaseServerRequest};
use crate::AppState;

pub async fn list_servers(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let servers = sqlx::query_as::<_, DatabaseServerResponse>(
        r#"
        SELECT id, server_name, host, port, admin_username, ssl_mode, notes, is_active, created_at
        FROM database_servers
        ORDER BY server_name
        "#,
    )
    .fetch_all(state.pools.master())
    .await?;

    Ok(Json(ApiResponse::new(servers, meta.metadata())))
}

pub async fn get_server(
    State(state): State<AppState>,
    _caller: Caller,
    Path(server_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let server = sqlx::query_as::<_, DatabaseServerResponse>(
        r#"
        SELECT id, server_name, host, port, admin_username, ssl_mode, notes, is_active, created_at
        FROM database_servers
        WHERE id = $1
        "#,
    )
    .bind(server_id)
    .fetch_optional(state.pools.master())
    .await?
    .ok_or_else(|| AppError::NotFound("Database server not found".to_string()))?;

    Ok(Json(ApiResponse::new(server, meta.metadata())))
}

pub async fn create_server(
    State(state): State<AppState>,
    _caller: Caller,
    Json(request): Json<CreateDatabaseServerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();
    request.validate()?;

    let admin_password_encrypted = state.vault.encrypt(&request.admin_password)?;

    let result: Result<(Uuid,), sqlx::Error> = sqlx::query_as(
        r#"
        INSERT INTO database_servers
            (server_name, host, port, admin_username, admin_password_encrypted, ssl_mode, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(&request.server_name)
    .bind(&request.host)
    .bind(request.port)
    .bind(&request.admin_username)
    .bind(&admin_password_encrypted)
    .bind(&request.ssl_mode)
    .bind(&request.notes)
    .fetch_one(state.pools.master())
    .await;

    let (server_id,) = result.map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            AppError::Conflict("Server name".to_string())
        }
        _ => AppError::from(e),
    })?;

    tracing::info!(server_id = %server_id, server_name = %request.server_name, "database server registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            json!({
                "server_id": server_id,
                "server_name": request.server_name,
            }),
            meta.metadata(),
        )),
    ))
}

pub async fn update_server(
    State(state): State<AppState>,
    _caller: Caller,
    Path(server_id): Path<Uuid>,
    Json(request): Json<UpdateDatabaseServerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let existing = state
        .servers
        .find_by_id(server_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Database server not found".to_string()))?;

    let admin_password_encrypted = match &request.admin_password {
        Some(password) => state.vault.encrypt(password)?,
        None => existing.admin_password_encrypted,
    };

    sqlx::query(
        r#"
        UPDATE database_servers
        SET server_name = $1,
            host = $2,
            port = $3,
            admin_username = $4,
            admin_password_encrypted = $5,
            ssl_mode = $6,
            notes = $7,
            is_active = $8,
            updated_at = NOW()
        WHERE id = $9
        "#,
    )
    .bind(request.server_name.unwrap_or(existing.server_name))
    .bind(request.host.unwrap_or(existing.host))
    .bind(request.port.unwrap_or(existing.port))
    .bind(request.admin_username.unwrap_or(existing.admin_username))
    .bind(&admin_password_encrypted)
    .bind(request.ssl_mode.unwrap_or(existing.ssl_mode))
    .bind(request.notes.or(existing.notes))
    .bind(request.is_active.unwrap_or(existing.is_active))
    .bind(server_id)
    .execute(state.pools.master())
    .await?;

    Ok(Json(ApiResponse::new(
        json!({"message": "Database server updated"}),
        meta.metadata(),
    )))
}

pub async fn delete_server(
    State(state): State<AppState>,
    _caller: Caller,
    Path(server_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let result = sqlx::query("DELETE FROM database_servers WHERE id = $1")
        .bind(server_id)
        .execute(state.pools.master())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Database server not found".to_string()));
    }

    Ok(Json(ApiResponse::new(
        json!({"message": "Database server deleted"}),
        meta.metadata(),
    )))
}
