//! Native PostgreSQL role administration.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::{ApiResponse, RequestMeta};
use crate::middleware::Caller;
use crate::models::{CreatePgUserRequest, PgUserSummary};
use crate::services::pg_users::guard_master_db;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListPgUsersQuery {
    pub user_id: Option<Uuid>,
    pub database_name: Option<String>,
}

pub async fn list_pg_users(
    State(state): State<AppState>,
    _caller: Caller,
    Query(query): Query<ListPgUsersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let mut sql = String::from(
        r#"
        SELECT pgu.id, pgu.vibe_user_id, pgu.database_name, pgu.pg_username,
               pgu.is_active, pgu.notes, pgu.created_at,
               u.email AS user_email
        FROM pg_database_users pgu
        JOIN users u ON pgu.vibe_user_id = u.id
        WHERE 1=1
        "#,
    );
    if query.user_id.is_some() {
        sql.push_str(" AND pgu.vibe_user_id = $1");
    }
    if query.database_name.is_some() {
        sql.push_str(if query.user_id.is_some() {
            " AND pgu.database_name = $2"
        } else {
            " AND pgu.database_name = $1"
        });
    }
    sql.push_str(" ORDER BY pgu.created_at DESC");

    let mut q = sqlx::query_as::<_, PgUserSummary>(&sql);
    if let Some(user_id) = query.user_id {
        q = q.bind(user_id);
    }
    if let Some(database_name) = &query.database_name {
        q = q.bind(database_name);
    }

    let pg_users = q.fetch_all(state.pools.master()).await?;

    Ok(Json(ApiResponse::new(pg_users, meta.metadata())))
}

pub async fn create_pg_user(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<CreatePgUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    guard_master_db(&request.database_name)?;

    let created = state
        .pg_users
        .create_pg_user(
            request.user_id,
            &request.database_name,
            &request.admin_connection_string,
            Some(caller.key.user_id),
            request.notes.as_deref(),
        )
        .await?;

    // The generated password appears in this response and nowhere else.
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            json!({
                "pg_username": created.pg_username,
                "pg_password": created.pg_password,
                "message": "PostgreSQL user created successfully",
            }),
            meta.metadata().with_database(&request.database_name),
        )),
    ))
}

/// Drop a role, auto-resolving admin credentials from the server registry.
pub async fn drop_pg_user(
    State(state): State<AppState>,
    _caller: Caller,
    Path((user_id, database_name)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let admin_connection_string = state
        .servers
        .resolve_admin_for_user_db(user_id, &database_name)
        .await?;

    if !state
        .pg_users
        .drop_pg_user(user_id, &database_name, &admin_connection_string)
        .await?
    {
        return Err(AppError::NotFound("PostgreSQL user not found".to_string()));
    }

    Ok(Json(ApiResponse::new(
        json!({"message": "PostgreSQL user dropped"}),
        meta.metadata().with_database(&database_name),
    )))
}

pub async fn reset_pg_password(
    State(state): State<AppState>,
    _caller: Caller,
    Path((user_id, database_name)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let admin_connection_string = state
        .servers
        .resolve_admin_for_user_db(user_id, &database_name)
        .await?;

    let Some(new_password) = state
        .pg_users
        .reset_pg_password(user_id, &database_name, &admin_connection_string)
        .await?
    else {
        return Err(AppError::NotFound("PostgreSQL user not found".to_string()));
    };

    Ok(Json(ApiResponse::new(
        json!({
            "pg_password": new_password,
            "message": "PostgreSQL password reset",
        }),
        meta.metadata().with_database(&database_name),
    )))
}
