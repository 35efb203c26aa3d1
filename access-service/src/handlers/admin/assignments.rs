//! Database assignment administration.

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
use crate::models::{AssignDatabaseRequest, DatabaseAssignment};
use crate::services::pg_users::guard_master_db;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListAssignmentsQuery {
    pub user_id: Option<Uuid>,
}

pub async fn list_assignments(
    State(state): State<AppState>,
    _caller: Caller,
    Query(query): Query<ListAssignmentsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let assignments = match query.user_id {
        Some(user_id) => {
            sqlx::query_as::<_, DatabaseAssignment>(
                "SELECT * FROM database_assignments WHERE user_id = $1 ORDER BY database_name",
            )
            .bind(user_id)
            .fetch_all(state.pools.master())
            .await?
        }
        None => {
            sqlx::query_as::<_, DatabaseAssignment>(
                "SELECT * FROM database_assignments ORDER BY user_id, database_name",
            )
            .fetch_all(state.pools.master())
            .await?
        }
    };

    Ok(Json(ApiResponse::new(assignments, meta.metadata())))
}

pub async fn assign_database(
    State(state): State<AppState>,
    _caller: Caller,
    Json(request): Json<AssignDatabaseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    // The catalog database must never be reachable through an assignment.
    guard_master_db(&request.database_name)?;

    let connection_string_encrypted = state.vault.encrypt(&request.connection_string)?;

    let result: Result<(Uuid,), sqlx::Error> = sqlx::query_as(
        r#"
        INSERT INTO database_assignments (user_id, database_name, connection_string_encrypted)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(request.user_id)
    .bind(&request.database_name)
    .bind(&connection_string_encrypted)
    .fetch_one(state.pools.master())
    .await;

    let (assignment_id,) = result.map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            AppError::Conflict("Database assignment".to_string())
        }
        _ => AppError::from(e),
    })?;

    tracing::info!(
        user_id = %request.user_id,
        database = %request.database_name,
        "database assigned"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            json!({
                "assignment_id": assignment_id,
                "database_name": request.database_name,
            }),
            meta.metadata().with_database(&request.database_name),
        )),
    ))
}

pub async fn remove_assignment(
    State(state): State<AppState>,
    _caller: Caller,
    Path(assignment_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let removed: Option<(Uuid, String)> = sqlx::query_as(
        "DELETE FROM database_assignments WHERE id = $1 RETURNING user_id, database_name",
    )
    .bind(assignment_id)
    .fetch_optional(state.pools.master())
    .await?;

    let Some((user_id, database_name)) = removed else {
        return Err(AppError::NotFound("Database assignment not found".to_string()));
    };

    state.pools.evict_user_pool(user_id, &database_name).await;

    Ok(Json(ApiResponse::new(
        json!({"message": "Database assignment removed"}),
        meta.metadata().with_database(&database_name),
    )))
}
