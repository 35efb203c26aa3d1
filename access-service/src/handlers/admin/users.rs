//! User administration.

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
use crate::models::{CreateUserRequest, UserResponse};
use crate::utils::password_hash::hash_password;
use crate::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let users: Vec<UserResponse> = sqlx::query_as::<_, crate::models::User>(
        "SELECT * FROM users ORDER BY created_at DESC",
    )
    .fetch_all(state.pools.master())
    .await?
    .into_iter()
    .map(UserResponse::from)
    .collect();

    Ok(Json(ApiResponse::new(users, meta.metadata())))
}

pub async fn create_user(
    State(state): State<AppState>,
    _caller: Caller,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();
    request.validate()?;

    let password_hash = hash_password(&request.password)?;
    let username = request.username.clone().unwrap_or_else(|| request.email.clone());

    let result: Result<(Uuid,), sqlx::Error> = sqlx::query_as(
        r#"
        INSERT INTO users (email, username, password_hash, organization)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(&request.email)
    .bind(&username)
    .bind(&password_hash)
    .bind(&request.organization)
    .fetch_one(state.pools.master())
    .await;

    let (user_id,) = result.map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            AppError::Conflict("Email or username".to_string())
        }
        _ => AppError::from(e),
    })?;

    tracing::info!(user_id = %user_id, email = %request.email, "user created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            json!({
                "user_id": user_id,
                "email": request.email,
            }),
            meta.metadata(),
        )),
    ))
}

pub async fn activate_user(
    State(state): State<AppState>,
    _caller: Caller,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();
    set_user_active(&state, user_id, true).await?;
    Ok(Json(ApiResponse::new(
        json!({"message": "User activated"}),
        meta.metadata(),
    )))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    _caller: Caller,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();
    set_user_active(&state, user_id, false).await?;
    Ok(Json(ApiResponse::new(
        json!({"message": "User deactivated"}),
        meta.metadata(),
    )))
}

async fn set_user_active(state: &AppState, user_id: Uuid, active: bool) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE users SET is_active = $1, updated_at = NOW() WHERE id = $2")
        .bind(active)
        .bind(user_id)
        .execute(state.pools.master())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(())
}

/// Hard delete through the lifecycle cascade.
pub async fn delete_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let (email, details) = state
        .lifecycle
        .remove_user(user_id, caller.key.user_id, "full_removal")
        .await?;

    Ok(Json(ApiResponse::new(
        json!({
            "message": format!("User {} removed successfully", email),
            "cleanup_details": details,
        }),
        meta.metadata(),
    )))
}

pub async fn get_user_databases(
    State(state): State<AppState>,
    _caller: Caller,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let databases = state.authz.get_accessible_databases(user_id).await?;

    Ok(Json(ApiResponse::new(
        json!({"databases": databases}),
        meta.metadata(),
    )))
}
