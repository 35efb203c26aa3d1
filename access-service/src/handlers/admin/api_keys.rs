//! API key administration.

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
use crate::models::CreateApiKeyRequest;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListKeysQuery {
    pub user_id: Option<Uuid>,
}

pub async fn list_api_keys(
    State(state): State<AppState>,
    _caller: Caller,
    Query(query): Query<ListKeysQuery>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();
    let keys = state.auth.list_api_keys(query.user_id).await?;
    Ok(Json(ApiResponse::new(keys, meta.metadata())))
}

pub async fn create_api_key(
    State(state): State<AppState>,
    _caller: Caller,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let issued = state
        .auth
        .create_api_key(
            request.user_id,
            &request.name,
            &request.environment,
            request.expires_in_days,
        )
        .await?;

    // The plaintext appears in this response and nowhere else.
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            json!({
                "api_key": issued.api_key,
                "key_prefix": issued.key_prefix,
                "name": issued.name,
                "expires_at": issued.expires_at,
                "warning": "Save this API key - it cannot be retrieved again",
            }),
            meta.metadata(),
        )),
    ))
}

pub async fn revoke_api_key(
    State(state): State<AppState>,
    _caller: Caller,
    Path(key_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    if !state.auth.revoke_api_key(key_id).await? {
        return Err(AppError::NotFound("API key not found".to_string()));
    }

    Ok(Json(ApiResponse::new(
        json!({"message": "API key revoked"}),
        meta.metadata(),
    )))
}

pub async fn delete_api_key(
    State(state): State<AppState>,
    _caller: Caller,
    Path(key_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    if !state.auth.delete_api_key(key_id).await? {
        return Err(AppError::NotFound("API key not found".to_string()));
    }

    Ok(Json(ApiResponse::new(
        json!({"message": "API key deleted"}),
        meta.metadata(),
    )))
}
