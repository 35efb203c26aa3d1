//! Identity and password endpoints.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{ApiResponse, RequestMeta};
use crate::middleware::Caller;
use crate::models::{RequestPasswordResetRequest, ResetPasswordRequest};
use crate::services::AuditEvent;
use crate::AppState;

/// Validate the caller's key and return identity plus grants.
pub async fn validate_api_key(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let permissions = state.authz.get_user_permissions(caller.key.user_id).await?;

    state.audit.log(
        AuditEvent::new("/auth/validate", "POST", 200)
            .user(caller.key.user_id, caller.key.key_id)
            .elapsed_ms(meta.elapsed_ms()),
    );

    Ok(Json(ApiResponse::new(
        json!({
            "valid": true,
            "user": {
                "id": caller.key.user_id,
                "email": caller.key.email,
                "organization": caller.key.organization,
            },
            "permissions": permissions,
        }),
        meta.metadata(),
    )))
}

/// Databases and schema grants for the effective user.
pub async fn get_permissions(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let permissions = state
        .authz
        .get_user_permissions(caller.effective_user_id)
        .await?;
    let databases = state
        .authz
        .get_accessible_databases(caller.effective_user_id)
        .await?;

    state.audit.log(
        AuditEvent::new("/auth/permissions", "GET", 200)
            .user(caller.effective_user_id, caller.key.key_id)
            .elapsed_ms(meta.elapsed_ms()),
    );

    Ok(Json(ApiResponse::new(
        json!({
            "databases": databases,
            "permissions": permissions,
        }),
        meta.metadata(),
    )))
}

/// Start a password reset. Always answers with the same generic message so
/// account existence cannot be probed.
pub async fn request_password_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RequestPasswordResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(',').next().unwrap_or(value).trim().to_string());
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    if let Err(e) = state
        .passwords
        .request_reset(&request.email, ip_address, user_agent)
        .await
    {
        // Internal failures must not leak whether the account exists.
        tracing::error!(error = %e, "password reset request failed");
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "If an account exists with that email, a reset link has been sent.",
        })),
    ))
}

/// Complete a password reset with a one-time token.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    state
        .passwords
        .reset_password(&request.token, &request.new_password)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Password has been reset successfully",
        })),
    ))
}
