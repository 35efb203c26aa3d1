//! User removal cascade.

use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::dtos::RequestMeta;
use crate::middleware::Caller;
use crate::models::{RemoveUserRequest, RemoveUserResponse};
use crate::services::AuditEvent;
use crate::AppState;

pub async fn remove_user(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<RemoveUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let (email, cleanup_details) = state
        .lifecycle
        .remove_user(request.user_id, request.admin_user_id, &request.cleanup_type)
        .await?;

    state.audit.log(
        AuditEvent::new("/admin/remove-user", "POST", 200)
            .user(caller.key.user_id, caller.key.key_id)
            .operation("REMOVE_USER")
            .elapsed_ms(meta.elapsed_ms()),
    );

    Ok(Json(RemoveUserResponse {
        success: true,
        message: format!("User {} removed successfully", email),
        cleanup_details,
    }))
}
