//! Row-level-security policy administration.

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
use validator::Validate;

use crate::dtos::{ApiResponse, RequestMeta};
use crate::middleware::Caller;
use crate::models::{CreateRlsPolicyRequest, RlsPolicy, RlsPolicyTemplate};
use crate::services::pg_users::guard_master_db;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListPoliciesQuery {
    pub user_id: Option<Uuid>,
    pub database_name: Option<String>,
}

pub async fn list_rls_policies(
    State(state): State<AppState>,
    _caller: Caller,
    Query(query): Query<ListPoliciesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let mut sql = String::from("SELECT * FROM rls_policies WHERE is_active = true");
    if query.user_id.is_some() {
        sql.push_str(" AND vibe_user_id = $1");
    }
    if query.database_name.is_some() {
        sql.push_str(if query.user_id.is_some() {
            " AND database_name = $2"
        } else {
            " AND database_name = $1"
        });
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut q = sqlx::query_as::<_, RlsPolicy>(&sql);
    if let Some(user_id) = query.user_id {
        q = q.bind(user_id);
    }
    if let Some(database_name) = &query.database_name {
        q = q.bind(database_name);
    }

    let policies = q.fetch_all(state.pools.master()).await?;

    Ok(Json(ApiResponse::new(policies, meta.metadata())))
}

pub async fn create_rls_policy(
    State(state): State<AppState>,
    _caller: Caller,
    Json(request): Json<CreateRlsPolicyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();
    request.validate()?;

    guard_master_db(&request.database_name)?;

    let policy_id = state
        .materializer
        .create_rls_policy(
            request.user_id,
            &request.database_name,
            &request.admin_connection_string,
            &request.schema_name,
            &request.table_name,
            &request.policy_name,
            &request.policy_type,
            &request.using_expression,
            request.with_check_expression.as_deref(),
            &request.command_type,
            request.template_used.as_deref(),
            request.notes.as_deref(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            json!({
                "policy_id": policy_id,
                "policy_name": request.policy_name,
                "message": "RLS policy created successfully",
            }),
            meta.metadata()
                .with_database(&request.database_name)
                .with_schema(&request.schema_name)
                .with_table(&request.table_name),
        )),
    ))
}

/// Drop a policy, resolving admin credentials from the server registry by
/// the owning user's role connection.
pub async fn drop_rls_policy(
    State(state): State<AppState>,
    _caller: Caller,
    Path(policy_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let policy: Option<(Uuid, String)> = sqlx::query_as(
        "SELECT vibe_user_id, database_name FROM rls_policies WHERE id = $1 AND is_active = true",
    )
    .bind(policy_id)
    .fetch_optional(state.pools.master())
    .await?;

    let Some((vibe_user_id, database_name)) = policy else {
        return Err(AppError::NotFound("RLS policy not found".to_string()));
    };

    let admin_connection_string = state
        .servers
        .resolve_admin_for_user_db(vibe_user_id, &database_name)
        .await?;

    if !state
        .materializer
        .drop_rls_policy(policy_id, &admin_connection_string)
        .await?
    {
        return Err(AppError::NotFound("RLS policy not found".to_string()));
    }

    Ok(Json(ApiResponse::new(
        json!({"message": "RLS policy dropped"}),
        meta.metadata().with_database(&database_name),
    )))
}

pub async fn list_rls_templates(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let templates = sqlx::query_as::<_, RlsPolicyTemplate>(
        "SELECT * FROM rls_policy_templates WHERE is_active = true ORDER BY template_name",
    )
    .fetch_all(state.pools.master())
    .await?;

    Ok(Json(ApiResponse::new(templates, meta.metadata())))
}
