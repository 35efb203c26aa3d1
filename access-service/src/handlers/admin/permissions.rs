//! Schema and table permission administration.

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
use crate::models::{
    GrantPermissionRequest, GrantTablePermissionRequest, PermissionLevel, SchemaPermission,
    TablePermission, TableVerbs,
};
use crate::services::pg_users::guard_master_db;
use crate::services::SchemaGrantOptions;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListPermissionsQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RevokePermissionQuery {
    pub user_id: Uuid,
    pub database_name: String,
    pub schema_name: String,
}

pub async fn list_permissions(
    State(state): State<AppState>,
    _caller: Caller,
    Query(query): Query<ListPermissionsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let permissions = match query.user_id {
        Some(user_id) => {
            sqlx::query_as::<_, SchemaPermission>(
                r#"
                SELECT * FROM schema_permissions
                WHERE user_id = $1
                ORDER BY database_name, schema_name
                "#,
            )
            .bind(user_id)
            .fetch_all(state.pools.master())
            .await?
        }
        None => {
            sqlx::query_as::<_, SchemaPermission>(
                "SELECT * FROM schema_permissions ORDER BY user_id, database_name, schema_name",
            )
            .fetch_all(state.pools.master())
            .await?
        }
    };

    Ok(Json(ApiResponse::new(permissions, meta.metadata())))
}

/// Grant a schema permission: always upserts the catalog row, and when the
/// user already has a native role for the database, also materializes the
/// grant on the target cluster.
pub async fn grant_permission(
    State(state): State<AppState>,
    _caller: Caller,
    Json(request): Json<GrantPermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    guard_master_db(&request.database_name)?;

    state
        .authz
        .grant_permission(
            request.user_id,
            &request.database_name,
            &request.schema_name,
            request.permission,
        )
        .await?;

    let pg_username = state
        .pg_users
        .get_pg_username(request.user_id, &request.database_name)
        .await?;

    let mut materialized = false;
    if pg_username.is_some() {
        match state
            .servers
            .resolve_admin_for_user_db(request.user_id, &request.database_name)
            .await
        {
            Ok(admin_connection_string) => {
                let writable = request.permission == PermissionLevel::ReadWrite;
                let options = SchemaGrantOptions {
                    verbs: TableVerbs {
                        can_select: true,
                        can_insert: writable,
                        can_update: writable,
                        can_delete: writable,
                        ..Default::default()
                    },
                    can_create_table: false,
                };

                state
                    .materializer
                    .grant_schema_permissions(
                        request.user_id,
                        &request.database_name,
                        &admin_connection_string,
                        &request.schema_name,
                        &options,
                        true,
                        true,
                    )
                    .await?;
                materialized = true;
            }
            Err(AppError::NotFound(reason)) => {
                // No registered server for this host: the catalog row stands
                // and a later provisioning pass can sync the target.
                tracing::warn!(
                    user_id = %request.user_id,
                    database = %request.database_name,
                    reason = %reason,
                    "permission recorded without target materialization"
                );
            }
            Err(e) => return Err(e),
        }
    }

    Ok(Json(ApiResponse::new(
        json!({
            "message": "Permission granted successfully",
            "materialized": materialized,
        }),
        meta.metadata().with_database(&request.database_name),
    )))
}

pub async fn revoke_permission(
    State(state): State<AppState>,
    _caller: Caller,
    Query(query): Query<RevokePermissionQuery>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let removed = state
        .authz
        .revoke_permission(query.user_id, &query.database_name, &query.schema_name)
        .await?;

    if !removed {
        return Err(AppError::NotFound("Permission not found".to_string()));
    }

    Ok(Json(ApiResponse::new(
        json!({"message": "Permission revoked"}),
        meta.metadata().with_database(&query.database_name),
    )))
}

pub async fn list_table_permissions(
    State(state): State<AppState>,
    _caller: Caller,
    Query(query): Query<ListPermissionsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let permissions = match query.user_id {
        Some(user_id) => {
            sqlx::query_as::<_, TablePermission>(
                r#"
                SELECT * FROM table_permissions
                WHERE vibe_user_id = $1
                ORDER BY database_name, schema_name, table_name
                "#,
            )
            .bind(user_id)
            .fetch_all(state.pools.master())
            .await?
        }
        None => {
            sqlx::query_as::<_, TablePermission>(
                "SELECT * FROM table_permissions ORDER BY vibe_user_id, database_name, schema_name, table_name",
            )
            .fetch_all(state.pools.master())
            .await?
        }
    };

    Ok(Json(ApiResponse::new(permissions, meta.metadata())))
}

pub async fn grant_table_permission(
    State(state): State<AppState>,
    _caller: Caller,
    Json(request): Json<GrantTablePermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    guard_master_db(&request.database_name)?;

    state
        .materializer
        .grant_table_permissions(
            request.user_id,
            &request.database_name,
            &request.admin_connection_string,
            &request.schema_name,
            &request.table_name,
            &request.verbs,
            request.column_permissions.as_ref(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            json!({"message": "Table permissions granted successfully"}),
            meta.metadata()
                .with_database(&request.database_name)
                .with_schema(&request.schema_name)
                .with_table(&request.table_name),
        )),
    ))
}

pub async fn revoke_table_permission(
    State(state): State<AppState>,
    _caller: Caller,
    Path(permission_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();

    let result = sqlx::query("DELETE FROM table_permissions WHERE id = $1")
        .bind(permission_id)
        .execute(state.pools.master())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Table permission not found".to_string()));
    }

    Ok(Json(ApiResponse::new(
        json!({"message": "Table permission revoked"}),
        meta.metadata(),
    )))
}
