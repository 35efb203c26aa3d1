//! Raw SQL endpoint with safety controls.

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;
use std::time::Duration;
use validator::Validate;

use crate::dtos::requests::RawQueryRequest;
use crate::dtos::{ApiResponse, RequestMeta};
use crate::middleware::Caller;
use crate::services::AuditEvent;
use crate::sql::{analyze, params, rows};
use crate::AppState;

const ABSOLUTE_TIMEOUT_SECS: u64 = 60;
const DANGEROUS_OPERATIONS: &[&str] = &["DROP TABLE", "TRUNCATE", "DELETE FROM"];

pub async fn execute_raw_query(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<RawQueryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::new();
    request.validate()?;

    let operation = analyze::classify_operation(&request.query);
    let schema = analyze::extract_schema(&request.query);

    // Statements that touch databases, roles, or grants never run here,
    // whatever the caller is entitled to.
    analyze::check_blocked(&request.query)?;

    if request.read_only && !matches!(operation, "select" | "unknown") {
        return Err(AppError::NotReadOnly(operation.to_string()));
    }

    let allowed = state
        .authz
        .check_permission(caller.effective_user_id, &request.database, &schema, operation)
        .await?;
    if !allowed {
        return Err(AppError::AuthzDenied(format!(
            "No {} permission on schema {} in database {}",
            operation, schema, request.database
        )));
    }

    let coerced = params::coerce_params(&request.params)?;

    let timeout = Duration::from_secs(
        request
            .timeout_seconds
            .unwrap_or(state.config.limits.max_query_time_seconds)
            .min(ABSOLUTE_TIMEOUT_SECS),
    );

    let query_upper = request.query.to_uppercase();
    let dangerous = DANGEROUS_OPERATIONS.iter().any(|op| query_upper.contains(op));

    let pool = state
        .pools
        .user_pool(caller.effective_user_id, &request.database)
        .await?;

    let outcome = if analyze::returns_rows(&request.query, operation) {
        let mut query = sqlx::query(&request.query);
        for param in &coerced {
            query = params::bind_param(query, param);
        }

        let fetched = tokio::time::timeout(timeout, query.fetch_all(&pool))
            .await
            .map_err(|_| AppError::QueryTimeout(timeout.as_secs()))?;

        match fetched {
            Ok(result_rows) => {
                let (converted, columns) = rows::rows_to_json(&result_rows);
                Ok(json!({
                    "rows": converted,
                    "columns": columns,
                    "row_count": converted.len(),
                    "operation": operation,
                    "dangerous": dangerous,
                }))
            }
            Err(e) => Err(e),
        }
    } else {
        let mut query = sqlx::query(&request.query);
        for param in &coerced {
            query = params::bind_param(query, param);
        }

        let executed = tokio::time::timeout(timeout, query.execute(&pool))
            .await
            .map_err(|_| AppError::QueryTimeout(timeout.as_secs()))?;

        match executed {
            Ok(result) => Ok(json!({
                "affected_rows": result.rows_affected(),
                "operation": operation,
                "dangerous": dangerous,
                "message": "Query executed successfully",
            })),
            Err(e) => Err(e),
        }
    };

    match outcome {
        Ok(data) => {
            state.audit.log(
                AuditEvent::new("/query", "POST", 200)
                    .user(caller.effective_user_id, caller.key.key_id)
                    .database(&request.database)
                    .schema(&schema)
                    .operation(&operation.to_uppercase())
                    .request_body(json!({
                        "query_length": request.query.len(),
                        "params_count": request.params.len(),
                        "read_only": request.read_only,
                    }))
                    .elapsed_ms(meta.elapsed_ms()),
            );

            Ok(Json(ApiResponse::new(
                data,
                meta.metadata()
                    .with_database(&request.database)
                    .with_schema(&schema),
            )))
        }
        Err(e) => {
            let preview: String = request.query.chars().take(100).collect();
            tracing::error!(error = %e, query = %preview, "raw query failed");

            state.audit.log(
                AuditEvent::new("/query", "POST", 500)
                    .user(caller.effective_user_id, caller.key.key_id)
                    .database(&request.database)
                    .operation("RAW_QUERY")
                    .error(&e.to_string())
                    .elapsed_ms(meta.elapsed_ms()),
            );

            Err(AppError::TargetError(format!(
                "Failed to execute query: {} (query: {})",
                e, preview
            )))
        }
    }
}
