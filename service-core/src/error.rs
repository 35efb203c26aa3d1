use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

/// Error taxonomy for the control plane. Every variant maps to exactly one
/// HTTP status and a stable error code carried in the response envelope.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Invalid identifier: {0}")]
    IdentifierInvalid(String),

    #[error("Invalid parameter: {0}")]
    ParameterInvalid(String),

    #[error("WHERE clause is required to prevent accidental writes to all rows")]
    MissingWhereClause,

    #[error("Query contains blocked operation: {0}")]
    BlockedSql(String),

    #[error("Query is not read-only. Operation detected: {0}")]
    NotReadOnly(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("API key is required in X-API-Key header")]
    AuthMissing,

    #[error("The provided API key is invalid or has been revoked")]
    AuthInvalid,

    #[error("The provided API key has expired")]
    AuthExpired,

    #[error("Forbidden: {0}")]
    AuthzDenied(String),

    #[error("{0}")]
    InvariantViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query execution timeout ({0} seconds)")]
    QueryTimeout(u64),

    #[error("Stored credential could not be decrypted; re-enter the secret for this record")]
    CredentialUnreadable,

    #[error("Target database error: {0}")]
    TargetError(String),

    #[error("Catalog error: {0}")]
    CatalogError(anyhow::Error),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::BadRequest(_)
            | AppError::IdentifierInvalid(_)
            | AppError::ParameterInvalid(_)
            | AppError::MissingWhereClause
            | AppError::BlockedSql(_)
            | AppError::NotReadOnly(_)
            | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::AuthMissing | AppError::AuthInvalid | AppError::AuthExpired => {
                StatusCode::UNAUTHORIZED
            }
            AppError::AuthzDenied(_) | AppError::InvariantViolation(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::QueryTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            AppError::CredentialUnreadable
            | AppError::TargetError(_)
            | AppError::CatalogError(_)
            | AppError::EmailError(_)
            | AppError::ConfigError(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::IdentifierInvalid(_) => "IDENTIFIER_INVALID",
            AppError::ParameterInvalid(_) => "PARAMETER_INVALID",
            AppError::MissingWhereClause => "MISSING_WHERE_CLAUSE",
            AppError::BlockedSql(_) => "BLOCKED_SQL",
            AppError::NotReadOnly(_) => "NOT_READ_ONLY",
            AppError::Conflict(_) => "CONFLICT",
            AppError::AuthMissing => "AUTH_MISSING",
            AppError::AuthInvalid => "AUTH_INVALID",
            AppError::AuthExpired => "AUTH_EXPIRED",
            AppError::AuthzDenied(_) => "AUTHZ_DENIED",
            AppError::InvariantViolation(_) => "INVARIANT_VIOLATION",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::QueryTimeout(_) => "QUERY_TIMEOUT",
            AppError::CredentialUnreadable => "CREDENTIAL_UNREADABLE",
            AppError::TargetError(_) => "TARGET_ERROR",
            AppError::CatalogError(_) => "CATALOG_ERROR",
            AppError::EmailError(_) => "EMAIL_ERROR",
            AppError::ConfigError(_) => "CONFIG_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Optional machine-readable context attached to the error envelope.
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::ValidationError(errs) => serde_json::to_value(errs).ok(),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ErrorMetadata {
    timestamp: chrono::DateTime<Utc>,
    request_id: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorDetail,
    metadata: ErrorMetadata,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }

        let body = ErrorEnvelope {
            success: false,
            error: ErrorDetail {
                code: self.code(),
                message: self.to_string(),
                details: self.details(),
            },
            metadata: ErrorMetadata {
                timestamp: Utc::now(),
                request_id: uuid::Uuid::new_v4().to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                return AppError::Conflict("Record".to_string());
            }
        }
        AppError::CatalogError(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_taxonomy() {
        assert_eq!(AppError::AuthMissing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::AuthzDenied("no grant".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::InvariantViolation("master_db".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::BlockedSql("GRANT".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict("Assignment".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::QueryTimeout(60).status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            AppError::CredentialUnreadable.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn conflict_message_says_already_exists() {
        let msg = AppError::Conflict("Assignment".into()).to_string();
        assert!(msg.contains("already exists"));
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(AppError::MissingWhereClause.code(), "MISSING_WHERE_CLAUSE");
        assert_eq!(AppError::NotReadOnly("update".into()).code(), "NOT_READ_ONLY");
        assert_eq!(AppError::CredentialUnreadable.code(), "CREDENTIAL_UNREADABLE");
    }
}
