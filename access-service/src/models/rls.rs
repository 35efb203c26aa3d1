//! Row-level-security policies and their template catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RlsPolicy {
    pub id: Uuid,
    pub vibe_user_id: Uuid,
    pub database_name: String,
    pub schema_name: String,
    pub table_name: String,
    pub policy_name: String,
    pub policy_type: String,
    pub command_type: String,
    pub using_expression: String,
    pub with_check_expression: Option<String>,
    pub is_active: bool,
    pub template_used: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRlsPolicyRequest {
    pub user_id: Uuid,
    pub database_name: String,
    pub admin_connection_string: String,
    pub schema_name: String,
    pub table_name: String,
    pub policy_name: String,
    /// SELECT, INSERT, UPDATE, DELETE, or ALL
    pub policy_type: String,
    #[validate(length(min = 1, message = "using_expression must not be empty"))]
    pub using_expression: String,
    pub with_check_expression: Option<String>,
    #[serde(default = "default_command_type")]
    pub command_type: String,
    pub template_used: Option<String>,
    pub notes: Option<String>,
}

fn default_command_type() -> String {
    "PERMISSIVE".to_string()
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RlsPolicyTemplate {
    pub id: Uuid,
    pub template_name: String,
    pub description: Option<String>,
    pub policy_type: String,
    pub using_expression_template: String,
    pub with_check_expression_template: Option<String>,
    pub required_columns: Option<serde_json::Value>,
    pub example_usage: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
