//! Registered target-cluster servers and their admin credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, FromRow)]
pub struct DatabaseServer {
    pub id: Uuid,
    pub server_name: String,
    pub host: String,
    pub port: i32,
    pub admin_username: String,
    pub admin_password_encrypted: String,
    pub ssl_mode: String,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDatabaseServerRequest {
    #[validate(length(min = 1, max = 63))]
    pub server_name: String,
    #[validate(length(min = 1))]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: i32,
    #[validate(length(min = 1))]
    pub admin_username: String,
    #[validate(length(min = 1))]
    pub admin_password: String,
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
    pub notes: Option<String>,
}

fn default_port() -> i32 {
    5432
}

fn default_ssl_mode() -> String {
    "require".to_string()
}

#[derive(Debug, Deserialize)]
pub struct UpdateDatabaseServerRequest {
    pub server_name: Option<String>,
    pub host: Option<String>,
    pub port: Option<i32>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub ssl_mode: Option<String>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

/// Server listing view; the admin password ciphertext stays out of responses.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DatabaseServerResponse {
    pub id: Uuid,
    pub server_name: String,
    pub host: String,
    pub port: i32,
    pub admin_username: String,
    pub ssl_mode: String,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
