//! Native PostgreSQL roles materialized per (user, database).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct PgDatabaseUser {
    pub id: Uuid,
    pub vibe_user_id: Uuid,
    pub database_name: String,
    pub pg_username: String,
    pub pg_password_encrypted: String,
    pub connection_string_encrypted: String,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePgUserRequest {
    pub user_id: Uuid,
    pub database_name: String,
    pub admin_connection_string: String,
    pub notes: Option<String>,
}

/// Listing view joined with the owning user's email.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PgUserSummary {
    pub id: Uuid,
    pub vibe_user_id: Uuid,
    pub database_name: String,
    pub pg_username: String,
    pub is_active: bool,
    pub notes: Option<String>,
    pub user_email: String,
    pub created_at: DateTime<Utc>,
}
