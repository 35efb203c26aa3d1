//! Database assignments: "user U may reach database D via this connection".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DatabaseAssignment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub database_name: String,
    #[serde(skip_serializing)]
    pub connection_string_encrypted: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AssignDatabaseRequest {
    pub user_id: Uuid,
    pub database_name: String,
    pub connection_string: String,
}
