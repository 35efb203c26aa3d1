//! API keys: the plaintext is shown once at creation and never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub user_id: Uuid,
    pub name: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    pub expires_in_days: Option<i64>,
}

fn default_environment() -> String {
    "prod".to_string()
}

/// Key listing view; never includes the hash.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub key_prefix: String,
    pub name: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Returned exactly once from key creation; carries the plaintext.
#[derive(Debug, Serialize)]
pub struct IssuedApiKey {
    pub api_key: String,
    pub key_prefix: String,
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
}
