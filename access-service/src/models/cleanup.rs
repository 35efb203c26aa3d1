//! User removal request/response shapes and cleanup counters.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RemoveUserRequest {
    pub user_id: Uuid,
    /// Admin performing the removal, recorded in the cleanup audit.
    pub admin_user_id: Uuid,
    #[serde(default = "default_cleanup_type")]
    pub cleanup_type: String,
}

fn default_cleanup_type() -> String {
    "full_removal".to_string()
}

/// Counters gathered during the cascade; persisted as `cleanup_details`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupDetails {
    pub pg_users_dropped: i32,
    pub schema_permissions_revoked: i32,
    pub table_permissions_revoked: i32,
    pub rls_policies_dropped: i32,
    pub assignments_removed: i32,
    pub api_keys_removed: i32,
    pub databases_affected: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RemoveUserResponse {
    pub success: bool,
    pub message: String,
    pub cleanup_details: CleanupDetails,
}
