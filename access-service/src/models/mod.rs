pub mod api_key;
pub mod assignment;
pub mod cleanup;
pub mod password;
pub mod permission;
pub mod pg_user;
pub mod rls;
pub mod server;
pub mod user;

pub use api_key::{ApiKeyResponse, CreateApiKeyRequest, IssuedApiKey};
pub use assignment::{AssignDatabaseRequest, DatabaseAssignment};
pub use cleanup::{CleanupDetails, RemoveUserRequest, RemoveUserResponse};
pub use password::{RequestPasswordResetRequest, ResetPasswordRequest};
pub use permission::{
    GrantPermissionRequest, GrantTablePermissionRequest, PermissionInfo, PermissionLevel,
    SchemaPermission, TablePermission, TableVerbs,
};
pub use pg_user::{CreatePgUserRequest, PgDatabaseUser, PgUserSummary};
pub use rls::{CreateRlsPolicyRequest, RlsPolicy, RlsPolicyTemplate};
pub use server::{
    CreateDatabaseServerRequest, DatabaseServer, DatabaseServerResponse,
    UpdateDatabaseServerRequest,
};
pub use user::{CreateUserRequest, User, UserResponse};
