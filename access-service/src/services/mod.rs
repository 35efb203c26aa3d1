pub mod audit;
pub mod auth;
pub mod authz;
pub mod grants;
pub mod identifiers;
pub mod lifecycle;
pub mod notifier;
pub mod password;
pub mod pg_users;
pub mod pools;
pub mod servers;
pub mod vault;

pub use audit::{AuditEvent, AuditRecorder};
pub use auth::{AuthService, AuthenticatedKey};
pub use authz::PermissionService;
pub use grants::{PermissionMaterializer, SchemaGrantOptions};
pub use lifecycle::LifecycleCoordinator;
pub use notifier::{Notifier, SmtpNotifier};
pub use password::PasswordService;
pub use pg_users::PgUserManager;
pub use pools::PoolRegistry;
pub use servers::ServerDirectory;
pub use vault::CryptoVault;
