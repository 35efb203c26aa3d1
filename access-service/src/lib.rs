//! Multi-tenant access-control plane for PostgreSQL.
//!
//! Issues API credentials, materializes catalog grants as native
//! PostgreSQL roles/GRANTs/policies, and proxies SQL to target databases
//! under the caller's own PostgreSQL identity.

pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod sql;
pub mod utils;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AccessConfig;
use crate::services::{
    AuditRecorder, AuthService, CryptoVault, LifecycleCoordinator, PasswordService,
    PermissionMaterializer, PermissionService, PgUserManager, PoolRegistry, ServerDirectory,
    SmtpNotifier,
};
use service_core::error::AppError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AccessConfig,
    pub pools: PoolRegistry,
    pub vault: CryptoVault,
    pub auth: AuthService,
    pub authz: PermissionService,
    pub pg_users: PgUserManager,
    pub materializer: PermissionMaterializer,
    pub servers: ServerDirectory,
    pub lifecycle: LifecycleCoordinator,
    pub audit: AuditRecorder,
    pub passwords: PasswordService,
}

impl AppState {
    /// Wire up every component from configuration and a ready catalog pool.
    pub fn new(config: AccessConfig, master_pool: sqlx::PgPool) -> Result<Self, AppError> {
        let vault = CryptoVault::new(
            &config.security.encryption_key,
            &config.security.api_key_salt,
        )?;

        let pools = PoolRegistry::new(master_pool.clone(), vault.clone(), config.command_timeout());
        let auth = AuthService::new(master_pool.clone(), vault.clone());
        let authz = PermissionService::new(master_pool.clone());
        let pg_users = PgUserManager::new(pools.clone(), vault.clone());
        let materializer = PermissionMaterializer::new(pools.clone(), pg_users.clone());
        let servers = ServerDirectory::new(master_pool.clone(), vault.clone());
        let lifecycle = LifecycleCoordinator::new(
            master_pool.clone(),
            pools.clone(),
            vault.clone(),
            servers.clone(),
            pg_users.clone(),
        );
        let audit = AuditRecorder::new(master_pool.clone(), true);

        let notifier = Arc::new(SmtpNotifier::new(&config.smtp)?);
        let passwords = PasswordService::new(
            master_pool,
            vault.clone(),
            notifier,
            config.password_policy.clone(),
            config.smtp.public_base_url.clone(),
        );

        Ok(Self {
            config,
            pools,
            vault,
            auth,
            authz,
            pg_users,
            materializer,
            servers,
            lifecycle,
            audit,
            passwords,
        })
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let auth_routes = Router::new()
        .route("/validate", post(handlers::auth::validate_api_key))
        .route("/permissions", get(handlers::auth::get_permissions))
        .route(
            "/request-password-reset",
            post(handlers::auth::request_password_reset),
        )
        .route("/reset-password", post(handlers::auth::reset_password));

    let admin_routes = Router::new()
        .route(
            "/users",
            get(handlers::admin::users::list_users).post(handlers::admin::users::create_user),
        )
        .route("/users/:user_id", delete(handlers::admin::users::delete_user))
        .route(
            "/users/:user_id/activate",
            post(handlers::admin::users::activate_user),
        )
        .route(
            "/users/:user_id/deactivate",
            post(handlers::admin::users::deactivate_user),
        )
        .route(
            "/users/:user_id/databases",
            get(handlers::admin::users::get_user_databases),
        )
        .route(
            "/api-keys",
            get(handlers::admin::api_keys::list_api_keys)
                .post(handlers::admin::api_keys::create_api_key),
        )
        .route(
            "/api-keys/:key_id",
            delete(handlers::admin::api_keys::delete_api_key),
        )
        .route(
            "/api-keys/:key_id/revoke",
            post(handlers::admin::api_keys::revoke_api_key),
        )
        .route(
            "/database-servers",
            get(handlers::admin::servers::list_servers)
                .post(handlers::admin::servers::create_server),
        )
        .route(
            "/database-servers/:server_id",
            get(handlers::admin::servers::get_server)
                .put(handlers::admin::servers::update_server)
                .delete(handlers::admin::servers::delete_server),
        )
        .route(
            "/database-assignments",
            get(handlers::admin::assignments::list_assignments)
                .post(handlers::admin::assignments::assign_database),
        )
        .route(
            "/database-assignments/:assignment_id",
            delete(handlers::admin::assignments::remove_assignment),
        )
        .route(
            "/permissions",
            get(handlers::admin::permissions::list_permissions)
                .post(handlers::admin::permissions::grant_permission)
                .delete(handlers::admin::permissions::revoke_permission),
        )
        .route(
            "/table-permissions",
            get(handlers::admin::permissions::list_table_permissions)
                .post(handlers::admin::permissions::grant_table_permission),
        )
        .route(
            "/table-permissions/:permission_id",
            delete(handlers::admin::permissions::revoke_table_permission),
        )
        .route(
            "/rls-policies",
            get(handlers::admin::rls::list_rls_policies)
                .post(handlers::admin::rls::create_rls_policy),
        )
        .route(
            "/rls-policies/:policy_id",
            delete(handlers::admin::rls::drop_rls_policy),
        )
        .route("/rls-templates", get(handlers::admin::rls::list_rls_templates))
        .route(
            "/pg-users",
            get(handlers::admin::pg_users::list_pg_users)
                .post(handlers::admin::pg_users::create_pg_user),
        )
        .route(
            "/pg-users/:user_id/:database_name",
            delete(handlers::admin::pg_users::drop_pg_user),
        )
        .route(
            "/pg-users/:user_id/:database_name/reset-password",
            post(handlers::admin::pg_users::reset_pg_password),
        )
        .route(
            "/remove-user",
            post(handlers::admin::remove_user::remove_user),
        );

    let tables_routes = Router::new()
        .route(
            "/",
            get(handlers::tables::list_tables).post(handlers::tables::create_table),
        )
        .route(
            "/:table",
            get(handlers::tables::describe_table)
                .put(handlers::tables::alter_table)
                .delete(handlers::tables::drop_table),
        );

    let data_routes = Router::new().route(
        "/:schema/:table",
        get(handlers::data::query_data)
            .post(handlers::data::insert_data)
            .put(handlers::data::update_data)
            .delete(handlers::data::delete_data),
    );

    let router = Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes)
        .nest("/tables", tables_routes)
        .nest("/data", data_routes)
        .route("/query", post(handlers::query::execute_raw_query))
        .layer(cors_layer(&state.config)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(router)
}

fn cors_layer(config: &AccessConfig) -> Result<CorsLayer, AppError> {
    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| {
            origin.parse::<HeaderValue>().map_err(|_| {
                AppError::ConfigError(anyhow::anyhow!("invalid CORS origin: {}", origin))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
            header::HeaderName::from_static("x-user-id"),
        ]))
}
