//! Database server registry lookups and admin connection-string assembly.

use crate::models::{DatabaseServer, PgDatabaseUser};
use crate::services::vault::CryptoVault;
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use url::Url;
use uuid::Uuid;

#[derive(Clone)]
pub struct ServerDirectory {
    pool: PgPool,
    vault: CryptoVault,
}

impl ServerDirectory {
    pub fn new(pool: PgPool, vault: CryptoVault) -> Self {
        Self { pool, vault }
    }

    pub async fn find_by_id(&self, server_id: Uuid) -> Result<Option<DatabaseServer>, AppError> {
        let server = sqlx::query_as::<_, DatabaseServer>(
            "SELECT * FROM database_servers WHERE id = $1",
        )
        .bind(server_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(server)
    }

    pub async fn find_by_host(
        &self,
        host: &str,
        port: i32,
    ) -> Result<Option<DatabaseServer>, AppError> {
        let server = sqlx::query_as::<_, DatabaseServer>(
            r#"
            SELECT * FROM database_servers
            WHERE host = $1 AND port = $2 AND is_active = true
            LIMIT 1
            "#,
        )
        .bind(host)
        .bind(port)
        .fetch_optional(&self.pool)
        .await?;
        Ok(server)
    }

    /// Compose an admin connection string for a database on a registered
    /// server, decrypting the stored admin password.
    pub fn admin_connection_string(
        &self,
        server: &DatabaseServer,
        database_name: &str,
    ) -> Result<String, AppError> {
        let admin_password = self.vault.decrypt(&server.admin_password_encrypted)?;
        Ok(format!(
            "postgresql://{}:{}@{}:{}/{}?sslmode={}",
            server.admin_username,
            admin_password,
            server.host,
            server.port,
            database_name,
            server.ssl_mode
        ))
    }

    /// Resolve admin credentials for a user's existing PG role by matching
    /// the role's connection-string host against the server registry.
    pub async fn resolve_admin_for_user_db(
        &self,
        user_id: Uuid,
        database_name: &str,
    ) -> Result<String, AppError> {
        let pg_user: Option<PgDatabaseUser> = sqlx::query_as(
            r#"
            SELECT * FROM pg_database_users
            WHERE vibe_user_id = $1 AND database_name = $2 AND is_active = true
            "#,
        )
        .bind(user_id)
        .bind(database_name)
        .fetch_optional(&self.pool)
        .await?;

        let pg_user = pg_user.ok_or_else(|| {
            AppError::NotFound(format!(
                "PostgreSQL user not found for database {}",
                database_name
            ))
        })?;

        let user_conn = self.vault.decrypt(&pg_user.connection_string_encrypted)?;
        let url = Url::parse(&user_conn)
            .map_err(|_| AppError::CredentialUnreadable)?;

        let host = url
            .host_str()
            .ok_or(AppError::CredentialUnreadable)?
            .to_string();
        let port = i32::from(url.port().unwrap_or(5432));

        let server = self.find_by_host(&host, port).await?.ok_or_else(|| {
            AppError::NotFound(format!(
                "No database server credentials found for {}:{}",
                host, port
            ))
        })?;

        self.admin_connection_string(&server, database_name)
    }
}
