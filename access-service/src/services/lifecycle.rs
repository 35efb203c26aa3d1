//! User removal: cascades catalog deletes, drops native roles on targets,
//! and writes a cleanup audit record.
//!
//! Each step runs as an individual statement; a failing step is logged and
//! the cascade continues, so a half-broken account can still be removed.

use crate::models::CleanupDetails;
use crate::services::pg_users::PgUserManager;
use crate::services::pools::PoolRegistry;
use crate::services::servers::ServerDirectory;
use crate::services::vault::CryptoVault;
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use url::Url;
use uuid::Uuid;

#[derive(Clone)]
pub struct LifecycleCoordinator {
    pool: PgPool,
    pools: PoolRegistry,
    vault: CryptoVault,
    servers: ServerDirectory,
    pg_users: PgUserManager,
}

#[derive(sqlx::FromRow)]
struct PgUserRow {
    database_name: String,
    pg_username: String,
    connection_string_encrypted: String,
}

impl LifecycleCoordinator {
    pub fn new(
        pool: PgPool,
        pools: PoolRegistry,
        vault: CryptoVault,
        servers: ServerDirectory,
        pg_users: PgUserManager,
    ) -> Self {
        Self {
            pool,
            pools,
            vault,
            servers,
            pg_users,
        }
    }

    /// Remove a user and everything hanging off it. Returns the removed
    /// user's email and the cleanup counters.
    pub async fn remove_user(
        &self,
        user_id: Uuid,
        admin_user_id: Uuid,
        cleanup_type: &str,
    ) -> Result<(String, CleanupDetails), AppError> {
        let user: Option<(Uuid, String)> =
            sqlx::query_as("SELECT id, email FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((_, email)) = user else {
            return Err(AppError::NotFound("User not found".to_string()));
        };

        let mut details = CleanupDetails::default();

        match sqlx::query_as::<_, (String,)>(
            "SELECT database_name FROM database_assignments WHERE user_id = $1 AND is_active = true",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        {
            Ok(rows) => {
                for (database,) in rows {
                    if !details.databases_affected.contains(&database) {
                        details.databases_affected.push(database);
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "database assignments fetch failed"),
        }

        details.table_permissions_revoked = self
            .delete_counting(
                "DELETE FROM table_permissions WHERE vibe_user_id = $1",
                user_id,
                "table permissions",
            )
            .await;

        details.schema_permissions_revoked = self
            .delete_counting(
                "DELETE FROM schema_permissions WHERE user_id = $1",
                user_id,
                "schema permissions",
            )
            .await;

        details.assignments_removed = self
            .delete_counting(
                "DELETE FROM database_assignments WHERE user_id = $1",
                user_id,
                "database assignments",
            )
            .await;

        self.delete_counting(
            "DELETE FROM audit_logs WHERE user_id = $1",
            user_id,
            "audit logs",
        )
        .await;

        details.api_keys_removed = self
            .delete_counting("DELETE FROM api_keys WHERE user_id = $1", user_id, "api keys")
            .await;

        details.pg_users_dropped = self.drop_native_roles(user_id).await;

        self.delete_counting(
            "DELETE FROM pg_database_users WHERE vibe_user_id = $1",
            user_id,
            "pg database users",
        )
        .await;

        details.rls_policies_dropped = self
            .delete_counting(
                "DELETE FROM rls_policies WHERE vibe_user_id = $1",
                user_id,
                "rls policies",
            )
            .await;

        self.delete_counting(
            "DELETE FROM password_reset_tokens WHERE user_id = $1",
            user_id,
            "password reset tokens",
        )
        .await;

        self.delete_counting(
            "DELETE FROM password_history WHERE user_id = $1",
            user_id,
            "password history",
        )
        .await;

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(
            user_id = %user_id,
            rows_deleted = deleted.rows_affected(),
            "user deletion completed"
        );

        // Audit failure never masks a completed cleanup.
        if let Err(e) = sqlx::query(
            r#"
            INSERT INTO user_cleanup_audit
                (user_id, user_email, cleanup_type, performed_by,
                 pg_users_dropped, schema_permissions_revoked,
                 table_permissions_revoked, rls_policies_dropped,
                 cleanup_details)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user_id)
        .bind(&email)
        .bind(cleanup_type)
        .bind(admin_user_id)
        .bind(details.pg_users_dropped)
        .bind(details.schema_permissions_revoked)
        .bind(details.table_permissions_revoked)
        .bind(details.rls_policies_dropped)
        .bind(serde_json::to_value(&details).unwrap_or(serde_json::Value::Null))
        .execute(&self.pool)
        .await
        {
            tracing::warn!(user_id = %user_id, error = %e, "user cleanup audit failed");
        }

        tracing::info!(
            user_id = %user_id,
            email = %email,
            performed_by = %admin_user_id,
            "user removed successfully"
        );

        Ok((email, details))
    }

    /// Drop each of the user's native roles, resolving admin credentials
    /// through the server registry. Missing servers or target failures are
    /// logged; the cascade continues either way.
    async fn drop_native_roles(&self, user_id: Uuid) -> i32 {
        let rows = match sqlx::query_as::<_, PgUserRow>(
            r#"
            SELECT database_name, pg_username, connection_string_encrypted
            FROM pg_database_users
            WHERE vibe_user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "pg user rows fetch failed");
                return 0;
            }
        };

        let mut dropped = 0;
        for row in rows {
            match self.drop_one_native_role(user_id, &row).await {
                Ok(()) => dropped += 1,
                Err(e) => tracing::warn!(
                    user_id = %user_id,
                    pg_username = %row.pg_username,
                    database = %row.database_name,
                    error = %e,
                    "failed to drop native role"
                ),
            }
            self.pools.evict_user_pool(user_id, &row.database_name).await;
        }
        dropped
    }

    async fn drop_one_native_role(&self, user_id: Uuid, row: &PgUserRow) -> Result<(), AppError> {
        let user_conn = self.vault.decrypt(&row.connection_string_encrypted)?;
        let url = Url::parse(&user_conn).map_err(|_| AppError::CredentialUnreadable)?;
        let host = url
            .host_str()
            .ok_or(AppError::CredentialUnreadable)?
            .to_string();
        let port = i32::from(url.port().unwrap_or(5432));

        let server = self.servers.find_by_host(&host, port).await?.ok_or_else(|| {
            AppError::NotFound(format!(
                "No database server credentials found for {}:{}",
                host, port
            ))
        })?;

        let admin_conn = self
            .servers
            .admin_connection_string(&server, &row.database_name)?;

        let admin_pool = self.pools.admin_pool(&admin_conn).await?;
        let result = self
            .pg_users
            .drop_role_on_target(&admin_pool, &admin_conn, &row.pg_username)
            .await;
        admin_pool.close().await;
        result?;

        tracing::info!(user_id = %user_id, pg_username = %row.pg_username, "native role dropped");
        Ok(())
    }

    async fn delete_counting(&self, sql: &str, user_id: Uuid, what: &str) -> i32 {
        match sqlx::query(sql).bind(user_id).execute(&self.pool).await {
            Ok(result) => result.rows_affected() as i32,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "{} cleanup skipped", what);
                0
            }
        }
    }
}
