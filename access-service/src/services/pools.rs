//! Connection pool registry: one master pool, small cached per-(user, db)
//! pools, and ephemeral admin pools for privileged DDL.

use crate::services::vault::CryptoVault;
use dashmap::DashMap;
use service_core::error::AppError;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone)]
pub struct PoolRegistry {
    master: PgPool,
    user_pools: Arc<DashMap<(Uuid, String), PgPool>>,
    vault: CryptoVault,
    command_timeout: Duration,
}

impl PoolRegistry {
    pub fn new(master: PgPool, vault: CryptoVault, command_timeout: Duration) -> Self {
        Self {
            master,
            user_pools: Arc::new(DashMap::new()),
            vault,
            command_timeout,
        }
    }

    pub fn master(&self) -> &PgPool {
        &self.master
    }

    /// Resolve the decrypted connection string for a user's database.
    pub async fn user_connection_string(
        &self,
        user_id: Uuid,
        database_name: &str,
    ) -> Result<String, AppError> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT connection_string_encrypted
            FROM database_assignments
            WHERE user_id = $1 AND database_name = $2 AND is_active = true
            "#,
        )
        .bind(user_id)
        .bind(database_name)
        .fetch_optional(&self.master)
        .await?;

        let (encrypted,) = row.ok_or_else(|| {
            AppError::NotFound(format!(
                "Database {} not found for user {}",
                database_name, user_id
            ))
        })?;

        self.vault.decrypt(&encrypted)
    }

    /// Pool for a user's database, created on first use. Kept deliberately
    /// tiny (1-3 connections, short idle life) to stay friendly to
    /// serverless connection quotas.
    pub async fn user_pool(&self, user_id: Uuid, database_name: &str) -> Result<PgPool, AppError> {
        let key = (user_id, database_name.to_string());

        if let Some(pool) = self.user_pools.get(&key) {
            return Ok(pool.clone());
        }

        let url = self.user_connection_string(user_id, database_name).await?;
        let options = self.connect_options(&url)?;

        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(3)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(20))
            .connect_with(options)
            .await
            .map_err(|e| AppError::TargetError(e.to_string()))?;

        tracing::info!(user_id = %user_id, database = database_name, "user pool created");

        // Guard against a concurrent first use: keep whichever pool landed
        // in the map and let the loser drop.
        let entry = self.user_pools.entry(key).or_insert(pool);
        Ok(entry.clone())
    }

    /// Ephemeral admin pool for a single privileged operation. Callers
    /// must `close().await` it when done; these are never cached.
    pub async fn admin_pool(&self, admin_connection_string: &str) -> Result<PgPool, AppError> {
        let options = self.connect_options(admin_connection_string)?;

        PgPoolOptions::new()
            .min_connections(1)
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| AppError::TargetError(e.to_string()))
    }

    /// Drop the cached pool for a (user, database) pair, e.g. after the
    /// native role is dropped or its password rotated.
    pub async fn evict_user_pool(&self, user_id: Uuid, database_name: &str) {
        if let Some((_, pool)) = self
            .user_pools
            .remove(&(user_id, database_name.to_string()))
        {
            pool.close().await;
        }
    }

    pub async fn close_all(&self) {
        for entry in self.user_pools.iter() {
            entry.value().close().await;
        }
        self.user_pools.clear();
        self.master.close().await;
    }

    fn connect_options(&self, url: &str) -> Result<PgConnectOptions, AppError> {
        let timeout_ms = self.command_timeout.as_millis().to_string();
        let options = PgConnectOptions::from_str(url)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("invalid connection string: {}", e)))?
            .options([("statement_timeout", timeout_ms.as_str())]);
        Ok(options)
    }
}
