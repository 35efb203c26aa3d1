//! API-key authentication against the catalog.

use crate::models::{ApiKeyResponse, IssuedApiKey};
use crate::services::vault::CryptoVault;
use chrono::{Duration, Utc};
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use uuid::Uuid;

const API_KEY_PREFIX: &str = "vibe_";

/// Identity resolved from a validated API key.
#[derive(Debug, Clone)]
pub struct AuthenticatedKey {
    pub user_id: Uuid,
    pub key_id: Uuid,
    pub email: String,
    pub organization: Option<String>,
}

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    vault: CryptoVault,
}

#[derive(sqlx::FromRow)]
struct KeyLookupRow {
    key_id: Uuid,
    user_id: Uuid,
    expires_at: Option<chrono::DateTime<Utc>>,
    email: String,
    organization: Option<String>,
    user_active: bool,
    key_active: bool,
}

impl AuthService {
    pub fn new(pool: PgPool, vault: CryptoVault) -> Self {
        Self { pool, vault }
    }

    /// Validate an API key's plaintext and resolve the owning identity.
    ///
    /// A validated key implies its user is active and the key is neither
    /// revoked nor expired.
    pub async fn validate_api_key(&self, api_key: &str) -> Result<AuthenticatedKey, AppError> {
        if !api_key.starts_with(API_KEY_PREFIX) {
            return Err(AppError::AuthInvalid);
        }

        let key_hash = self.vault.hash_api_key(api_key);

        let row: Option<KeyLookupRow> = sqlx::query_as(
            r#"
            SELECT
                k.id as key_id,
                k.user_id,
                k.expires_at,
                u.email,
                u.organization,
                u.is_active as user_active,
                k.is_active as key_active
            FROM api_keys k
            JOIN users u ON k.user_id = u.id
            WHERE k.key_hash = $1
            "#,
        )
        .bind(&key_hash)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            let prefix: String = api_key.chars().take(14).collect();
            tracing::info!(key_prefix = %prefix, "api key not found");
            return Err(AppError::AuthInvalid);
        };

        if !row.key_active || !row.user_active {
            tracing::info!(user_id = %row.user_id, "api key or user inactive");
            return Err(AppError::AuthInvalid);
        }

        if let Some(expires_at) = row.expires_at {
            if expires_at < Utc::now() {
                tracing::info!(user_id = %row.user_id, "api key expired");
                return Err(AppError::AuthExpired);
            }
        }

        // Best-effort; a failed touch never blocks the request.
        if let Err(e) = sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(row.key_id)
            .execute(&self.pool)
            .await
        {
            tracing::warn!(key_id = %row.key_id, error = %e, "failed to update last_used_at");
        }

        Ok(AuthenticatedKey {
            user_id: row.user_id,
            key_id: row.key_id,
            email: row.email,
            organization: row.organization,
        })
    }

    /// Create a new API key for a user; the plaintext is returned exactly
    /// once and only its salted digest is stored.
    pub async fn create_api_key(
        &self,
        user_id: Uuid,
        name: &str,
        environment: &str,
        expires_in_days: Option<i64>,
    ) -> Result<IssuedApiKey, AppError> {
        let generated = self.vault.new_api_key(environment);
        let expires_at = expires_in_days.map(|days| Utc::now() + Duration::days(days));

        sqlx::query(
            r#"
            INSERT INTO api_keys (user_id, key_hash, key_prefix, name, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(&generated.digest)
        .bind(&generated.prefix)
        .bind(name)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(user_id = %user_id, name = name, "api key created");

        Ok(IssuedApiKey {
            api_key: generated.plaintext,
            key_prefix: generated.prefix,
            name: name.to_string(),
            expires_at,
        })
    }

    /// Revoke a key by flipping `is_active`; true if a row changed.
    pub async fn revoke_api_key(&self, key_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE api_keys SET is_active = false WHERE id = $1")
            .bind(key_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            tracing::info!(key_id = %key_id, "api key revoked");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub async fn list_api_keys(
        &self,
        user_id: Option<Uuid>,
    ) -> Result<Vec<ApiKeyResponse>, AppError> {
        let rows = match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, ApiKeyResponse>(
                    r#"
                    SELECT id, user_id, key_prefix, name, is_active, expires_at, last_used_at, created_at
                    FROM api_keys
                    WHERE user_id = $1
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ApiKeyResponse>(
                    r#"
                    SELECT id, user_id, key_prefix, name, is_active, expires_at, last_used_at, created_at
                    FROM api_keys
                    ORDER BY created_at DESC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows)
    }

    pub async fn delete_api_key(&self, key_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(key_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
