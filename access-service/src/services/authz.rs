//! Authorization decisions from catalog state.

use crate::models::{PermissionInfo, PermissionLevel};
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use uuid::Uuid;

const READ_OPERATIONS: &[&str] = &["select", "read", "get", "list", "describe", "show", "explain"];

/// Permission level an operation requires.
pub fn required_permission(operation: &str) -> PermissionLevel {
    let operation = operation.to_lowercase();
    if READ_OPERATIONS.iter().any(|op| operation.contains(op)) {
        PermissionLevel::ReadOnly
    } else {
        PermissionLevel::ReadWrite
    }
}

#[derive(Clone)]
pub struct PermissionService {
    pool: PgPool,
}

impl PermissionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Decision function: may `user` perform `operation` on
    /// `database.schema`? Absence of a grant is a deny.
    pub async fn check_permission(
        &self,
        user_id: Uuid,
        database_name: &str,
        schema_name: &str,
        operation: &str,
    ) -> Result<bool, AppError> {
        let required = required_permission(operation);

        // information_schema is implicitly readable for anyone holding at
        // least one assignment in this database's direction.
        if schema_name == "information_schema"
            && required == PermissionLevel::ReadOnly
            && self.has_any_assignment(user_id).await?
        {
            return Ok(true);
        }

        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT permission
            FROM schema_permissions
            WHERE user_id = $1 AND database_name = $2 AND schema_name = $3
            "#,
        )
        .bind(user_id)
        .bind(database_name)
        .bind(schema_name)
        .fetch_optional(&self.pool)
        .await?;

        let Some((permission,)) = row else {
            tracing::info!(
                user_id = %user_id,
                database = database_name,
                schema = schema_name,
                "permission denied: no grant"
            );
            return Ok(false);
        };

        let held: PermissionLevel = permission
            .parse()
            .map_err(|e: String| AppError::CatalogError(anyhow::anyhow!(e)))?;

        if held == PermissionLevel::ReadWrite {
            return Ok(true);
        }

        if held == PermissionLevel::ReadOnly && required == PermissionLevel::ReadOnly {
            return Ok(true);
        }

        tracing::info!(
            user_id = %user_id,
            database = database_name,
            schema = schema_name,
            required = required.as_str(),
            held = held.as_str(),
            "permission denied: insufficient level"
        );
        Ok(false)
    }

    async fn has_any_assignment(&self, user_id: Uuid) -> Result<bool, AppError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1::bigint FROM database_assignments WHERE user_id = $1 AND is_active = true LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// All schema grants for a user, plus the implicit information_schema
    /// entry per assigned database.
    pub async fn get_user_permissions(&self, user_id: Uuid) -> Result<Vec<PermissionInfo>, AppError> {
        let mut permissions: Vec<PermissionInfo> = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT database_name, schema_name, permission, created_at, updated_at
            FROM schema_permissions
            WHERE user_id = $1
            ORDER BY database_name, schema_name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| PermissionInfo {
            database: row.database_name,
            schema: row.schema_name,
            permission: row.permission,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        })
        .collect();

        for database in self.get_accessible_databases(user_id).await? {
            permissions.push(PermissionInfo {
                database,
                schema: "information_schema".to_string(),
                permission: PermissionLevel::ReadOnly.as_str().to_string(),
                created_at: None,
                updated_at: None,
            });
        }

        Ok(permissions)
    }

    pub async fn get_accessible_databases(&self, user_id: Uuid) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT database_name
            FROM database_assignments
            WHERE user_id = $1 AND is_active = true
            ORDER BY database_name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Upsert a schema grant in the catalog.
    pub async fn grant_permission(
        &self,
        user_id: Uuid,
        database_name: &str,
        schema_name: &str,
        permission: PermissionLevel,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO schema_permissions (user_id, database_name, schema_name, permission)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, database_name, schema_name)
            DO UPDATE SET permission = $4, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(database_name)
        .bind(schema_name)
        .bind(permission.as_str())
        .execute(&self.pool)
        .await?;

        tracing::info!(
            user_id = %user_id,
            database = database_name,
            schema = schema_name,
            permission = permission.as_str(),
            "permission granted"
        );
        Ok(())
    }

    /// Delete a schema grant; true if a row was removed.
    pub async fn revoke_permission(
        &self,
        user_id: Uuid,
        database_name: &str,
        schema_name: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM schema_permissions
            WHERE user_id = $1 AND database_name = $2 AND schema_name = $3
            "#,
        )
        .bind(user_id)
        .bind(database_name)
        .bind(schema_name)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(sqlx::FromRow)]
struct PermissionRow {
    database_name: String,
    schema_name: String,
    permission: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_operations_classify_as_read_only() {
        for op in ["select", "SELECT", "read", "get", "list", "describe", "show", "explain"] {
            assert_eq!(required_permission(op), PermissionLevel::ReadOnly, "{}", op);
        }
    }

    #[test]
    fn write_operations_require_read_write() {
        for op in ["insert", "update", "delete", "create", "drop", "alter", "truncate", "unknown"] {
            assert_eq!(required_permission(op), PermissionLevel::ReadWrite, "{}", op);
        }
    }
}
