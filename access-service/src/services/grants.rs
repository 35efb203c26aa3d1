//! Permission materializer: translates catalog grants into GRANT/REVOKE/
//! CREATE POLICY statements on target clusters, then mirrors the state
//! back into the catalog.
//!
//! Ordering is always target-first, catalog-mirror-second: the catalog
//! never claims a grant the target does not have.

use crate::models::TableVerbs;
use crate::services::identifiers::require_strict_identifier;
use crate::services::pg_users::{guard_master_db, PgUserManager};
use crate::services::pools::PoolRegistry;
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

const POLICY_TYPES: &[&str] = &["SELECT", "INSERT", "UPDATE", "DELETE", "ALL"];
const COMMAND_TYPES: &[&str] = &["PERMISSIVE", "RESTRICTIVE"];
const COLUMN_VERBS: &[&str] = &["SELECT", "INSERT", "UPDATE", "REFERENCES"];

/// Schema-level grant shape: table verbs plus DDL rights.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaGrantOptions {
    pub verbs: TableVerbs,
    pub can_create_table: bool,
}

#[derive(Clone)]
pub struct PermissionMaterializer {
    pools: PoolRegistry,
    pg_users: PgUserManager,
}

impl PermissionMaterializer {
    pub fn new(pools: PoolRegistry, pg_users: PgUserManager) -> Self {
        Self { pools, pg_users }
    }

    async fn pg_username_for(
        &self,
        vibe_user_id: Uuid,
        database_name: &str,
    ) -> Result<String, AppError> {
        self.pg_users
            .get_pg_username(vibe_user_id, database_name)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!(
                    "No PostgreSQL user found for user {} on database {}",
                    vibe_user_id,
                    database_name
                ))
            })
    }

    /// Apply schema-level grants on the target.
    pub async fn grant_schema_permissions(
        &self,
        vibe_user_id: Uuid,
        database_name: &str,
        admin_connection_string: &str,
        schema_name: &str,
        options: &SchemaGrantOptions,
        apply_to_existing: bool,
        apply_to_future: bool,
    ) -> Result<(), AppError> {
        guard_master_db(database_name)?;
        let schema_name = require_strict_identifier(schema_name, "schema")?;
        let pg_username = self.pg_username_for(vibe_user_id, database_name).await?;

        let admin_pool = self.pools.admin_pool(admin_connection_string).await?;
        let result = self
            .apply_schema_grants(
                &admin_pool,
                schema_name,
                &pg_username,
                options,
                apply_to_existing,
                apply_to_future,
            )
            .await;
        admin_pool.close().await;
        result?;

        tracing::info!(
            vibe_user_id = %vibe_user_id,
            pg_username = %pg_username,
            schema = schema_name,
            "schema permissions granted"
        );
        Ok(())
    }

    async fn apply_schema_grants(
        &self,
        admin_pool: &PgPool,
        schema_name: &str,
        pg_username: &str,
        options: &SchemaGrantOptions,
        apply_to_existing: bool,
        apply_to_future: bool,
    ) -> Result<(), AppError> {
        // USAGE is the precondition for any access in the schema.
        target_execute(
            admin_pool,
            &format!(
                "GRANT USAGE ON SCHEMA \"{}\" TO \"{}\"",
                schema_name, pg_username
            ),
        )
        .await?;

        let verbs = options.verbs.to_sql_verbs();
        if !verbs.is_empty() {
            let verb_list = verbs.join(", ");

            if apply_to_existing {
                target_execute(
                    admin_pool,
                    &format!(
                        "GRANT {} ON ALL TABLES IN SCHEMA \"{}\" TO \"{}\"",
                        verb_list, schema_name, pg_username
                    ),
                )
                .await?;
            }

            if apply_to_future {
                target_execute(
                    admin_pool,
                    &format!(
                        "ALTER DEFAULT PRIVILEGES IN SCHEMA \"{}\" GRANT {} ON TABLES TO \"{}\"",
                        schema_name, verb_list, pg_username
                    ),
                )
                .await?;
            }
        }

        // SERIAL columns need sequence access for writers.
        if options.verbs.needs_sequences() {
            if apply_to_existing {
                target_execute(
                    admin_pool,
                    &format!(
                        "GRANT USAGE, SELECT ON ALL SEQUENCES IN SCHEMA \"{}\" TO \"{}\"",
                        schema_name, pg_username
                    ),
                )
                .await?;
            }
            if apply_to_future {
                target_execute(
                    admin_pool,
                    &format!(
                        "ALTER DEFAULT PRIVILEGES IN SCHEMA \"{}\" GRANT USAGE, SELECT ON SEQUENCES TO \"{}\"",
                        schema_name, pg_username
                    ),
                )
                .await?;
            }
        }

        if options.can_create_table {
            target_execute(
                admin_pool,
                &format!(
                    "GRANT CREATE ON SCHEMA \"{}\" TO \"{}\"",
                    schema_name, pg_username
                ),
            )
            .await?;
        }

        Ok(())
    }

    /// Apply table-level (and optional column-level) grants on the target,
    /// then upsert the mirror row.
    #[allow(clippy::too_many_arguments)]
    pub async fn grant_table_permissions(
        &self,
        vibe_user_id: Uuid,
        database_name: &str,
        admin_connection_string: &str,
        schema_name: &str,
        table_name: &str,
        verbs: &TableVerbs,
        column_permissions: Option<&BTreeMap<String, Vec<String>>>,
    ) -> Result<(), AppError> {
        guard_master_db(database_name)?;
        let schema_name = require_strict_identifier(schema_name, "schema")?;
        let table_name = require_strict_identifier(table_name, "table")?;
        let pg_username = self.pg_username_for(vibe_user_id, database_name).await?;

        if let Some(columns) = column_permissions {
            for (column, col_verbs) in columns {
                require_strict_identifier(column, "column")?;
                for verb in col_verbs {
                    let upper = verb.to_uppercase();
                    if !COLUMN_VERBS.contains(&upper.as_str()) {
                        return Err(AppError::ParameterInvalid(format!(
                            "Invalid column privilege '{}' for column {}",
                            verb, column
                        )));
                    }
                }
            }
        }

        let admin_pool = self.pools.admin_pool(admin_connection_string).await?;
        let result = async {
            target_execute(
                &admin_pool,
                &format!(
                    "GRANT USAGE ON SCHEMA \"{}\" TO \"{}\"",
                    schema_name, pg_username
                ),
            )
            .await?;

            let verb_list = verbs.to_sql_verbs();
            if !verb_list.is_empty() {
                target_execute(
                    &admin_pool,
                    &format!(
                        "GRANT {} ON \"{}\".\"{}\" TO \"{}\"",
                        verb_list.join(", "),
                        schema_name,
                        table_name,
                        pg_username
                    ),
                )
                .await?;
            }

            if let Some(columns) = column_permissions {
                for (column, col_verbs) in columns {
                    let col_verb_list = col_verbs
                        .iter()
                        .map(|v| v.to_uppercase())
                        .collect::<Vec<_>>()
                        .join(", ");
                    target_execute(
                        &admin_pool,
                        &format!(
                            "GRANT {} ({}) ON \"{}\".\"{}\" TO \"{}\"",
                            col_verb_list, column, schema_name, table_name, pg_username
                        ),
                    )
                    .await?;
                }
            }

            Ok::<(), AppError>(())
        }
        .await;
        admin_pool.close().await;
        result?;

        let column_permissions_json = column_permissions
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?;

        sqlx::query(
            r#"
            INSERT INTO table_permissions
                (vibe_user_id, database_name, schema_name, table_name,
                 can_select, can_insert, can_update, can_delete, can_truncate,
                 can_references, can_trigger, column_permissions)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (vibe_user_id, database_name, schema_name, table_name)
            DO UPDATE SET
                can_select = $5,
                can_insert = $6,
                can_update = $7,
                can_delete = $8,
                can_truncate = $9,
                can_references = $10,
                can_trigger = $11,
                column_permissions = $12,
                updated_at = NOW()
            "#,
        )
        .bind(vibe_user_id)
        .bind(database_name)
        .bind(schema_name)
        .bind(table_name)
        .bind(verbs.can_select)
        .bind(verbs.can_insert)
        .bind(verbs.can_update)
        .bind(verbs.can_delete)
        .bind(verbs.can_truncate)
        .bind(verbs.can_references)
        .bind(verbs.can_trigger)
        .bind(column_permissions_json)
        .execute(self.pools.master())
        .await?;

        tracing::info!(
            vibe_user_id = %vibe_user_id,
            pg_username = %pg_username,
            table = format!("{}.{}", schema_name, table_name),
            "table permissions granted"
        );
        Ok(())
    }

    /// Enable RLS on the table, create the policy scoped to the user's
    /// role, and record it. Returns the new catalog policy id.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_rls_policy(
        &self,
        vibe_user_id: Uuid,
        database_name: &str,
        admin_connection_string: &str,
        schema_name: &str,
        table_name: &str,
        policy_name: &str,
        policy_type: &str,
        using_expression: &str,
        with_check_expression: Option<&str>,
        command_type: &str,
        template_used: Option<&str>,
        notes: Option<&str>,
    ) -> Result<Uuid, AppError> {
        guard_master_db(database_name)?;
        let schema_name = require_strict_identifier(schema_name, "schema")?;
        let table_name = require_strict_identifier(table_name, "table")?;
        let policy_name = require_strict_identifier(policy_name, "policy")?;

        if !POLICY_TYPES.contains(&policy_type) {
            return Err(AppError::ParameterInvalid(format!(
                "Invalid policy type: {}",
                policy_type
            )));
        }
        if !COMMAND_TYPES.contains(&command_type) {
            return Err(AppError::ParameterInvalid(format!(
                "Invalid command type: {}",
                command_type
            )));
        }
        if using_expression.trim().is_empty() {
            return Err(AppError::ParameterInvalid(
                "using_expression must not be empty".to_string(),
            ));
        }

        let pg_username = self.pg_username_for(vibe_user_id, database_name).await?;

        let mut policy_sql = format!(
            "CREATE POLICY \"{}\" ON \"{}\".\"{}\"",
            policy_name, schema_name, table_name
        );
        policy_sql.push_str(&format!(" AS {}", command_type));
        policy_sql.push_str(&format!(" FOR {}", policy_type));
        policy_sql.push_str(&format!(" TO \"{}\"", pg_username));
        policy_sql.push_str(&format!(" USING ({})", using_expression));

        // WITH CHECK only applies to row-producing commands.
        if let Some(check) = with_check_expression {
            if matches!(policy_type, "INSERT" | "UPDATE" | "ALL") {
                policy_sql.push_str(&format!(" WITH CHECK ({})", check));
            }
        }

        let admin_pool = self.pools.admin_pool(admin_connection_string).await?;
        let result = async {
            target_execute(
                &admin_pool,
                &format!(
                    "ALTER TABLE \"{}\".\"{}\" ENABLE ROW LEVEL SECURITY",
                    schema_name, table_name
                ),
            )
            .await?;
            target_execute(&admin_pool, &policy_sql).await
        }
        .await;
        admin_pool.close().await;
        result?;

        let (policy_id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO rls_policies
                (vibe_user_id, database_name, schema_name, table_name, policy_name,
                 policy_type, command_type, using_expression, with_check_expression,
                 template_used, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(vibe_user_id)
        .bind(database_name)
        .bind(schema_name)
        .bind(table_name)
        .bind(policy_name)
        .bind(policy_type)
        .bind(command_type)
        .bind(using_expression)
        .bind(with_check_expression)
        .bind(template_used)
        .bind(notes)
        .fetch_one(self.pools.master())
        .await?;

        tracing::info!(
            vibe_user_id = %vibe_user_id,
            pg_username = %pg_username,
            table = format!("{}.{}", schema_name, table_name),
            policy = policy_name,
            "rls policy created"
        );

        Ok(policy_id)
    }

    /// Drop a policy on the target, then flip the catalog row inactive.
    /// Returns false when the policy does not exist or is already inactive.
    pub async fn drop_rls_policy(
        &self,
        policy_id: Uuid,
        admin_connection_string: &str,
    ) -> Result<bool, AppError> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT schema_name, table_name, policy_name
            FROM rls_policies
            WHERE id = $1 AND is_active = true
            "#,
        )
        .bind(policy_id)
        .fetch_optional(self.pools.master())
        .await?;

        let Some((schema_name, table_name, policy_name)) = row else {
            return Ok(false);
        };

        let schema_name = require_strict_identifier(&schema_name, "schema")?;
        let table_name = require_strict_identifier(&table_name, "table")?;
        let policy_name = require_strict_identifier(&policy_name, "policy")?;

        let admin_pool = self.pools.admin_pool(admin_connection_string).await?;
        let result = target_execute(
            &admin_pool,
            &format!(
                "DROP POLICY IF EXISTS \"{}\" ON \"{}\".\"{}\"",
                policy_name, schema_name, table_name
            ),
        )
        .await;
        admin_pool.close().await;
        result?;

        sqlx::query(
            "UPDATE rls_policies SET is_active = false, updated_at = NOW() WHERE id = $1",
        )
        .bind(policy_id)
        .execute(self.pools.master())
        .await?;

        tracing::info!(policy_id = %policy_id, "rls policy dropped");
        Ok(true)
    }
}

async fn target_execute(pool: &PgPool, sql: &str) -> Result<(), AppError> {
    sqlx::query(sql)
        .execute(pool)
        .await
        .map_err(|e| AppError::TargetError(e.to_string()))?;
    Ok(())
}
