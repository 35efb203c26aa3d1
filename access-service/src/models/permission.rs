//! Logical grants at schema and table/column granularity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Schema-level permission level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    ReadOnly,
    ReadWrite,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::ReadOnly => "read_only",
            PermissionLevel::ReadWrite => "read_write",
        }
    }
}

impl std::str::FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read_only" => Ok(PermissionLevel::ReadOnly),
            "read_write" => Ok(PermissionLevel::ReadWrite),
            other => Err(format!("Permission must be 'read_only' or 'read_write', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SchemaPermission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub database_name: String,
    pub schema_name: String,
    pub permission: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct GrantPermissionRequest {
    pub user_id: Uuid,
    pub database_name: String,
    pub schema_name: String,
    pub permission: PermissionLevel,
}

/// Permission listing entry, also embedded in `/auth/validate` output.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionInfo {
    pub database: String,
    pub schema: String,
    pub permission: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The seven grantable table verbs as catalog booleans.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TableVerbs {
    #[serde(default)]
    pub can_select: bool,
    #[serde(default)]
    pub can_insert: bool,
    #[serde(default)]
    pub can_update: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default)]
    pub can_truncate: bool,
    #[serde(default)]
    pub can_references: bool,
    #[serde(default)]
    pub can_trigger: bool,
}

impl TableVerbs {
    /// SQL verb list in GRANT order; empty when nothing is granted.
    pub fn to_sql_verbs(&self) -> Vec<&'static str> {
        let mut verbs = Vec::new();
        if self.can_select {
            verbs.push("SELECT");
        }
        if self.can_insert {
            verbs.push("INSERT");
        }
        if self.can_update {
            verbs.push("UPDATE");
        }
        if self.can_delete {
            verbs.push("DELETE");
        }
        if self.can_truncate {
            verbs.push("TRUNCATE");
        }
        if self.can_references {
            verbs.push("REFERENCES");
        }
        if self.can_trigger {
            verbs.push("TRIGGER");
        }
        verbs
    }

    pub fn needs_sequences(&self) -> bool {
        self.can_insert || self.can_update
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TablePermission {
    pub id: Uuid,
    pub vibe_user_id: Uuid,
    pub database_name: String,
    pub schema_name: String,
    pub table_name: String,
    pub can_select: bool,
    pub can_insert: bool,
    pub can_update: bool,
    pub can_delete: bool,
    pub can_truncate: bool,
    pub can_references: bool,
    pub can_trigger: bool,
    pub column_permissions: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct GrantTablePermissionRequest {
    pub user_id: Uuid,
    pub database_name: String,
    pub admin_connection_string: String,
    pub schema_name: String,
    pub table_name: String,
    #[serde(flatten)]
    pub verbs: TableVerbs,
    /// column -> list of verbs, e.g. {"email": ["SELECT", "UPDATE"]}
    pub column_permissions: Option<BTreeMap<String, Vec<String>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_list_follows_grant_order() {
        let verbs = TableVerbs {
            can_select: true,
            can_delete: true,
            can_trigger: true,
            ..Default::default()
        };
        assert_eq!(verbs.to_sql_verbs(), vec!["SELECT", "DELETE", "TRIGGER"]);
    }

    #[test]
    fn sequences_needed_for_insert_or_update() {
        assert!(TableVerbs { can_insert: true, ..Default::default() }.needs_sequences());
        assert!(TableVerbs { can_update: true, ..Default::default() }.needs_sequences());
        assert!(!TableVerbs { can_select: true, ..Default::default() }.needs_sequences());
    }

    #[test]
    fn permission_level_round_trips() {
        assert_eq!("read_only".parse::<PermissionLevel>().unwrap(), PermissionLevel::ReadOnly);
        assert_eq!(PermissionLevel::ReadWrite.as_str(), "read_write");
        assert!("admin".parse::<PermissionLevel>().is_err());
    }
}
