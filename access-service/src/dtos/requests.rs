//! Data-plane request shapes.

use crate::sql::params::QueryParameter;
use serde::Deserialize;
use serde_json::{Map, Value};
use validator::Validate;

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    pub default: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default = "default_index_method")]
    pub method: String,
}

fn default_index_method() -> String {
    "btree".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConstraintDefinition {
    /// CHECK, UNIQUE, or FOREIGN KEY
    #[serde(rename = "type")]
    pub constraint_type: String,
    pub name: String,
    pub condition: Option<String>,
    pub columns: Option<Vec<String>>,
    pub references: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTableRequest {
    pub database: String,
    #[serde(rename = "schema", default = "default_schema")]
    pub schema_name: String,
    pub table: String,
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
    #[serde(default)]
    pub constraints: Vec<ConstraintDefinition>,
    #[serde(default = "default_true")]
    pub if_not_exists: bool,
}

#[derive(Debug, Deserialize)]
pub struct AlterTableRequest {
    pub database: String,
    #[serde(rename = "schema", default = "default_schema")]
    pub schema_name: String,
    /// ADD_COLUMN, DROP_COLUMN, RENAME_COLUMN, or ALTER_COLUMN
    pub action: String,
    pub column: Option<ColumnDefinition>,
    pub old_column_name: Option<String>,
    pub new_column_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DropTableRequest {
    pub database: String,
    #[serde(rename = "schema", default = "default_schema")]
    pub schema_name: String,
    #[serde(default)]
    pub cascade: bool,
    #[serde(default = "default_true")]
    pub if_exists: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListTablesQuery {
    pub database: String,
    #[serde(rename = "schema", default = "default_schema")]
    pub schema_name: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryDataParams {
    pub database: String,
    /// Comma-separated column list; absent means SELECT *.
    pub select: Option<String>,
    /// JSON object of column -> value equality filters.
    pub r#where: Option<String>,
    pub order_by: Option<String>,
    #[serde(default = "default_order")]
    pub order: String,
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: i64,
}

fn default_order() -> String {
    "ASC".to_string()
}

#[derive(Debug, Deserialize)]
pub struct InsertDataRequest {
    pub database: String,
    /// One record or a list of records.
    pub data: Value,
    pub returning: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDataRequest {
    pub database: String,
    pub set: Map<String, Value>,
    #[serde(default)]
    pub r#where: Map<String, Value>,
    pub returning: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteDataRequest {
    pub database: String,
    #[serde(default)]
    pub r#where: Map<String, Value>,
    pub returning: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RawQueryRequest {
    pub database: String,
    #[validate(length(min = 1, max = 50000))]
    pub query: String,
    #[serde(default)]
    pub params: Vec<QueryParameter>,
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub read_only: bool,
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_true() -> bool {
    true
}
