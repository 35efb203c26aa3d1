//! Response envelope shared by every endpoint, plus data-plane request
//! shapes.

pub mod requests;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

/// Per-request bookkeeping: id and start time, minted at the top of a handler.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub request_id: Uuid,
    pub started: Instant,
}

impl RequestMeta {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.started.elapsed().as_millis() as i64
    }

    pub fn metadata(&self) -> Metadata {
        Metadata {
            database: None,
            schema: None,
            table: None,
            execution_time_ms: Some(self.elapsed_ms()),
            timestamp: Utc::now(),
            request_id: self.request_id.to_string(),
        }
    }
}

impl Default for RequestMeta {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
}

impl Metadata {
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    pub limit: i64,
    pub offset: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(total: i64, limit: i64, offset: i64) -> Self {
        Self {
            total: Some(total),
            limit,
            offset,
            has_next: offset + limit < total,
            has_prev: offset > 0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, metadata: Metadata) -> Self {
        Self {
            success: true,
            data,
            metadata,
            pagination: None,
        }
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_expected_shape() {
        let meta = RequestMeta::new();
        let response = ApiResponse::new(
            serde_json::json!({"rows": []}),
            meta.metadata().with_database("analytics").with_schema("public"),
        );

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["metadata"]["database"], "analytics");
        assert_eq!(value["metadata"]["schema"], "public");
        assert!(value["metadata"]["request_id"].is_string());
        assert!(value.get("pagination").is_none());
    }

    #[test]
    fn pagination_flags() {
        let page = Pagination::new(250, 100, 100);
        assert!(page.has_next);
        assert!(page.has_prev);

        let last = Pagination::new(250, 100, 200);
        assert!(!last.has_next);
        assert!(last.has_prev);

        let first = Pagination::new(50, 100, 0);
        assert!(!first.has_next);
        assert!(!first.has_prev);
    }
}
