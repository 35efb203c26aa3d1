//! Append-only audit log. Writes happen off the request path and never
//! change a request's outcome; under pressure entries are dropped with a
//! warning rather than failing the caller.

use sqlx::postgres::PgPool;
use uuid::Uuid;

/// One operation to record.
#[derive(Debug, Clone, Default)]
pub struct AuditEvent {
    pub user_id: Option<Uuid>,
    pub api_key_id: Option<Uuid>,
    pub endpoint: String,
    pub method: String,
    pub database_name: Option<String>,
    pub schema_name: Option<String>,
    pub table_name: Option<String>,
    pub operation: Option<String>,
    pub request_body: Option<serde_json::Value>,
    pub response_status: i32,
    pub error_message: Option<String>,
    pub execution_time_ms: Option<i64>,
}

impl AuditEvent {
    pub fn new(endpoint: &str, method: &str, response_status: i32) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            response_status,
            ..Default::default()
        }
    }

    pub fn user(mut self, user_id: Uuid, api_key_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self.api_key_id = Some(api_key_id);
        self
    }

    pub fn database(mut self, database: &str) -> Self {
        self.database_name = Some(database.to_string());
        self
    }

    pub fn schema(mut self, schema: &str) -> Self {
        self.schema_name = Some(schema.to_string());
        self
    }

    pub fn table(mut self, table: &str) -> Self {
        self.table_name = Some(table.to_string());
        self
    }

    pub fn operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn request_body(mut self, body: serde_json::Value) -> Self {
        self.request_body = Some(body);
        self
    }

    pub fn error(mut self, message: &str) -> Self {
        self.error_message = Some(message.to_string());
        self
    }

    pub fn elapsed_ms(mut self, ms: i64) -> Self {
        self.execution_time_ms = Some(ms);
        self
    }
}

#[derive(Clone)]
pub struct AuditRecorder {
    pool: PgPool,
    enabled: bool,
}

impl AuditRecorder {
    pub fn new(pool: PgPool, enabled: bool) -> Self {
        Self { pool, enabled }
    }

    /// Record an event asynchronously; returns immediately.
    pub fn log(&self, event: AuditEvent) {
        if !self.enabled {
            return;
        }

        let pool = self.pool.clone();
        tokio::spawn(async move {
            let result = sqlx::query(
                r#"
                INSERT INTO audit_logs (
                    user_id, api_key_id, endpoint, method,
                    database_name, schema_name, table_name,
                    operation, request_body, response_status,
                    error_message, execution_time_ms
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(event.user_id)
            .bind(event.api_key_id)
            .bind(&event.endpoint)
            .bind(&event.method)
            .bind(&event.database_name)
            .bind(&event.schema_name)
            .bind(&event.table_name)
            .bind(&event.operation)
            .bind(&event.request_body)
            .bind(event.response_status)
            .bind(&event.error_message)
            .bind(event.execution_time_ms.map(|ms| ms as i32))
            .execute(&pool)
            .await;

            if let Err(e) = result {
                tracing::warn!(endpoint = %event.endpoint, error = %e, "audit log entry dropped");
            }
        });
    }
}
