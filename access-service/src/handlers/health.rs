//! Liveness and catalog reachability.

use crate::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub timestamp: chrono::DateTime<Utc>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match crate::db::health_check(state.pools.master()).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "health check catalog ping failed");
            false
        }
    };

    Json(HealthResponse {
        status: if database { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        timestamp: Utc::now(),
    })
}
