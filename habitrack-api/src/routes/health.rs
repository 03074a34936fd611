/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "pool": { "size": 4, "idle": 3 },
///   "rate_limiting": false
/// }
/// ```
///
/// Always answers 200; a failed database ping reports `degraded`.

use crate::app::AppState;
use axum::{extract::State, Json};
use habitrack_shared::db::pool::{self, PoolStats};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub pool: PoolStats,
    pub rate_limiting: bool,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = match pool::ping(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check database ping failed");
            false
        }
    };

    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" },
        version: habitrack_shared::VERSION,
        database: if connected { "connected" } else { "disconnected" },
        pool: pool::pool_stats(&state.db),
        rate_limiting: state.rate_limiter.is_some(),
    })
}
