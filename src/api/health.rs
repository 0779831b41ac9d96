/// Health check endpoint
///
/// Reports the service version and whether the ARK database answers.
use crate::{context::AppContext, db};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// "ok" or "degraded"
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

pub fn routes() -> Router<AppContext> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthStatus>) {
    let (code, status, database) = match db::test_connection(&ctx.db).await {
        Ok(()) => (StatusCode::OK, "ok", "ok"),
        Err(e) => {
            tracing::warn!("Health check database query failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unavailable")
        }
    };

    (
        code,
        Json(HealthStatus {
            status,
            version: env!("CARGO_PKG_VERSION"),
            database,
        }),
    )
}
