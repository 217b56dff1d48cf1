/// Health check endpoint
///
/// `GET /health` - reports service version and database reachability.
/// Always answers 200 so load balancers can distinguish "up but degraded"
/// from "down".

use crate::app::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: "ok" or "degraded"
    pub status: &'static str,

    /// Service version
    pub version: &'static str,

    /// Database reachability
    pub database: &'static str,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match lonify_shared::db::pool::health_check(&state.db).await {
        Ok(()) => "reachable",
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach database");
            "unreachable"
        }
    };

    Json(HealthResponse {
        status: if database == "reachable" { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}
