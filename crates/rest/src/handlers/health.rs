//! Health check endpoint handlers.
//!
//! Provides health, liveness and readiness endpoints for monitoring and load
//! balancers. `/health` is on the default excluded path list, so it never
//! needs a tenant.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::error::RestResult;
use crate::state::AppState;

/// Handler for the health check endpoint.
///
/// # HTTP Request
///
/// `GET [base]/health`
///
/// # Response
///
/// - `200 OK` - Server is healthy
pub async fn health_handler(State(state): State<AppState>) -> RestResult<Response> {
    debug!("Processing health check request");

    let health_response = serde_json::json!({
        "status": "OK",
        "isolation_enabled": state.policy().is_enabled(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    });

    Ok((StatusCode::OK, Json(health_response)).into_response())
}

/// Handler for a liveness probe.
///
/// # HTTP Request
///
/// `GET [base]/_liveness`
pub async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Handler for a readiness probe.
///
/// When a database is configured, checks that a connection can be checked
/// out and answers a trivial query.
///
/// # HTTP Request
///
/// `GET [base]/_readiness`
///
/// # Response
///
/// - `200 OK` - Ready to serve
/// - `503 Service Unavailable` - The database is not reachable
pub async fn readiness_handler(State(state): State<AppState>) -> RestResult<Response> {
    debug!("Processing readiness check request");

    let database = database_check(&state).await;
    let status = if database == "unavailable" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let response = serde_json::json!({
        "status": if status.is_success() { "ready" } else { "not_ready" },
        "checks": {
            "database": database
        }
    });

    Ok((status, Json(response)).into_response())
}

#[cfg(feature = "sqlite")]
async fn database_check(state: &AppState) -> &'static str {
    let Some(pool) = state.pool().cloned() else {
        return "not_configured";
    };

    let result = tokio::task::spawn_blocking(move || {
        let conn = pool.admin_connection()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok::<_, tessera_isolation::IsolationError>(())
    })
    .await;

    match result {
        Ok(Ok(())) => "ok",
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Database readiness check failed");
            "unavailable"
        }
        Err(e) => {
            tracing::warn!(error = %e, "Database readiness check panicked");
            "unavailable"
        }
    }
}

#[cfg(not(feature = "sqlite"))]
async fn database_check(_state: &AppState) -> &'static str {
    "not_configured"
}
