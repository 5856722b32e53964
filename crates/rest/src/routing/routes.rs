//! Route configuration.

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::handlers;
use crate::middleware::tenant_boundary;
use crate::state::AppState;

/// Creates all routes, wrapped in the tenant boundary.
///
/// # Routes
///
/// ## Probes (excluded from tenant resolution by default)
/// - `GET /health` - Health check
/// - `GET /_liveness` - Liveness probe
/// - `GET /_readiness` - Readiness probe
///
/// ## API
/// - `GET /api/tenant` - Resolved tenant of the request
/// - `POST /api/row-filters/validate` - Row-filter validation
/// - `POST /api/sql/rewrite` - Tenant-scoping preview
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/_liveness", get(handlers::health::liveness_handler))
        .route("/_readiness", get(handlers::health::readiness_handler))
        .route("/api/tenant", get(handlers::current_tenant_handler))
        .route(
            "/api/row-filters/validate",
            post(handlers::validate_row_filter_handler),
        )
        .route("/api/sql/rewrite", post(handlers::rewrite_preview_handler))
        .layer(middleware::from_fn_with_state(state.clone(), tenant_boundary))
        .with_state(state)
}
