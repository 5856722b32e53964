//! Resolved tenant echo.

use axum::{Json, extract::State};
use serde::Serialize;
use tessera_isolation::TenantId;

use crate::extractors::TenantExtractor;
use crate::state::AppState;
use crate::tenant::TenantSource;

/// Body of `GET /api/tenant`.
#[derive(Debug, Serialize)]
pub struct TenantResponse {
    /// The tenant bound to the request, if any.
    pub tenant_id: Option<TenantId>,
    /// Where the tenant came from.
    pub source: Option<TenantSource>,
    /// Whether statements are tenant-scoped.
    pub isolation_enabled: bool,
}

/// Returns the tenant the boundary bound to this request.
///
/// # HTTP Request
///
/// `GET [base]/api/tenant`
pub async fn current_tenant_handler(
    State(state): State<AppState>,
    tenant: Option<TenantExtractor>,
) -> Json<TenantResponse> {
    Json(TenantResponse {
        tenant_id: tenant.as_ref().map(TenantExtractor::tenant_id),
        source: tenant.as_ref().map(TenantExtractor::source),
        isolation_enabled: state.policy().is_enabled(),
    })
}
