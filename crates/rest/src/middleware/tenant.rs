//! Tenant boundary middleware.
//!
//! Resolves the tenant of every request that is not on an excluded path,
//! installs it as the request's [`TenantContext`] and clears it when the
//! request finishes, however it finishes.

use axum::{
    extract::{Request, State},
    http::header::HeaderName,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tessera_isolation::TenantContext;
use tracing::debug;

use crate::error::RestError;
use crate::state::AppState;

/// Default header name for tenant identification.
pub static X_TENANT_ID: HeaderName = HeaderName::from_static("x-tenant-id");

/// Middleware function for the tenant boundary.
///
/// Use with `axum::middleware::from_fn_with_state`. For each request:
///
/// 1. Requests are passed through untouched when isolation is disabled or
///    the path matches an excluded path pattern.
/// 2. The tenant is resolved; unresolved requests get the default tenant, or
///    `400 Bad Request` when the policy requires a tenant.
/// 3. A [`TenantContext`] and the [`ResolvedTenant`](crate::tenant::ResolvedTenant)
///    are inserted into the request extensions.
/// 4. The rest of the stack runs inside [`TenantContext::scope`], so
///    statements rewritten anywhere below see the tenant and the context is
///    cleared on completion, error, panic or cancellation.
pub async fn tenant_boundary(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let policy = state.policy();
    if !policy.is_enabled() {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    if policy.is_excluded_path(&path) {
        debug!(path = %path, "Excluded path, skipping tenant resolution");
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let resolved = state.resolver().resolve(&parts, policy);

    let Some(tenant_id) = resolved.tenant_id else {
        tracing::warn!(path = %path, "Tenant could not be resolved");
        return RestError::TenantRequired {
            header: policy.tenant_id_header().to_string(),
        }
        .into_response();
    };

    if resolved.is_default() {
        tracing::warn!(tenant_id = %tenant_id, path = %path, "Using default tenant");
    } else {
        debug!(
            tenant_id = %tenant_id,
            source = ?resolved.source,
            path = %path,
            "Resolved tenant"
        );
    }
    if resolved.has_conflict() {
        debug!(sources = ?resolved.all_sources, "Tenant sources disagree, highest priority wins");
    }

    let ctx = TenantContext::with_tenant(tenant_id);
    parts.extensions.insert(ctx.clone());
    parts.extensions.insert(resolved);
    let request = Request::from_parts(parts, body);

    let response = ctx.scope(next.run(request)).await;
    debug!(tenant_id = %tenant_id, path = %path, "Tenant context cleared");
    response
}
