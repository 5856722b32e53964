//! Tenant-scoping preview.
//!
//! Shows how a statement would be rewritten for the tenant bound to the
//! request, without executing it.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tessera_isolation::TenantContext;
use tessera_isolation::rewrite::RewriteStatus;

use crate::error::RestResult;
use crate::state::AppState;

/// Body of `POST /api/sql/rewrite`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteRequest {
    /// The statement(s) to scope.
    pub sql: String,
}

/// Response of `POST /api/sql/rewrite`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteResponse {
    /// The statement that would be executed.
    pub sql: String,
    /// Number of tenant predicates injected.
    pub predicates_added: usize,
    /// Whether at least one predicate was injected.
    pub scoped: bool,
    /// Why the statement was left unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Rewrites a statement for the current request tenant.
///
/// The tenant is read from the task-local context installed by the tenant
/// boundary, the same way a driver wrapper would see it.
///
/// # HTTP Request
///
/// `POST [base]/api/sql/rewrite`
///
/// # Response
///
/// - `200 OK` - Rewrite result
/// - `422 Unprocessable Entity` - Unparseable statement under a fail-closed policy
pub async fn rewrite_preview_handler(
    State(state): State<AppState>,
    Json(request): Json<RewriteRequest>,
) -> RestResult<Json<RewriteResponse>> {
    let outcome = state
        .rewriter()
        .analyze(TenantContext::current_tenant(), &request.sql)?;

    let reason = match outcome.status {
        RewriteStatus::Scoped => None,
        RewriteStatus::Unchanged(reason) => Some(reason.to_string()),
    };

    Ok(Json(RewriteResponse {
        scoped: outcome.is_scoped(),
        sql: outcome.sql,
        predicates_added: outcome.predicates_added,
        reason,
    }))
}
