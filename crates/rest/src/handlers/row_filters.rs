//! Row-filter expression validation endpoint.
//!
//! Administrators submit the boolean condition of a row-level permission
//! before it is stored; anything that could smuggle SQL into generated
//! queries is rejected.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::AppState;

/// Body of `POST /api/row-filters/validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRowFilterRequest {
    /// The filter condition, e.g. `region = 'EU' AND status IN ('open')`.
    pub expression: String,
}

/// Validates a row-filter expression.
///
/// # HTTP Request
///
/// `POST [base]/api/row-filters/validate`
///
/// # Response
///
/// - `200 OK` - `{"valid": true}`
/// - `422 Unprocessable Entity` - `{"valid": false, "message": "..."}`
pub async fn validate_row_filter_handler(
    State(state): State<AppState>,
    Json(request): Json<ValidateRowFilterRequest>,
) -> Response {
    let result = state.validator().validate(&request.expression);
    debug!(valid = result.valid, "Validated row filter expression");

    let status = if result.valid {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(result)).into_response()
}
