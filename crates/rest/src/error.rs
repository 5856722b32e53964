//! Error types for the REST layer.
//!
//! Every [`RestError`] renders as a JSON body `{"error": code, "message": text}`
//! with a matching HTTP status:
//!
//! | Error | HTTP Status | Code |
//! |-------|-------------|------|
//! | TenantRequired | 400 | tenant-required |
//! | InvalidTenant | 400 | invalid-tenant |
//! | BadRequest | 400 | invalid |
//! | UnprocessableEntity | 422 | unprocessable |
//! | ServiceUnavailable | 503 | unavailable |
//! | InternalError | 500 | exception |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use tessera_isolation::{ConfigError, IsolationError, RewriteError, TenantError};

/// The primary error type for REST operations.
#[derive(Debug)]
pub enum RestError {
    /// No tenant could be resolved and the policy requires one (HTTP 400).
    TenantRequired {
        /// Header the client should have sent.
        header: String,
    },

    /// A tenant identifier was malformed (HTTP 400).
    InvalidTenant {
        /// Message describing the problem.
        message: String,
    },

    /// Invalid request (HTTP 400).
    BadRequest {
        /// Message describing the problem.
        message: String,
    },

    /// Well-formed request that cannot be processed (HTTP 422).
    UnprocessableEntity {
        /// Message describing the problem.
        message: String,
    },

    /// A backing service is not configured or not reachable (HTTP 503).
    ServiceUnavailable {
        /// Message describing the problem.
        message: String,
    },

    /// Internal server error (HTTP 500).
    InternalError {
        /// Message describing the error.
        message: String,
    },
}

impl RestError {
    /// Returns the HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::TenantRequired { .. }
            | RestError::InvalidTenant { .. }
            | RestError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            RestError::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RestError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            RestError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::TenantRequired { header } => {
                write!(f, "Tenant required: no tenant in {} header or credentials", header)
            }
            RestError::InvalidTenant { message } => write!(f, "Invalid tenant: {}", message),
            RestError::BadRequest { message } => write!(f, "Bad request: {}", message),
            RestError::UnprocessableEntity { message } => {
                write!(f, "Unprocessable entity: {}", message)
            }
            RestError::ServiceUnavailable { message } => {
                write!(f, "Service unavailable: {}", message)
            }
            RestError::InternalError { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for RestError {}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, details) = match &self {
            RestError::TenantRequired { header } => (
                "tenant-required",
                format!(
                    "Tenant could not be resolved; send a positive tenant id in the {} header",
                    header
                ),
            ),
            RestError::InvalidTenant { message } => ("invalid-tenant", message.clone()),
            RestError::BadRequest { message } => ("invalid", message.clone()),
            RestError::UnprocessableEntity { message } => ("unprocessable", message.clone()),
            RestError::ServiceUnavailable { message } => ("unavailable", message.clone()),
            RestError::InternalError { message } => {
                tracing::error!(error = %message, "Internal error");
                ("exception", message.clone())
            }
        };

        (status, Json(error_body(code, &details))).into_response()
    }
}

/// Creates the JSON error body.
fn error_body(code: &str, details: &str) -> serde_json::Value {
    serde_json::json!({
        "error": code,
        "message": details,
    })
}

// Conversions from isolation-layer errors

impl From<IsolationError> for RestError {
    fn from(err: IsolationError) -> Self {
        match err {
            IsolationError::Tenant(e) => e.into(),
            IsolationError::Rewrite(e) => e.into(),
            IsolationError::Config(e) => e.into(),
            // Driver failures
            #[allow(unreachable_patterns)]
            other => RestError::InternalError {
                message: other.to_string(),
            },
        }
    }
}

impl From<TenantError> for RestError {
    fn from(err: TenantError) -> Self {
        RestError::InvalidTenant {
            message: err.to_string(),
        }
    }
}

impl From<RewriteError> for RestError {
    fn from(err: RewriteError) -> Self {
        RestError::UnprocessableEntity {
            message: err.to_string(),
        }
    }
}

impl From<ConfigError> for RestError {
    fn from(err: ConfigError) -> Self {
        RestError::InternalError {
            message: err.to_string(),
        }
    }
}

/// Result type for REST operations.
pub type RestResult<T> = Result<T, RestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                RestError::TenantRequired {
                    header: "X-Tenant-Id".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                RestError::UnprocessableEntity {
                    message: "x".to_string(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                RestError::ServiceUnavailable {
                    message: "x".to_string(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                RestError::InternalError {
                    message: "x".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status);
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_from_isolation_error() {
        let err: RestError = IsolationError::from(TenantError::InvalidTenantId {
            value: "abc".to_string(),
        })
        .into();
        assert!(matches!(err, RestError::InvalidTenant { .. }));

        let err: RestError = IsolationError::from(RewriteError::Unparseable {
            message: "boom".to_string(),
        })
        .into();
        assert!(matches!(err, RestError::UnprocessableEntity { .. }));
    }

    #[test]
    fn test_error_body() {
        let body = error_body("invalid", "bad things");
        assert_eq!(body["error"], "invalid");
        assert_eq!(body["message"], "bad things");
    }

    #[test]
    fn test_display() {
        let err = RestError::BadRequest {
            message: "missing field".to_string(),
        };
        assert_eq!(err.to_string(), "Bad request: missing field");
    }
}
