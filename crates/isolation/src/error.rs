//! Error types for the isolation layer.
//!
//! Unresolvable tenants and rejected filter expressions are not errors: the
//! former is `Option::None`, the latter is returned as a
//! [`ValidationResult`](crate::filter::ValidationResult). What remains here are
//! configuration problems, malformed tenant identifiers, fail-closed rewrite
//! refusals and driver failures.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The top-level error type for the isolation layer.
#[derive(Error, Debug)]
pub enum IsolationError {
    /// Tenant identifier errors
    #[error(transparent)]
    Tenant(#[from] TenantError),

    /// Statement rewrite errors
    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    /// Policy configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database driver errors
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors related to tenant identifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TenantError {
    /// The value is not a positive integer.
    #[error("invalid tenant id: {value:?} (expected a positive integer)")]
    InvalidTenantId { value: String },
}

/// Errors raised by the query rewriter.
///
/// Only produced when the policy runs in fail-closed mode; the default
/// fail-open mode passes unparseable statements through unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// The statement could not be parsed, so it cannot be tenant-scoped.
    #[error("statement cannot be tenant-scoped: {message}")]
    Unparseable { message: String },
}

/// Errors raised while loading the isolation policy.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read isolation config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`IsolationConfig`](crate::policy::IsolationConfig).
    #[error("failed to parse isolation config: {0}")]
    Json(#[from] serde_json::Error),

    /// An excluded path pattern is malformed.
    #[error("invalid excluded path pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The default tenant id is not a positive integer.
    #[error("invalid default tenant id {value} (expected a positive integer)")]
    InvalidDefaultTenant { value: i64 },

    /// The tenant column is not a plain SQL identifier.
    #[error("invalid tenant column {column:?}")]
    InvalidTenantColumn { column: String },

    /// The tenant header name is empty or contains invalid characters.
    #[error("invalid tenant id header {header:?}")]
    InvalidHeaderName { header: String },

    /// A validator pattern failed to compile.
    #[error("invalid validator pattern: {0}")]
    Regex(#[from] regex::Error),
}

/// Errors from the database driver behind the statement-execution hook.
#[cfg(feature = "sqlite")]
#[derive(Error, Debug)]
pub enum BackendError {
    /// The SQLite driver reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No connection could be checked out of the pool.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for IsolationError {
    fn from(err: rusqlite::Error) -> Self {
        IsolationError::Backend(BackendError::Sqlite(err))
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for IsolationError {
    fn from(err: r2d2::Error) -> Self {
        IsolationError::Backend(BackendError::Pool(err))
    }
}

/// Result type for isolation-layer operations.
pub type IsolationResult<T> = Result<T, IsolationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_error_display() {
        let err = TenantError::InvalidTenantId {
            value: "abc".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid tenant id: \"abc\" (expected a positive integer)"
        );
    }

    #[test]
    fn test_isolation_error_is_transparent() {
        let err: IsolationError = RewriteError::Unparseable {
            message: "boom".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "statement cannot be tenant-scoped: boom");
    }

    #[test]
    fn test_config_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ConfigError = json_err.into();
        assert!(err.to_string().starts_with("failed to parse isolation config"));
    }
}
