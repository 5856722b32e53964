//! HTTP request handlers.
//!
//! - [`health`] - Health, liveness and readiness probes
//! - [`tenant`] - Echo of the resolved request tenant
//! - [`row_filters`] - Row-filter expression validation
//! - [`sql`] - Tenant-scoping preview for a statement

pub mod health;
pub mod row_filters;
pub mod sql;
pub mod tenant;

// Re-export handlers for convenience
pub use health::health_handler;
pub use row_filters::validate_row_filter_handler;
pub use sql::rewrite_preview_handler;
pub use tenant::current_tenant_handler;
