//! Axum extractors for tenant-scoped handlers.
//!
//! - [`TenantExtractor`] - The tenant installed by the tenant boundary

mod tenant;

pub use tenant::TenantExtractor;
