//! HTTP middleware for the request boundary.
//!
//! This module contains Axum middleware components:
//!
//! - [`tenant`] - Tenant resolution and request-scoped tenant context

pub mod tenant;

pub use tenant::{X_TENANT_ID, tenant_boundary};
