//! Tenant identity and request-scoped tenant context.
//!
//! # Core Types
//!
//! - [`TenantId`] - Positive integer tenant identifier
//! - [`TenantContext`] - The active tenant of one execution unit
//! - [`TenantContextGuard`] - Clears a context when dropped
//!
//! # Lifecycle
//!
//! A context is created when a request begins, set once by the request
//! boundary, read by the query rewriter for every statement the request
//! issues, and cleared when the request completes. The clear is bound to
//! `Drop` so that it also happens on errors, panics and cancellation.
//!
//! ```
//! use tessera_isolation::tenant::{TenantContext, TenantId};
//!
//! # tokio_test_block_on(async {
//! let ctx = TenantContext::with_tenant(TenantId::new(42).unwrap());
//! let seen = ctx.scope(async { TenantContext::current_tenant() }).await;
//! assert_eq!(seen.map(TenantId::get), Some(42));
//! assert!(!ctx.has_tenant());
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod context;
mod id;

pub use context::{TenantContext, TenantContextGuard};
pub use id::TenantId;
