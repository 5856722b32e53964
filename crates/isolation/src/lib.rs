//! Tessera SQL isolation layer
//!
//! This crate keeps tenants of a shared-schema database apart at the SQL
//! level. Every outbound statement is parsed and rewritten so that it can only
//! see or change rows whose tenant column matches the caller's tenant, and
//! administrator-written row filters are screened before they are stored.
//!
//! # Architecture
//!
//! - [`tenant`] - [`TenantId`] and the request-scoped [`TenantContext`]
//! - [`policy`] - [`IsolationPolicy`]: enabled/required flags, default tenant, excluded tables and paths
//! - [`rewrite`] - [`QueryRewriter`]: AST-based tenant predicate injection
//! - [`filter`] - [`FilterExpressionValidator`]: row-filter screening
//! - [`backends`] - Driver wrappers that run every statement through the rewriter
//! - [`error`] - Error types
//!
//! # Features
//!
//! - `sqlite` (default) - [`backends::sqlite`] with `rusqlite` and `r2d2`
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use tessera_isolation::{IsolationPolicy, QueryRewriter, TenantContext, TenantId};
//!
//! let policy = Arc::new(IsolationPolicy::enabled());
//! let rewriter = QueryRewriter::new(policy);
//!
//! let ctx = TenantContext::with_tenant(TenantId::new(42).unwrap());
//! let _guard = ctx.release_on_drop();
//!
//! let sql = rewriter
//!     .rewrite(&ctx, "SELECT * FROM orders AS o JOIN items AS i ON o.id = i.order_id")
//!     .unwrap();
//! assert_eq!(
//!     sql,
//!     "SELECT * FROM orders AS o JOIN items AS i ON o.id = i.order_id AND i.tenant_id = 42 \
//!      WHERE o.tenant_id = 42"
//! );
//!
//! // Built-in tenant-less tables are never scoped.
//! let sql = rewriter.rewrite(&ctx, "SELECT * FROM s2_tenant").unwrap();
//! assert_eq!(sql, "SELECT * FROM s2_tenant");
//! ```

pub mod backends;
pub mod dialect;
pub mod error;
pub mod filter;
pub mod policy;
pub mod rewrite;
pub mod tenant;

pub use dialect::SqlDialect;
pub use error::{ConfigError, IsolationError, IsolationResult, RewriteError, TenantError};
pub use filter::{FilterExpressionValidator, FilterRejection, ValidationResult};
pub use policy::{IsolationConfig, IsolationPolicy, ParseFailureMode};
pub use rewrite::{QueryRewriter, RewriteOutcome, StatementInterceptor};
pub use tenant::{TenantContext, TenantContextGuard, TenantId};

#[cfg(feature = "sqlite")]
pub use error::BackendError;
