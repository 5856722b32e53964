//! Statement-execution hooks for database drivers.
//!
//! A backend wraps a driver connection so that every statement it prepares is
//! passed through a [`StatementInterceptor`](crate::rewrite::StatementInterceptor)
//! first. Each backend is gated behind a feature flag.
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | SQLite | `sqlite` | `rusqlite` connections, pooled with `r2d2` |
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use tessera_isolation::backends::sqlite::TenantPool;
//! use tessera_isolation::policy::IsolationPolicy;
//! use tessera_isolation::rewrite::QueryRewriter;
//! use tessera_isolation::tenant::{TenantContext, TenantId};
//!
//! let rewriter = QueryRewriter::new(Arc::new(IsolationPolicy::enabled()));
//! let pool = TenantPool::open("./data/app.db", Arc::new(rewriter))?;
//!
//! let ctx = TenantContext::with_tenant(TenantId::new(7).unwrap());
//! let conn = pool.get(&ctx)?;
//! let open: i64 = conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "sqlite")]
pub mod sqlite;
