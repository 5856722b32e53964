//! SQLite statement-execution hook.
//!
//! [`ScopedConnection`] wraps a `rusqlite` connection and routes `execute`,
//! `prepare`, `query_row` and `execute_batch` through a
//! [`StatementInterceptor`] bound to one [`TenantContext`]. [`TenantPool`]
//! hands such connections out of an `r2d2` pool.

use std::fmt::Debug;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags, Params, Row};
use serde::{Deserialize, Serialize};

use crate::error::IsolationResult;
use crate::rewrite::StatementInterceptor;
use crate::tenant::TenantContext;

/// A pooled SQLite connection.
pub type PooledSqlite = PooledConnection<SqliteConnectionManager>;

/// A connection whose statements are tenant-scoped before execution.
///
/// `C` is anything that dereferences to a [`Connection`]: a pooled connection,
/// a `Box<Connection>` or a plain `&Connection`.
pub struct ScopedConnection<C = PooledSqlite>
where
    C: Deref<Target = Connection>,
{
    conn: C,
    ctx: TenantContext,
    interceptor: Arc<dyn StatementInterceptor>,
}

impl<C> Debug for ScopedConnection<C>
where
    C: Deref<Target = Connection>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedConnection")
            .field("tenant_id", &self.ctx.get())
            .finish_non_exhaustive()
    }
}

impl<C> ScopedConnection<C>
where
    C: Deref<Target = Connection>,
{
    /// Wraps `conn` so that its statements are scoped to `ctx`.
    pub fn new(conn: C, ctx: TenantContext, interceptor: Arc<dyn StatementInterceptor>) -> Self {
        Self {
            conn,
            ctx,
            interceptor,
        }
    }

    /// Returns the tenant context statements are scoped to.
    pub fn context(&self) -> &TenantContext {
        &self.ctx
    }

    /// Executes a single statement, returning the number of changed rows.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> IsolationResult<usize> {
        let sql = self.scoped(sql)?;
        Ok(self.conn.execute(&sql, params)?)
    }

    /// Prepares a statement for repeated execution.
    pub fn prepare(&self, sql: &str) -> IsolationResult<rusqlite::Statement<'_>> {
        let sql = self.scoped(sql)?;
        Ok(self.conn.prepare(&sql)?)
    }

    /// Executes a query expected to return at least one row and maps the first.
    pub fn query_row<T, P, F>(&self, sql: &str, params: P, f: F) -> IsolationResult<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let sql = self.scoped(sql)?;
        Ok(self.conn.query_row(&sql, params, f)?)
    }

    /// Executes several `;`-separated statements without parameters.
    pub fn execute_batch(&self, sql: &str) -> IsolationResult<()> {
        let sql = self.scoped(sql)?;
        Ok(self.conn.execute_batch(&sql)?)
    }

    /// Returns the underlying connection, bypassing tenant scoping.
    pub fn unscoped(&self) -> &Connection {
        &self.conn
    }

    fn scoped(&self, sql: &str) -> IsolationResult<String> {
        Ok(self.interceptor.intercept(&self.ctx, sql)?)
    }
}

/// Pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlitePoolConfig {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection checkout timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for SqlitePoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

static MEMORY_DB_SEQ: AtomicUsize = AtomicUsize::new(0);

/// An `r2d2` SQLite pool handing out [`ScopedConnection`]s.
#[derive(Clone)]
pub struct TenantPool {
    pool: Pool<SqliteConnectionManager>,
    interceptor: Arc<dyn StatementInterceptor>,
    is_memory: bool,
}

impl Debug for TenantPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantPool")
            .field("is_memory", &self.is_memory)
            .field("state", &self.pool.state())
            .finish_non_exhaustive()
    }
}

impl TenantPool {
    /// Creates a pool over a private in-memory database.
    ///
    /// All connections of the pool share the same database.
    pub fn in_memory(interceptor: Arc<dyn StatementInterceptor>) -> IsolationResult<Self> {
        let name = format!(
            "file:tessera-{}-{}?mode=memory&cache=shared",
            std::process::id(),
            MEMORY_DB_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        let manager = SqliteConnectionManager::file(name).with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        );
        Self::build(manager, SqlitePoolConfig::default(), interceptor, true)
    }

    /// Opens or creates a file-based database.
    pub fn open<P: AsRef<Path>>(
        path: P,
        interceptor: Arc<dyn StatementInterceptor>,
    ) -> IsolationResult<Self> {
        Self::with_config(path, SqlitePoolConfig::default(), interceptor)
    }

    /// Opens a file-based database with custom pool settings.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        config: SqlitePoolConfig,
        interceptor: Arc<dyn StatementInterceptor>,
    ) -> IsolationResult<Self> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        Self::build(manager, config, interceptor, false)
    }

    fn build(
        manager: SqliteConnectionManager,
        config: SqlitePoolConfig,
        interceptor: Arc<dyn StatementInterceptor>,
        is_memory: bool,
    ) -> IsolationResult<Self> {
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let manager = manager.with_init(move |conn| conn.busy_timeout(busy_timeout));

        let pool = Pool::builder()
            .max_size(config.max_connections)
            .min_idle(Some(config.min_connections))
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)?;

        tracing::info!(
            max_connections = config.max_connections,
            is_memory,
            "SQLite tenant pool ready"
        );

        Ok(Self {
            pool,
            interceptor,
            is_memory,
        })
    }

    /// Checks out a connection scoped to `ctx`.
    pub fn get(&self, ctx: &TenantContext) -> IsolationResult<ScopedConnection> {
        let conn = self.pool.get()?;
        Ok(ScopedConnection::new(
            conn,
            ctx.clone(),
            Arc::clone(&self.interceptor),
        ))
    }

    /// Checks out a connection scoped to the enclosing
    /// [`TenantContext::scope`]. Outside a scope statements pass through
    /// unchanged.
    pub fn get_current(&self) -> IsolationResult<ScopedConnection> {
        let ctx = TenantContext::current().unwrap_or_default();
        self.get(&ctx)
    }

    /// Checks out a raw connection for schema setup and cross-tenant
    /// administration.
    pub fn admin_connection(&self) -> IsolationResult<PooledSqlite> {
        Ok(self.pool.get()?)
    }
}
