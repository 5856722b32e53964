//! Application state for the request boundary.
//!
//! This module defines the shared application state that is available to all
//! request handlers and to the tenant boundary middleware: the isolation
//! policy, the tenant resolver, the query rewriter, the row-filter validator
//! and, when configured, a tenant-scoped connection pool.

use std::sync::Arc;

#[cfg(feature = "sqlite")]
use tessera_isolation::backends::sqlite::TenantPool;
use tessera_isolation::{ConfigError, FilterExpressionValidator, IsolationPolicy, QueryRewriter};

use crate::config::ServerConfig;
use crate::tenant::{NoTenantDirectory, TenantDirectory, TenantResolver};

/// Shared application state.
///
/// # Example
///
/// ```rust
/// use tessera_rest::{AppState, ServerConfig};
///
/// let config = ServerConfig::for_testing();
/// let policy = config.isolation_policy().unwrap();
/// let state = AppState::new(config, policy).unwrap();
/// assert!(state.policy().is_enabled());
/// ```
pub struct AppState {
    /// Server configuration.
    config: Arc<ServerConfig>,

    /// Tenant isolation rules.
    policy: Arc<IsolationPolicy>,

    /// Request tenant resolver.
    resolver: Arc<TenantResolver>,

    /// Statement rewriter sharing `policy`.
    rewriter: Arc<QueryRewriter>,

    /// Row-filter validator.
    validator: Arc<FilterExpressionValidator>,

    /// Tenant-scoped connection pool.
    #[cfg(feature = "sqlite")]
    pool: Option<TenantPool>,
}

// Every field is behind an Arc (or is a cheap handle), so cloning is shallow
impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            policy: Arc::clone(&self.policy),
            resolver: Arc::clone(&self.resolver),
            rewriter: Arc::clone(&self.rewriter),
            validator: Arc::clone(&self.validator),
            #[cfg(feature = "sqlite")]
            pool: self.pool.clone(),
        }
    }
}

impl AppState {
    /// Creates a new AppState from the server configuration and the policy
    /// built from it.
    ///
    /// Subdomain resolution, if enabled, starts with an empty directory; see
    /// [`AppState::with_directory`].
    pub fn new(config: ServerConfig, policy: IsolationPolicy) -> Result<Self, ConfigError> {
        let policy = Arc::new(policy);
        let validator = FilterExpressionValidator::new()?.with_dialect(policy.dialect());

        Ok(Self {
            config: Arc::new(config),
            resolver: Arc::new(TenantResolver::new(&policy, Arc::new(NoTenantDirectory))),
            rewriter: Arc::new(QueryRewriter::new(Arc::clone(&policy))),
            validator: Arc::new(validator),
            policy,
            #[cfg(feature = "sqlite")]
            pool: None,
        })
    }

    /// Replaces the directory used to look up subdomain tenant codes.
    pub fn with_directory(mut self, directory: Arc<dyn TenantDirectory>) -> Self {
        self.resolver = Arc::new(TenantResolver::new(&self.policy, directory));
        self
    }

    /// Attaches a tenant-scoped connection pool.
    #[cfg(feature = "sqlite")]
    pub fn with_pool(mut self, pool: TenantPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Returns a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the isolation policy.
    pub fn policy(&self) -> &Arc<IsolationPolicy> {
        &self.policy
    }

    /// Returns the tenant resolver.
    pub fn resolver(&self) -> &TenantResolver {
        &self.resolver
    }

    /// Returns the query rewriter.
    pub fn rewriter(&self) -> &Arc<QueryRewriter> {
        &self.rewriter
    }

    /// Returns the row-filter validator.
    pub fn validator(&self) -> &FilterExpressionValidator {
        &self.validator
    }

    /// Returns the connection pool, if one is configured.
    #[cfg(feature = "sqlite")]
    pub fn pool(&self) -> Option<&TenantPool> {
        self.pool.as_ref()
    }
}
