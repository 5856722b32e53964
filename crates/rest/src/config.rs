//! Server configuration for the Tessera request boundary.
//!
//! This module provides configuration types for the server, supporting both
//! programmatic configuration and environment variable overrides. Tenant
//! isolation settings come from an optional JSON file and can be overridden
//! field by field from the command line or environment.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TESSERA_SERVER_PORT` | 8080 | Server port |
//! | `TESSERA_SERVER_HOST` | 127.0.0.1 | Host to bind |
//! | `TESSERA_LOG_LEVEL` | info | Log level |
//! | `TESSERA_REQUEST_TIMEOUT` | 30 | Request timeout (seconds) |
//! | `TESSERA_ENABLE_CORS` | true | Enable CORS |
//! | `TESSERA_CORS_ORIGINS` | * | Allowed origins |
//! | `TESSERA_CORS_METHODS` | GET,POST,PUT,PATCH,DELETE,OPTIONS | Allowed methods |
//! | `TESSERA_CORS_HEADERS` | Content-Type,Authorization,Accept,X-Tenant-Id | Allowed headers |
//! | `TESSERA_ENABLE_REQUEST_ID` | true | Tag requests with x-request-id |
//! | `TESSERA_ISOLATION_CONFIG` | - | Isolation config file (JSON) |
//! | `TESSERA_TENANT_ENABLED` | file / false | Scope statements by tenant |
//! | `TESSERA_TENANT_REQUIRED` | file / true | Reject requests without a tenant |
//! | `TESSERA_DEFAULT_TENANT_ID` | file / 1 | Tenant for unresolved requests |
//! | `TESSERA_TENANT_ID_HEADER` | file / X-Tenant-Id | Tenant id header |
//! | `TESSERA_SUBDOMAIN_ENABLED` | file / false | Resolve tenants from subdomains |
//! | `TESSERA_SQL_DIALECT` | file / mysql | Dialect for statement parsing |
//! | `TESSERA_EXCLUDED_TABLES` | file / built-in list | Tenant-less tables (comma-separated) |
//! | `TESSERA_EXCLUDED_PATHS` | file / built-in list | Unscoped request paths (comma-separated) |
//! | `TESSERA_DATABASE_URL` | - | SQLite database path |
//!
//! # Example
//!
//! ```rust
//! use tessera_rest::ServerConfig;
//!
//! let config = ServerConfig {
//!     port: 3000,
//!     tenant_enabled: Some(true),
//!     default_tenant_id: Some(7),
//!     ..Default::default()
//! };
//! let policy = config.isolation_policy().unwrap();
//! assert!(policy.is_enabled());
//! assert_eq!(policy.default_tenant_id().get(), 7);
//! ```

use std::path::PathBuf;

use clap::Parser;
use tessera_isolation::{ConfigError, IsolationConfig, IsolationPolicy, SqlDialect};

/// Server configuration.
///
/// This struct can be constructed from environment variables using [`ServerConfig::from_env`],
/// from command line arguments using [`ServerConfig::parse`], or programmatically.
#[derive(Debug, Clone, Parser)]
#[command(name = "tessera")]
#[command(about = "Tenant isolation boundary for shared-schema SQL databases")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "TESSERA_SERVER_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "TESSERA_SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "TESSERA_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Request timeout in seconds.
    #[arg(long, env = "TESSERA_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Enable CORS.
    #[arg(long, env = "TESSERA_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "TESSERA_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Allowed CORS methods (comma-separated, or * for all).
    #[arg(
        long,
        env = "TESSERA_CORS_METHODS",
        default_value = "GET,POST,PUT,PATCH,DELETE,OPTIONS"
    )]
    pub cors_methods: String,

    /// Allowed CORS headers (comma-separated, or * for all).
    #[arg(
        long,
        env = "TESSERA_CORS_HEADERS",
        default_value = "Content-Type,Authorization,Accept,X-Tenant-Id"
    )]
    pub cors_headers: String,

    /// Enable request ID tracking.
    #[arg(long, env = "TESSERA_ENABLE_REQUEST_ID", default_value = "true")]
    pub enable_request_id: bool,

    /// Isolation configuration file (JSON). Flags below override its fields.
    #[arg(long, env = "TESSERA_ISOLATION_CONFIG")]
    pub isolation_config: Option<PathBuf>,

    /// Scope statements to the request tenant.
    #[arg(long, env = "TESSERA_TENANT_ENABLED")]
    pub tenant_enabled: Option<bool>,

    /// Reject requests whose tenant cannot be resolved.
    #[arg(long, env = "TESSERA_TENANT_REQUIRED")]
    pub tenant_required: Option<bool>,

    /// Tenant used for unresolved requests when a tenant is not required.
    #[arg(long, env = "TESSERA_DEFAULT_TENANT_ID")]
    pub default_tenant_id: Option<i64>,

    /// Header carrying the tenant id.
    #[arg(long, env = "TESSERA_TENANT_ID_HEADER")]
    pub tenant_id_header: Option<String>,

    /// Resolve tenants from the first label of the request host.
    #[arg(long, env = "TESSERA_SUBDOMAIN_ENABLED")]
    pub subdomain_enabled: Option<bool>,

    /// SQL dialect used to parse statements (generic, mysql, postgres, sqlite).
    #[arg(long, env = "TESSERA_SQL_DIALECT")]
    pub sql_dialect: Option<SqlDialect>,

    /// Tables without a tenant column (comma-separated).
    #[arg(long, env = "TESSERA_EXCLUDED_TABLES", value_delimiter = ',')]
    pub excluded_tables: Option<Vec<String>>,

    /// Request paths that bypass tenant resolution (comma-separated, `/**` suffix for prefixes).
    #[arg(long, env = "TESSERA_EXCLUDED_PATHS", value_delimiter = ',')]
    pub excluded_paths: Option<Vec<String>>,

    /// SQLite database path for tenant-scoped connections.
    #[arg(long, env = "TESSERA_DATABASE_URL")]
    pub database_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            request_timeout: 30,
            enable_cors: true,
            cors_origins: "*".to_string(),
            cors_methods: "GET,POST,PUT,PATCH,DELETE,OPTIONS".to_string(),
            cors_headers: "Content-Type,Authorization,Accept,X-Tenant-Id".to_string(),
            enable_request_id: true,
            isolation_config: None,
            tenant_enabled: None,
            tenant_required: None,
            default_tenant_id: None,
            tenant_id_header: None,
            subdomain_enabled: None,
            sql_dialect: None,
            excluded_tables: None,
            excluded_paths: None,
            database_url: None,
        }
    }
}

impl ServerConfig {
    /// Creates a new ServerConfig from environment variables.
    ///
    /// This is a convenience method that parses environment variables without
    /// requiring command line arguments.
    pub fn from_env() -> Self {
        // Try to parse from environment, falling back to defaults
        Self::try_parse().unwrap_or_default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Loads the isolation configuration file, if any, and applies the
    /// overrides set on this config.
    pub fn isolation(&self) -> Result<IsolationConfig, ConfigError> {
        let mut config = match &self.isolation_config {
            Some(path) => IsolationConfig::from_json_file(path)?,
            None => IsolationConfig::default(),
        };

        if let Some(enabled) = self.tenant_enabled {
            config.enabled = enabled;
        }
        if let Some(required) = self.tenant_required {
            config.required = required;
        }
        if let Some(id) = self.default_tenant_id {
            config.default_tenant_id = id;
        }
        if let Some(header) = &self.tenant_id_header {
            config.tenant_id_header = header.clone();
        }
        if let Some(subdomain) = self.subdomain_enabled {
            config.subdomain_enabled = subdomain;
        }
        if let Some(dialect) = self.sql_dialect {
            config.dialect = dialect;
        }
        if let Some(tables) = &self.excluded_tables {
            config.excluded_tables = trimmed(tables);
        }
        if let Some(paths) = &self.excluded_paths {
            config.excluded_paths = trimmed(paths);
        }

        Ok(config)
    }

    /// Builds the isolation policy from [`ServerConfig::isolation`].
    pub fn isolation_policy(&self) -> Result<IsolationPolicy, ConfigError> {
        IsolationPolicy::from_config(self.isolation()?)
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if let Some(id) = self.default_tenant_id {
            if id <= 0 {
                errors.push("Default tenant id must be a positive integer".to_string());
            }
        }

        if let Some(path) = &self.isolation_config {
            if !path.is_file() {
                errors.push(format!(
                    "Isolation config file not found: {}",
                    path.display()
                ));
            }
        }

        if errors.is_empty() {
            if let Err(e) = self.isolation_policy() {
                errors.push(e.to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    ///
    /// This uses ephemeral port 0, enables tenant scoping and disables
    /// features that might interfere with tests.
    pub fn for_testing() -> Self {
        Self {
            port: 0, // Let OS assign port
            log_level: "debug".to_string(),
            request_timeout: 5, // Shorter timeout for tests
            enable_cors: false,
            cors_methods: "*".to_string(),
            cors_headers: "*".to_string(),
            enable_request_id: false,
            tenant_enabled: Some(true),
            ..Default::default()
        }
    }
}

fn trimmed(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}
