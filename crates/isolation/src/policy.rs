//! Isolation policy.
//!
//! [`IsolationPolicy`] is the process-wide, immutable rule set consulted by the
//! rewriter and the request boundary. It is built once at startup from an
//! [`IsolationConfig`] (deserialized from JSON and/or assembled from CLI
//! flags) and then shared behind an `Arc`.
//!
//! # Example
//!
//! ```
//! use tessera_isolation::policy::{IsolationConfig, IsolationPolicy};
//!
//! let config: IsolationConfig = serde_json::from_str(r#"{
//!     "enabled": true,
//!     "required": false,
//!     "default_tenant_id": 1,
//!     "excluded_tables": ["audit_log"],
//!     "excluded_paths": ["/health", "/api/public/**"]
//! }"#).unwrap();
//!
//! let policy = IsolationPolicy::from_config(config).unwrap();
//! assert!(policy.is_excluded_table("`ops`.`AUDIT_LOG`"));
//! assert!(policy.is_excluded_table("s2_tenant")); // built-in safety net
//! assert!(policy.is_excluded_path("/api/public/docs"));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dialect::SqlDialect;
use crate::error::ConfigError;
use crate::tenant::TenantId;

/// Tables that never carry a tenant column.
///
/// This list is consulted before the configured exclusions on every lookup,
/// so these tables stay unscoped even if the configuration omits them.
pub const BUILTIN_EXCLUDED_TABLES: &[&str] = &[
    "s2_tenant",
    "s2_subscription_plan",
    "s2_permission",
    "s2_role_permission",
    "s2_user_role",
];

/// Default tenant column name.
pub const DEFAULT_TENANT_COLUMN: &str = "tenant_id";

/// Default header carrying the tenant id.
pub const DEFAULT_TENANT_ID_HEADER: &str = "X-Tenant-Id";

/// A table name normalized for exclusion lookups.
///
/// Quoting characters are stripped, the schema prefix is removed and the
/// result is lower-cased, so `` `Schema`.`S2_Tenant` `` and `s2_tenant`
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedTableName(String);

impl NormalizedTableName {
    /// Normalizes a table reference as written in SQL.
    pub fn new(raw: &str) -> Self {
        let unquoted: String = raw
            .chars()
            .filter(|c| !matches!(c, '`' | '"' | '\'' | '[' | ']'))
            .collect();
        let unquoted = unquoted.trim();
        let bare = match unquoted.rfind('.') {
            Some(idx) => &unquoted[idx + 1..],
            None => unquoted,
        };
        Self(bare.trim().to_ascii_lowercase())
    }

    /// Returns the normalized name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request-path pattern exempt from tenant resolution.
///
/// A trailing `/**` makes the pattern a prefix match; anything else must
/// match exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// The path must equal this string.
    Exact(String),
    /// The path must start with this prefix.
    Prefix(String),
}

impl PathPattern {
    /// Parses a pattern such as `/health` or `/api/public/**`.
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let pattern = pattern.trim();
        if !pattern.starts_with('/') {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "path patterns must start with '/'".to_string(),
            });
        }
        if let Some(prefix) = pattern.strip_suffix("/**") {
            if prefix.contains('*') {
                return Err(ConfigError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: "only a trailing '/**' wildcard is supported".to_string(),
                });
            }
            return Ok(PathPattern::Prefix(prefix.to_string()));
        }
        if pattern.contains('*') {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "only a trailing '/**' wildcard is supported".to_string(),
            });
        }
        Ok(PathPattern::Exact(pattern.to_string()))
    }

    /// Returns `true` if `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(exact) => path == exact,
            PathPattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Exact(exact) => f.write_str(exact),
            PathPattern::Prefix(prefix) => write!(f, "{prefix}/**"),
        }
    }
}

/// What the rewriter does with a statement it cannot parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailureMode {
    /// Log a warning and execute the statement unscoped.
    #[default]
    FailOpen,
    /// Refuse the statement with [`RewriteError::Unparseable`](crate::error::RewriteError).
    FailClosed,
}

/// External configuration for the isolation layer.
///
/// All fields have defaults, so a partial JSON document is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    /// Whether statements are tenant-scoped at all.
    pub enabled: bool,

    /// Whether requests without a resolvable tenant are rejected.
    pub required: bool,

    /// Tenant used when none is resolved and `required` is false.
    pub default_tenant_id: i64,

    /// Header carrying the tenant id.
    pub tenant_id_header: String,

    /// Whether header-based resolution is enabled.
    pub header_enabled: bool,

    /// Whether subdomain-based resolution is enabled.
    pub subdomain_enabled: bool,

    /// Column holding the tenant id on scoped tables.
    pub tenant_column: String,

    /// Tables without a tenant column.
    pub excluded_tables: Vec<String>,

    /// Request paths that bypass tenant resolution.
    pub excluded_paths: Vec<String>,

    /// Dialect used to parse statements.
    pub dialect: SqlDialect,

    /// Behavior on unparseable statements.
    pub on_parse_failure: ParseFailureMode,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            required: true,
            default_tenant_id: 1,
            tenant_id_header: DEFAULT_TENANT_ID_HEADER.to_string(),
            header_enabled: true,
            subdomain_enabled: false,
            tenant_column: DEFAULT_TENANT_COLUMN.to_string(),
            excluded_tables: BUILTIN_EXCLUDED_TABLES
                .iter()
                .map(|t| t.to_string())
                .collect(),
            excluded_paths: [
                "/api/auth/user/login",
                "/api/auth/user/register",
                "/api/auth/oauth/**",
                "/api/auth/token/**",
                "/api/auth/admin/**",
                "/api/public/**",
                "/health",
                "/actuator/**",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            dialect: SqlDialect::default(),
            on_parse_failure: ParseFailureMode::default(),
        }
    }
}

impl IsolationConfig {
    /// Reads a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Parses a JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Immutable tenant-isolation rules, loaded once at startup.
#[derive(Debug, Clone)]
pub struct IsolationPolicy {
    enabled: bool,
    required: bool,
    default_tenant_id: TenantId,
    tenant_id_header: String,
    header_enabled: bool,
    subdomain_enabled: bool,
    tenant_column: String,
    excluded_tables: HashSet<NormalizedTableName>,
    excluded_paths: Vec<PathPattern>,
    dialect: SqlDialect,
    on_parse_failure: ParseFailureMode,
}

impl IsolationPolicy {
    /// Builds a policy from configuration, validating every field.
    pub fn from_config(config: IsolationConfig) -> Result<Self, ConfigError> {
        let default_tenant_id =
            TenantId::new(config.default_tenant_id).ok_or(ConfigError::InvalidDefaultTenant {
                value: config.default_tenant_id,
            })?;

        if !is_plain_identifier(&config.tenant_column) {
            return Err(ConfigError::InvalidTenantColumn {
                column: config.tenant_column,
            });
        }

        let header = config.tenant_id_header.trim();
        if header.is_empty()
            || !header
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::InvalidHeaderName {
                header: config.tenant_id_header,
            });
        }

        let excluded_paths = config
            .excluded_paths
            .iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| PathPattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;

        let excluded_tables = config
            .excluded_tables
            .iter()
            .map(|t| NormalizedTableName::new(t))
            .filter(|t| !t.as_str().is_empty())
            .collect();

        Ok(Self {
            enabled: config.enabled,
            required: config.required,
            default_tenant_id,
            tenant_id_header: header.to_string(),
            header_enabled: config.header_enabled,
            subdomain_enabled: config.subdomain_enabled,
            tenant_column: config.tenant_column,
            excluded_tables,
            excluded_paths,
            dialect: config.dialect,
            on_parse_failure: config.on_parse_failure,
        })
    }

    /// A policy with scoping enabled and every other setting at its default.
    pub fn enabled() -> Self {
        Self::from_config(IsolationConfig {
            enabled: true,
            ..Default::default()
        })
        .unwrap_or_else(|_| unreachable!("default isolation config is valid"))
    }

    /// Returns a copy with the given dialect.
    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Returns a copy with the given parse-failure behavior.
    pub fn with_parse_failure_mode(mut self, mode: ParseFailureMode) -> Self {
        self.on_parse_failure = mode;
        self
    }

    /// Returns a copy with additional excluded tables.
    pub fn with_excluded_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_tables
            .extend(tables.into_iter().map(|t| NormalizedTableName::new(t.as_ref())));
        self
    }

    /// Whether statements are tenant-scoped.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether unresolved requests are rejected.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The fallback tenant.
    pub fn default_tenant_id(&self) -> TenantId {
        self.default_tenant_id
    }

    /// The tenant id header name.
    pub fn tenant_id_header(&self) -> &str {
        &self.tenant_id_header
    }

    /// Whether header resolution is enabled.
    pub fn header_enabled(&self) -> bool {
        self.header_enabled
    }

    /// Whether subdomain resolution is enabled.
    pub fn subdomain_enabled(&self) -> bool {
        self.subdomain_enabled
    }

    /// The tenant column name.
    pub fn tenant_column(&self) -> &str {
        &self.tenant_column
    }

    /// The parsing dialect.
    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// The parse-failure behavior.
    pub fn on_parse_failure(&self) -> ParseFailureMode {
        self.on_parse_failure
    }

    /// The configured excluded path patterns.
    pub fn excluded_paths(&self) -> &[PathPattern] {
        &self.excluded_paths
    }

    /// Returns `true` if `table` must not receive a tenant predicate.
    ///
    /// The built-in safety net is checked first, then the configured set.
    pub fn is_excluded_table(&self, table: &str) -> bool {
        let name = NormalizedTableName::new(table);
        is_builtin_excluded(&name) || self.excluded_tables.contains(&name)
    }

    /// Returns `true` if `path` bypasses tenant resolution.
    pub fn is_excluded_path(&self, path: &str) -> bool {
        self.excluded_paths.iter().any(|p| p.matches(path))
    }
}

impl Default for IsolationPolicy {
    fn default() -> Self {
        Self::from_config(IsolationConfig::default())
            .unwrap_or_else(|_| unreachable!("default isolation config is valid"))
    }
}

/// Returns `true` if the table is in [`BUILTIN_EXCLUDED_TABLES`].
pub fn is_builtin_excluded(name: &NormalizedTableName) -> bool {
    BUILTIN_EXCLUDED_TABLES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(name.as_str()))
}

fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_table_name() {
        assert_eq!(NormalizedTableName::new("s2_tenant").as_str(), "s2_tenant");
        assert_eq!(
            NormalizedTableName::new("`Schema`.`S2_Tenant`").as_str(),
            "s2_tenant"
        );
        assert_eq!(
            NormalizedTableName::new("\"public\".\"Orders\"").as_str(),
            "orders"
        );
        assert_eq!(NormalizedTableName::new(" [dbo].[Users] ").as_str(), "users");
        assert_eq!(
            NormalizedTableName::new("`Schema`.`S2_Tenant`"),
            NormalizedTableName::new("s2_tenant")
        );
    }

    #[test]
    fn test_path_pattern_parse() {
        assert_eq!(
            PathPattern::parse("/health").unwrap(),
            PathPattern::Exact("/health".to_string())
        );
        assert_eq!(
            PathPattern::parse("/api/public/**").unwrap(),
            PathPattern::Prefix("/api/public".to_string())
        );
        assert!(PathPattern::parse("health").is_err());
        assert!(PathPattern::parse("/api/*/x").is_err());
    }

    #[test]
    fn test_path_pattern_matches() {
        let exact = PathPattern::parse("/health").unwrap();
        assert!(exact.matches("/health"));
        assert!(!exact.matches("/health/live"));

        let prefix = PathPattern::parse("/api/auth/oauth/**").unwrap();
        assert!(prefix.matches("/api/auth/oauth/callback"));
        assert!(prefix.matches("/api/auth/oauth"));
        assert!(!prefix.matches("/api/auth/user"));
    }

    #[test]
    fn test_path_pattern_display() {
        assert_eq!(
            PathPattern::parse("/actuator/**").unwrap().to_string(),
            "/actuator/**"
        );
    }

    #[test]
    fn test_default_config_values() {
        let config = IsolationConfig::default();
        assert!(!config.enabled);
        assert!(config.required);
        assert_eq!(config.default_tenant_id, 1);
        assert_eq!(config.tenant_id_header, "X-Tenant-Id");
        assert_eq!(config.tenant_column, "tenant_id");
        assert!(config.excluded_paths.contains(&"/health".to_string()));
    }

    #[test]
    fn test_partial_json_config() {
        let config = IsolationConfig::from_json_str(
            r#"{ "enabled": true, "excluded_tables": ["audit_log"], "on_parse_failure": "fail_closed" }"#,
        )
        .unwrap();
        assert!(config.enabled);
        assert!(config.required);
        assert_eq!(config.excluded_tables, vec!["audit_log".to_string()]);
        assert_eq!(config.on_parse_failure, ParseFailureMode::FailClosed);
        assert_eq!(config.dialect, SqlDialect::MySql);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("isolation.json");
        std::fs::write(&path, r#"{ "enabled": true, "default_tenant_id": 9 }"#).unwrap();

        let config = IsolationConfig::from_json_file(&path).unwrap();
        let policy = IsolationPolicy::from_config(config).unwrap();
        assert!(policy.is_enabled());
        assert_eq!(policy.default_tenant_id().get(), 9);
    }

    #[test]
    fn test_from_json_file_missing() {
        let result = IsolationConfig::from_json_file("/definitely/not/here.json");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_builtin_exclusions_always_apply() {
        let policy = IsolationPolicy::from_config(IsolationConfig {
            excluded_tables: vec![],
            ..Default::default()
        })
        .unwrap();
        assert!(policy.is_excluded_table("s2_tenant"));
        assert!(policy.is_excluded_table("`main`.`S2_USER_ROLE`"));
        assert!(!policy.is_excluded_table("orders"));
    }

    #[test]
    fn test_configured_exclusions_case_insensitive() {
        let policy = IsolationPolicy::enabled().with_excluded_tables(["Audit_Log"]);
        assert!(policy.is_excluded_table("audit_log"));
        assert!(policy.is_excluded_table("`ops`.`AUDIT_LOG`"));
        assert!(!policy.is_excluded_table("audit_log_archive"));
    }

    #[test]
    fn test_rejects_non_positive_default_tenant() {
        let result = IsolationPolicy::from_config(IsolationConfig {
            default_tenant_id: 0,
            ..Default::default()
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidDefaultTenant { value: 0 })
        ));
    }

    #[test]
    fn test_rejects_invalid_tenant_column() {
        let result = IsolationPolicy::from_config(IsolationConfig {
            tenant_column: "tenant_id; DROP".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ConfigError::InvalidTenantColumn { .. })));
    }

    #[test]
    fn test_rejects_invalid_header() {
        let result = IsolationPolicy::from_config(IsolationConfig {
            tenant_id_header: "X Tenant".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ConfigError::InvalidHeaderName { .. })));
    }

    #[test]
    fn test_excluded_paths() {
        let policy = IsolationPolicy::default();
        assert!(policy.is_excluded_path("/health"));
        assert!(policy.is_excluded_path("/api/auth/admin/tenants"));
        assert!(!policy.is_excluded_path("/api/semantic/query"));
    }
}
