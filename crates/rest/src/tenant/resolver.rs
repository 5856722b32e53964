//! Tenant resolution from multiple sources.
//!
//! Provides the [`TenantResolver`] which derives the tenant of a request from
//! the configured sources, first match wins.

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::header::HOST;
use axum::http::request::Parts;
use tessera_isolation::{IsolationPolicy, TenantId};

use super::directory::{NoTenantDirectory, TenantDirectory};
use super::source::TenantSource;

/// The authenticated caller, placed into request extensions by upstream
/// authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    /// Subject (user name or id) of the caller.
    pub subject: String,
    /// Raw tenant id carried by the credentials, if any.
    pub tenant_id: Option<i64>,
}

impl AuthenticatedIdentity {
    /// Creates an identity bound to `tenant_id`.
    pub fn new(subject: impl Into<String>, tenant_id: i64) -> Self {
        Self {
            subject: subject.into(),
            tenant_id: Some(tenant_id),
        }
    }
}

/// Result of resolving a tenant from a request.
#[derive(Debug, Clone)]
pub struct ResolvedTenant {
    /// The resolved tenant ID, `None` when no source matched and a tenant is
    /// required.
    pub tenant_id: Option<TenantId>,
    /// The source the tenant was taken from.
    pub source: Option<TenantSource>,
    /// All sources that provided a tenant ID, in priority order.
    pub all_sources: Vec<(TenantSource, TenantId)>,
}

impl ResolvedTenant {
    /// Returns true if a tenant was resolved.
    pub fn is_resolved(&self) -> bool {
        self.tenant_id.is_some()
    }

    /// Returns true if the tenant was the default fallback.
    pub fn is_default(&self) -> bool {
        self.source.is_some_and(|s| s.is_default())
    }

    /// Returns true if two sources named different tenants.
    pub fn has_conflict(&self) -> bool {
        self.all_sources
            .first()
            .is_some_and(|(_, first)| self.all_sources.iter().any(|(_, t)| t != first))
    }
}

/// Trait for extracting tenant information from a specific source.
pub trait TenantSourceExtractor: Send + Sync {
    /// Attempts to extract a tenant ID from the request.
    fn extract(&self, parts: &Parts, policy: &IsolationPolicy) -> Option<TenantId>;

    /// Returns the source type this extractor handles.
    fn source_type(&self) -> TenantSource;
}

/// Extracts the tenant from the configured tenant id header.
#[derive(Debug, Default)]
pub struct HeaderTenantExtractor;

impl TenantSourceExtractor for HeaderTenantExtractor {
    fn extract(&self, parts: &Parts, policy: &IsolationPolicy) -> Option<TenantId> {
        let raw = parts
            .headers
            .get(policy.tenant_id_header())?
            .to_str()
            .ok()?
            .trim();
        if raw.is_empty() {
            return None;
        }

        match raw.parse::<TenantId>() {
            Ok(tenant_id) => Some(tenant_id),
            Err(e) => {
                tracing::warn!(
                    header = policy.tenant_id_header(),
                    value = raw,
                    error = %e,
                    "Ignoring invalid tenant id header"
                );
                None
            }
        }
    }

    fn source_type(&self) -> TenantSource {
        TenantSource::Header
    }
}

/// Extracts the tenant from an [`AuthenticatedIdentity`] extension.
#[derive(Debug, Default)]
pub struct IdentityTenantExtractor;

impl TenantSourceExtractor for IdentityTenantExtractor {
    fn extract(&self, parts: &Parts, _policy: &IsolationPolicy) -> Option<TenantId> {
        let identity = parts.extensions.get::<AuthenticatedIdentity>()?;
        let tenant_id = identity.tenant_id.and_then(TenantId::new);
        if tenant_id.is_none() {
            tracing::warn!(
                subject = %identity.subject,
                tenant_id = ?identity.tenant_id,
                "Authenticated identity has no valid tenant id"
            );
        }
        tenant_id
    }

    fn source_type(&self) -> TenantSource {
        TenantSource::Identity
    }
}

/// Extracts a tenant code from the first label of the request host
/// (`{code}.example.com`) and looks it up in a [`TenantDirectory`].
pub struct SubdomainTenantExtractor {
    directory: Arc<dyn TenantDirectory>,
}

impl SubdomainTenantExtractor {
    /// Creates an extractor backed by `directory`.
    pub fn new(directory: Arc<dyn TenantDirectory>) -> Self {
        Self { directory }
    }
}

impl std::fmt::Debug for SubdomainTenantExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubdomainTenantExtractor").finish_non_exhaustive()
    }
}

impl TenantSourceExtractor for SubdomainTenantExtractor {
    fn extract(&self, parts: &Parts, _policy: &IsolationPolicy) -> Option<TenantId> {
        let host = request_host(parts)?;
        let code = subdomain_code(host)?;
        tracing::debug!(code, "Extracted tenant code from subdomain");

        let tenant_id = self.directory.lookup_code(code);
        if tenant_id.is_none() {
            tracing::debug!(code, "Unknown tenant code");
        }
        tenant_id
    }

    fn source_type(&self) -> TenantSource {
        TenantSource::Subdomain
    }
}

/// Returns the host of the request without its port.
fn request_host(parts: &Parts) -> Option<&str> {
    let host = parts
        .headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.host())?;

    // Bracketed IPv6 literal
    if host.starts_with('[') {
        return None;
    }
    Some(host.split(':').next().unwrap_or(host))
}

/// Returns the first host label when the host has more than two labels.
fn subdomain_code(host: &str) -> Option<&str> {
    if host.parse::<IpAddr>().is_ok() {
        return None;
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return None;
    }
    labels.first().copied().filter(|code| !code.is_empty())
}

/// Resolves tenant information from multiple sources.
pub struct TenantResolver {
    extractors: Vec<Box<dyn TenantSourceExtractor>>,
}

impl std::fmt::Debug for TenantResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources: Vec<TenantSource> = self.extractors.iter().map(|e| e.source_type()).collect();
        f.debug_struct("TenantResolver")
            .field("sources", &sources)
            .finish()
    }
}

impl TenantResolver {
    /// Creates a resolver for the sources the policy enables.
    ///
    /// `directory` is only consulted when subdomain resolution is enabled.
    pub fn new(policy: &IsolationPolicy, directory: Arc<dyn TenantDirectory>) -> Self {
        let mut extractors: Vec<Box<dyn TenantSourceExtractor>> = Vec::new();

        // Priority order
        if policy.header_enabled() {
            extractors.push(Box::new(HeaderTenantExtractor));
        }
        extractors.push(Box::new(IdentityTenantExtractor));
        if policy.subdomain_enabled() {
            extractors.push(Box::new(SubdomainTenantExtractor::new(directory)));
        }

        Self { extractors }
    }

    /// Creates a resolver from an explicit list of extractors, checked in order.
    pub fn with_extractors(extractors: Vec<Box<dyn TenantSourceExtractor>>) -> Self {
        Self { extractors }
    }

    /// Returns the sources this resolver checks, in order.
    pub fn sources(&self) -> Vec<TenantSource> {
        self.extractors.iter().map(|e| e.source_type()).collect()
    }

    /// Resolves the tenant from the request.
    ///
    /// When no source matches, the policy's default tenant is used unless the
    /// policy requires a tenant, in which case the result is unresolved.
    pub fn resolve(&self, parts: &Parts, policy: &IsolationPolicy) -> ResolvedTenant {
        let mut all_sources = Vec::new();

        for extractor in &self.extractors {
            if let Some(tenant_id) = extractor.extract(parts, policy) {
                all_sources.push((extractor.source_type(), tenant_id));
            }
        }

        if let Some((source, tenant_id)) = all_sources.first().copied() {
            ResolvedTenant {
                tenant_id: Some(tenant_id),
                source: Some(source),
                all_sources,
            }
        } else if policy.is_required() {
            ResolvedTenant {
                tenant_id: None,
                source: None,
                all_sources,
            }
        } else {
            ResolvedTenant {
                tenant_id: Some(policy.default_tenant_id()),
                source: Some(TenantSource::Default),
                all_sources,
            }
        }
    }
}

impl Default for TenantResolver {
    fn default() -> Self {
        Self::new(&IsolationPolicy::default(), Arc::new(NoTenantDirectory))
    }
}
