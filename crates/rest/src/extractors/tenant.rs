//! Tenant context extractor.
//!
//! Reads the tenant installed by
//! [`tenant_boundary`](crate::middleware::tenant_boundary) out of the request
//! extensions.

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use tessera_isolation::{TenantContext, TenantId};

use crate::error::RestError;
use crate::tenant::{ResolvedTenant, TenantSource};

/// Axum extractor for the request tenant.
///
/// Rejects with `400 Bad Request` when the request did not pass through the
/// tenant boundary (isolation disabled or excluded path). Use
/// `Option<TenantExtractor>` in handlers that serve both cases.
///
/// # Example
///
/// ```rust,ignore
/// use tessera_rest::extractors::TenantExtractor;
///
/// async fn handler(tenant: TenantExtractor) {
///     println!("Tenant ID: {}", tenant.tenant_id());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TenantExtractor {
    context: TenantContext,
    tenant_id: TenantId,
    source: TenantSource,
}

impl TenantExtractor {
    /// Creates an extractor for `tenant_id` taken from `source`.
    pub fn new(tenant_id: TenantId, source: TenantSource) -> Self {
        Self {
            context: TenantContext::with_tenant(tenant_id),
            tenant_id,
            source,
        }
    }

    /// Returns a reference to the tenant context.
    pub fn context(&self) -> &TenantContext {
        &self.context
    }

    /// Returns the tenant ID.
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the source the tenant was resolved from.
    pub fn source(&self) -> TenantSource {
        self.source
    }

    /// Consumes the extractor and returns the tenant context.
    pub fn into_context(self) -> TenantContext {
        self.context
    }

    fn from_extensions(parts: &Parts) -> Option<Self> {
        let context = parts.extensions.get::<TenantContext>()?.clone();
        let resolved = parts.extensions.get::<ResolvedTenant>()?;
        Some(Self {
            tenant_id: context.get().or(resolved.tenant_id)?,
            source: resolved.source.unwrap_or(TenantSource::Default),
            context,
        })
    }
}

impl std::fmt::Display for TenantExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tenant_id)
    }
}

impl<S> FromRequestParts<S> for TenantExtractor
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_extensions(parts).ok_or_else(|| RestError::BadRequest {
            message: "No tenant is bound to this request".to_string(),
        })
    }
}

impl<S> OptionalFromRequestParts<S> for TenantExtractor
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(Self::from_extensions(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn empty_parts() -> Parts {
        Request::builder().uri("/").body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_new() {
        let extractor = TenantExtractor::new(TenantId::new(4).unwrap(), TenantSource::Header);
        assert_eq!(extractor.tenant_id().get(), 4);
        assert_eq!(extractor.source(), TenantSource::Header);
        assert!(extractor.context().has_tenant());
        assert_eq!(extractor.to_string(), "4");
    }

    #[test]
    fn test_from_extensions() {
        let tenant_id = TenantId::new(8).unwrap();
        let mut parts = empty_parts();
        parts.extensions.insert(TenantContext::with_tenant(tenant_id));
        parts.extensions.insert(ResolvedTenant {
            tenant_id: Some(tenant_id),
            source: Some(TenantSource::Identity),
            all_sources: vec![(TenantSource::Identity, tenant_id)],
        });

        let extractor = TenantExtractor::from_extensions(&parts).unwrap();
        assert_eq!(extractor.tenant_id(), tenant_id);
        assert_eq!(extractor.source(), TenantSource::Identity);
    }

    #[test]
    fn test_missing_extensions() {
        assert!(TenantExtractor::from_extensions(&empty_parts()).is_none());
    }

    #[tokio::test]
    async fn test_rejection_without_boundary() {
        let mut parts = empty_parts();
        let result =
            <TenantExtractor as FromRequestParts<()>>::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(RestError::BadRequest { .. })));

        let result =
            <TenantExtractor as OptionalFromRequestParts<()>>::from_request_parts(&mut parts, &())
                .await;
        assert!(matches!(result, Ok(None)));
    }
}
