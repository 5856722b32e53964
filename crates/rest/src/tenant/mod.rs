//! Multi-source tenant resolution.
//!
//! This module derives the tenant of an incoming request from:
//!
//! - **Tenant id header**: `X-Tenant-Id: 42` (name configurable, can be disabled)
//! - **Authenticated identity**: an [`AuthenticatedIdentity`] extension placed
//!   by upstream authentication
//! - **Subdomain**: `acme.tessera.example`, looked up in a [`TenantDirectory`]
//!   (disabled by default)
//! - **Default tenant**: fallback from the isolation policy
//!
//! # Resolution Priority
//!
//! Sources are checked in the order above and the first one that yields a
//! positive integer wins. Values that fail to parse are logged and skipped.
//!
//! When no source matches and the policy requires a tenant, the result is
//! unresolved and the request boundary rejects the request.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tessera_rest::tenant::{NoTenantDirectory, TenantResolver};
//!
//! let resolver = TenantResolver::new(&policy, Arc::new(NoTenantDirectory));
//!
//! // In a middleware:
//! let resolved = resolver.resolve(&parts, &policy);
//! if let (Some(tenant), Some(source)) = (resolved.tenant_id, resolved.source) {
//!     println!("Tenant: {} (from {})", tenant, source);
//! }
//! ```

mod directory;
mod resolver;
mod source;

pub use directory::{NoTenantDirectory, StaticTenantDirectory, TenantDirectory};
pub use resolver::{
    AuthenticatedIdentity, HeaderTenantExtractor, IdentityTenantExtractor, ResolvedTenant,
    SubdomainTenantExtractor, TenantResolver, TenantSourceExtractor,
};
pub use source::TenantSource;
