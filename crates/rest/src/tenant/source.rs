//! Tenant source identification.

use std::fmt;

use serde::Serialize;

/// Source from which the tenant of a request was taken.
///
/// Sources are listed in priority order (highest to lowest):
/// 1. Tenant id header (`X-Tenant-Id` by default)
/// 2. Authenticated identity placed by upstream authentication
/// 3. First label of the request host
/// 4. Default tenant from the isolation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantSource {
    /// Tenant id header (highest priority).
    Header,
    /// Tenant id carried by the authenticated identity.
    Identity,
    /// Tenant code taken from the request subdomain.
    Subdomain,
    /// Default tenant from the policy (lowest priority).
    Default,
}

impl TenantSource {
    /// Returns the priority of this source (higher = more authoritative).
    pub fn priority(&self) -> u8 {
        match self {
            TenantSource::Header => 4,
            TenantSource::Identity => 3,
            TenantSource::Subdomain => 2,
            TenantSource::Default => 1,
        }
    }

    /// Returns true if this source is the default fallback.
    pub fn is_default(&self) -> bool {
        matches!(self, TenantSource::Default)
    }
}

impl fmt::Display for TenantSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantSource::Header => write!(f, "header"),
            TenantSource::Identity => write!(f, "identity"),
            TenantSource::Subdomain => write!(f, "subdomain"),
            TenantSource::Default => write!(f, "default"),
        }
    }
}

impl Ord for TenantSource {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority().cmp(&other.priority())
    }
}

impl PartialOrd for TenantSource {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
