//! Tenant code lookup for subdomain resolution.

use std::collections::HashMap;

use parking_lot::RwLock;
use tessera_isolation::TenantId;

/// Maps the tenant code found in a request subdomain to a tenant id.
///
/// Implementations are consulted on every request that reaches the
/// subdomain extractor, so lookups should be cheap.
pub trait TenantDirectory: Send + Sync {
    /// Returns the tenant registered under `code`, if any.
    fn lookup_code(&self, code: &str) -> Option<TenantId>;
}

/// A directory that knows no tenants.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTenantDirectory;

impl TenantDirectory for NoTenantDirectory {
    fn lookup_code(&self, _code: &str) -> Option<TenantId> {
        None
    }
}

/// An in-memory directory with case-insensitive codes.
#[derive(Debug, Default)]
pub struct StaticTenantDirectory {
    codes: RwLock<HashMap<String, TenantId>>,
}

impl StaticTenantDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `code` for `tenant_id`, replacing any previous entry.
    pub fn insert(&self, code: &str, tenant_id: TenantId) {
        self.codes
            .write()
            .insert(code.trim().to_ascii_lowercase(), tenant_id);
    }

    /// Removes `code`, returning the tenant it pointed to.
    pub fn remove(&self, code: &str) -> Option<TenantId> {
        self.codes.write().remove(&code.trim().to_ascii_lowercase())
    }

    /// Number of registered codes.
    pub fn len(&self) -> usize {
        self.codes.read().len()
    }

    /// Returns true if no code is registered.
    pub fn is_empty(&self) -> bool {
        self.codes.read().is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, TenantId)> for StaticTenantDirectory {
    fn from_iter<I: IntoIterator<Item = (S, TenantId)>>(iter: I) -> Self {
        let directory = Self::new();
        for (code, tenant_id) in iter {
            directory.insert(code.as_ref(), tenant_id);
        }
        directory
    }
}

impl TenantDirectory for StaticTenantDirectory {
    fn lookup_code(&self, code: &str) -> Option<TenantId> {
        self.codes
            .read()
            .get(&code.trim().to_ascii_lowercase())
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(id: i64) -> TenantId {
        TenantId::new(id).unwrap()
    }

    #[test]
    fn test_no_directory_always_misses() {
        assert_eq!(NoTenantDirectory.lookup_code("acme"), None);
    }

    #[test]
    fn test_static_lookup_ignores_case() {
        let directory: StaticTenantDirectory = [("Acme", tenant(3))].into_iter().collect();
        assert_eq!(directory.lookup_code("acme"), Some(tenant(3)));
        assert_eq!(directory.lookup_code("ACME"), Some(tenant(3)));
        assert_eq!(directory.lookup_code("globex"), None);
    }

    #[test]
    fn test_insert_replaces_and_remove() {
        let directory = StaticTenantDirectory::new();
        directory.insert("acme", tenant(1));
        directory.insert("ACME", tenant(2));
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.lookup_code("acme"), Some(tenant(2)));

        assert_eq!(directory.remove("Acme"), Some(tenant(2)));
        assert!(directory.is_empty());
    }
}
