//! Tenant identifier type.
//!
//! This module defines [`TenantId`], an opaque positive integer identifying a
//! tenant. Zero, negative and absent values all mean "no tenant resolved" and
//! are unrepresentable: callers get `None` (or an error from [`FromStr`]).

use std::fmt;
use std::num::NonZeroI64;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TenantError;

/// An opaque, always-positive tenant identifier.
///
/// The rewriter embeds this value as an integer literal in generated SQL,
/// which is only sound because the type cannot hold anything but a positive
/// `i64`.
///
/// # Examples
///
/// ```
/// use tessera_isolation::tenant::TenantId;
///
/// let tenant = TenantId::new(42).unwrap();
/// assert_eq!(tenant.get(), 42);
///
/// assert!(TenantId::new(0).is_none());
/// assert!(TenantId::new(-7).is_none());
/// assert!("abc".parse::<TenantId>().is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct TenantId(NonZeroI64);

impl TenantId {
    /// Creates a tenant ID, returning `None` unless `id` is positive.
    pub fn new(id: i64) -> Option<Self> {
        if id > 0 {
            NonZeroI64::new(id).map(Self)
        } else {
            None
        }
    }

    /// Returns the raw integer value.
    pub fn get(self) -> i64 {
        self.0.get()
    }

    /// Renders the id as a SQL integer literal.
    pub fn to_sql_literal(self) -> String {
        self.0.get().to_string()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl FromStr for TenantId {
    type Err = TenantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        trimmed
            .parse::<i64>()
            .ok()
            .and_then(TenantId::new)
            .ok_or_else(|| TenantError::InvalidTenantId {
                value: trimmed.to_string(),
            })
    }
}

impl TryFrom<i64> for TenantId {
    type Error = TenantError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        TenantId::new(value).ok_or_else(|| TenantError::InvalidTenantId {
            value: value.to_string(),
        })
    }
}

impl From<TenantId> for i64 {
    fn from(id: TenantId) -> Self {
        id.get()
    }
}
