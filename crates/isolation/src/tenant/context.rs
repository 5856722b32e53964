//! Request-scoped tenant context.
//!
//! This module defines [`TenantContext`], the holder of the active tenant for
//! one execution unit (an HTTP request, a job, a transaction). The host sets it
//! once at the request boundary and the query rewriter reads it for every
//! statement issued while the request is in flight.
//!
//! Execution units are pooled, so the context must be cleared on every exit
//! path. [`TenantContext::release_on_drop`] and [`TenantContext::scope`] tie
//! the clear to `Drop`, which runs on normal completion, early return,
//! unwinding panics and future cancellation alike.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use super::id::TenantId;

tokio::task_local! {
    static CURRENT_TENANT: TenantContext;
}

/// The active tenant for one execution unit.
///
/// `TenantContext` is a cheap, clonable handle: clones share the same slot, so
/// the request boundary and the handlers it calls observe the same value.
/// Distinct requests must use distinct contexts.
///
/// # Examples
///
/// ```
/// use tessera_isolation::tenant::{TenantContext, TenantId};
///
/// let ctx = TenantContext::new();
/// assert_eq!(ctx.get(), None);
///
/// ctx.set(TenantId::new(7).unwrap());
/// assert_eq!(ctx.get().map(TenantId::get), Some(7));
///
/// ctx.clear();
/// assert!(!ctx.has_tenant());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TenantContext {
    slot: Arc<RwLock<Option<TenantId>>>,
}

impl TenantContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context already holding `tenant_id`.
    pub fn with_tenant(tenant_id: TenantId) -> Self {
        let ctx = Self::new();
        ctx.set(tenant_id);
        ctx
    }

    /// Stores the tenant for this execution unit. Last write wins.
    pub fn set(&self, tenant_id: TenantId) {
        *self.slot.write() = Some(tenant_id);
    }

    /// Returns the stored tenant, if any.
    pub fn get(&self) -> Option<TenantId> {
        *self.slot.read()
    }

    /// Returns the stored tenant, or `fallback` when none is set.
    pub fn get_or_default(&self, fallback: TenantId) -> TenantId {
        self.get().unwrap_or(fallback)
    }

    /// Returns `true` if a tenant is stored.
    pub fn has_tenant(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Removes the stored tenant unconditionally.
    pub fn clear(&self) {
        *self.slot.write() = None;
    }

    /// Returns a guard that clears this context when dropped.
    ///
    /// ```
    /// use tessera_isolation::tenant::{TenantContext, TenantId};
    ///
    /// let ctx = TenantContext::new();
    /// {
    ///     let _guard = ctx.release_on_drop();
    ///     ctx.set(TenantId::new(3).unwrap());
    /// }
    /// assert_eq!(ctx.get(), None);
    /// ```
    #[must_use = "the context is cleared as soon as the guard is dropped"]
    pub fn release_on_drop(&self) -> TenantContextGuard {
        TenantContextGuard { ctx: self.clone() }
    }

    /// Runs `future` with this context installed as the task-local current
    /// context, clearing it when the future completes or is dropped.
    pub async fn scope<F: Future>(&self, future: F) -> F::Output {
        let _guard = self.release_on_drop();
        CURRENT_TENANT.scope(self.clone(), future).await
    }

    /// Synchronous counterpart of [`scope`](Self::scope).
    pub fn sync_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.release_on_drop();
        CURRENT_TENANT.sync_scope(self.clone(), f)
    }

    /// Returns the context installed by the innermost enclosing
    /// [`scope`](Self::scope) or [`sync_scope`](Self::sync_scope), if any.
    pub fn current() -> Option<TenantContext> {
        CURRENT_TENANT.try_with(TenantContext::clone).ok()
    }

    /// Returns the tenant of the current task-local context, if any.
    pub fn current_tenant() -> Option<TenantId> {
        CURRENT_TENANT.try_with(TenantContext::get).ok().flatten()
    }
}

/// Clears its [`TenantContext`] on drop.
#[derive(Debug)]
pub struct TenantContextGuard {
    ctx: TenantContext,
}

impl TenantContextGuard {
    /// Returns the guarded context.
    pub fn context(&self) -> &TenantContext {
        &self.ctx
    }
}

impl Drop for TenantContextGuard {
    fn drop(&mut self) {
        self.ctx.clear();
    }
}
