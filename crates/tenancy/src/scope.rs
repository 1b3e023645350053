//! Scope guards for temporary tenant overrides.
//!
//! Each guard captures the state it is about to replace when it is created
//! and writes that state back in `Drop`. Restoration therefore runs on every
//! exit path: normal return, an early `?` return, panic unwinding, and
//! cancellation of a future holding the guard.
//!
//! Nested guards compose without an explicit stack because each one restores
//! exactly the value it captured.

use tracing::trace;

use crate::dimension::TenantDimension;
use crate::id::TenantRef;
use crate::registry::TenantRegistry;
use crate::store::RequestStore;

/// Restores one dimension's tenant when dropped.
#[must_use = "the previous tenant is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TenantGuard {
    dimension: TenantDimension,
    previous: Option<TenantRef>,
}

impl TenantGuard {
    /// Installs `tenant` for `dimension`, remembering `previous` for restore.
    pub(crate) fn install(
        dimension: TenantDimension,
        tenant: Option<TenantRef>,
        previous: Option<TenantRef>,
    ) -> Self {
        trace!(dimension = %dimension, tenant = ?tenant, previous = ?previous, "Entering tenant scope");
        RequestStore::set_dimension_value(&dimension, tenant);
        Self {
            dimension,
            previous,
        }
    }

    /// Returns the dimension this guard overrides.
    pub fn dimension(&self) -> &TenantDimension {
        &self.dimension
    }

    /// Returns the value that will be restored.
    pub fn previous(&self) -> Option<&TenantRef> {
        self.previous.as_ref()
    }
}

impl Drop for TenantGuard {
    fn drop(&mut self) {
        trace!(dimension = %self.dimension, restored = ?self.previous, "Leaving tenant scope");
        RequestStore::set_dimension_value(&self.dimension, self.previous.take());
    }
}

/// Suspends tenant resolution until dropped.
///
/// While held, the primary tenant and the test override are cleared and the
/// unscoped flag is set, which also suppresses the default tenant.
#[must_use = "tenant resolution resumes as soon as the guard is dropped"]
#[derive(Debug)]
pub struct UnscopedGuard {
    previous_tenant: Option<TenantRef>,
    previous_test_tenant: Option<TenantRef>,
    previous_unscoped: bool,
}

impl UnscopedGuard {
    pub(crate) fn install() -> Self {
        let guard = Self {
            previous_tenant: RequestStore::dimension_value(&TenantDimension::CURRENT),
            previous_test_tenant: RequestStore::test_override(),
            previous_unscoped: RequestStore::unscoped(),
        };
        trace!(
            previous = ?guard.previous_tenant,
            previous_unscoped = guard.previous_unscoped,
            "Entering unscoped block"
        );

        RequestStore::set_dimension_value(&TenantDimension::CURRENT, None);
        RequestStore::set_test_override(None);
        RequestStore::set_unscoped(true);
        guard
    }
}

impl Drop for UnscopedGuard {
    fn drop(&mut self) {
        trace!(
            restored = ?self.previous_tenant,
            unscoped = self.previous_unscoped,
            "Leaving unscoped block"
        );
        RequestStore::set_dimension_value(&TenantDimension::CURRENT, self.previous_tenant.take());
        RequestStore::set_test_override(self.previous_test_tenant.take());
        RequestStore::set_unscoped(self.previous_unscoped);
    }
}

/// Grants permission to reassign tenant-owning fields until dropped.
///
/// Drop resets the flag to `false`, not to the value seen on entry, so
/// nesting mutable guards ends the permission at the first inner exit.
#[must_use = "the mutability flag is reset as soon as the guard is dropped"]
#[derive(Debug)]
pub struct MutableGuard<'a> {
    registry: &'a TenantRegistry,
    dimension: TenantDimension,
}

impl<'a> MutableGuard<'a> {
    pub(crate) fn install(registry: &'a TenantRegistry, dimension: TenantDimension) -> Self {
        trace!(dimension = %dimension, "Granting tenant mutability");
        registry.set_mutable(dimension.clone(), true);
        Self {
            registry,
            dimension,
        }
    }
}

impl Drop for MutableGuard<'_> {
    fn drop(&mut self) {
        trace!(dimension = %self.dimension, "Revoking tenant mutability");
        self.registry.set_mutable(self.dimension.clone(), false);
    }
}

/// Guard set installed by mutable-tenant blocks.
///
/// Fields drop in declaration order: the unscoped state is restored first,
/// then mutability is revoked.
#[must_use = "the context is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct MutableTenantGuard<'a> {
    _unscoped: UnscopedGuard,
    _mutable: MutableGuard<'a>,
}

impl<'a> MutableTenantGuard<'a> {
    pub(crate) fn install(registry: &'a TenantRegistry) -> Self {
        let mutable = MutableGuard::install(registry, TenantDimension::CURRENT);
        let unscoped = UnscopedGuard::install();
        Self {
            _unscoped: unscoped,
            _mutable: mutable,
        }
    }
}
