//! The tenant context API.
//!
//! [`Tenancy`] ties together the configuration, the [`TenantRegistry`] and the
//! ambient [`RequestStore`]. Construct one at startup, populate its registry,
//! and share it (typically behind an `Arc`) with the code that reads or
//! overrides the current tenant.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::config::{TenancyConfig, TenancySettings};
use crate::dimension::TenantDimension;
use crate::error::{TenancyError, TenancyResult};
use crate::id::{EntityType, TenantRef};
use crate::registry::TenantRegistry;
use crate::scope::{MutableTenantGuard, TenantGuard, UnscopedGuard};
use crate::store::RequestStore;

/// Entry point for reading and scoping the current tenant.
///
/// # Examples
///
/// ```
/// use helios_tenancy::{RequestStore, Tenancy, TenantRef};
///
/// let tenancy = Tenancy::new();
/// let acme = TenantRef::new("account", "acme");
/// let globex = TenantRef::new("account", "globex");
///
/// RequestStore::sync_scope(|| {
///     tenancy.set_current_tenant(Some(acme.clone()));
///
///     let inner = tenancy.with_tenant(globex.clone(), || tenancy.current_tenant());
///     assert_eq!(inner, Some(globex));
///     assert_eq!(tenancy.current_tenant(), Some(acme));
///
///     assert_eq!(tenancy.without_tenant(|| tenancy.current_tenant()), None);
/// });
/// ```
#[derive(Debug, Default)]
pub struct Tenancy {
    config: RwLock<Option<Arc<TenancyConfig>>>,
    registry: TenantRegistry,
    default_tenant: RwLock<Option<TenantRef>>,
}

impl Tenancy {
    /// Creates a tenancy context with an empty registry and no configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tenancy context using an existing registry.
    pub fn with_registry(registry: TenantRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    /// Replaces the configuration with a fresh one shaped by `f`.
    ///
    /// Settings are never merged with the previous configuration.
    pub fn configure<F>(&self, f: F) -> Arc<TenancyConfig>
    where
        F: FnOnce(&mut TenancyConfig),
    {
        let mut config = TenancyConfig::default();
        f(&mut config);
        self.install_config(config)
    }

    /// Replaces the configuration with the defaults.
    pub fn configure_default(&self) -> Arc<TenancyConfig> {
        self.install_config(TenancyConfig::default())
    }

    /// Replaces the configuration with one built from plain settings.
    pub fn configure_from(&self, settings: TenancySettings) -> Arc<TenancyConfig> {
        self.install_config(settings.into())
    }

    fn install_config(&self, config: TenancyConfig) -> Arc<TenancyConfig> {
        debug!(
            require_tenant = ?config.require_tenant,
            primary_key = %config.primary_key,
            "Installed tenancy configuration"
        );
        let config = Arc::new(config);
        *self.config.write() = Some(Arc::clone(&config));
        config
    }

    /// Returns the active configuration, installing the defaults if none was set.
    pub fn configuration(&self) -> Arc<TenancyConfig> {
        if let Some(config) = self.config.read().as_ref() {
            return Arc::clone(config);
        }
        let mut slot = self.config.write();
        Arc::clone(slot.get_or_insert_with(|| Arc::new(TenancyConfig::default())))
    }

    /// Returns the configured primary-key field name.
    pub fn primary_key(&self) -> String {
        self.configuration().primary_key.clone()
    }

    /// Returns `true` if operations must run with a tenant.
    ///
    /// A predicate policy is evaluated on every call.
    pub fn should_require_tenant(&self) -> bool {
        self.configuration().require_tenant.evaluate()
    }

    // -------------------------------------------------------------------------
    // Registry
    // -------------------------------------------------------------------------

    /// Returns the dimension registry.
    pub fn registry(&self) -> &TenantRegistry {
        &self.registry
    }

    /// Records the entity type for a dimension.
    pub fn register_dimension(
        &self,
        name: impl Into<TenantDimension>,
        entity_type: impl Into<EntityType>,
    ) {
        self.registry.register_dimension(name, entity_type);
    }

    /// Returns the foreign-key column name for a dimension.
    pub fn foreign_key_for(&self, name: &str) -> TenancyResult<String> {
        self.registry.foreign_key_for(name)
    }

    /// Returns the polymorphic type column name for a dimension.
    pub fn polymorphic_type_for(&self, name: &str) -> TenancyResult<String> {
        self.registry.polymorphic_type_for(name)
    }

    /// Returns `true` if the primary dimension is currently mutable.
    pub fn mutable_tenant(&self) -> bool {
        self.registry.is_mutable(TenantDimension::CURRENT.as_str())
    }

    /// Sets the mutability flag of the primary dimension.
    pub fn set_mutable_tenant(&self, mutable: bool) {
        self.registry.set_mutable(TenantDimension::CURRENT, mutable);
    }

    // -------------------------------------------------------------------------
    // Current tenant
    // -------------------------------------------------------------------------

    /// Sets the process-wide default tenant.
    pub fn set_default_tenant(&self, tenant: Option<TenantRef>) {
        debug!(tenant = ?tenant, "Set default tenant");
        *self.default_tenant.write() = tenant;
    }

    /// Returns the default tenant, or `None` while unscoped.
    pub fn default_tenant(&self) -> Option<TenantRef> {
        if RequestStore::unscoped() {
            return None;
        }
        self.default_tenant.read().clone()
    }

    /// Returns the tenant for the primary dimension.
    ///
    /// Resolution order: the tenant set in this unit of work, the test
    /// override, then the default tenant (suppressed while unscoped).
    pub fn current_tenant(&self) -> Option<TenantRef> {
        RequestStore::resolve_current_tenant(self.default_tenant.read().as_ref())
    }

    /// Sets or clears the primary tenant for this unit of work.
    pub fn set_current_tenant(&self, tenant: Option<TenantRef>) {
        self.set_named_tenant(&TenantDimension::CURRENT, tenant);
    }

    /// Returns the tenant set for a dimension in this unit of work.
    pub fn named_tenant(&self, dimension: &TenantDimension) -> Option<TenantRef> {
        RequestStore::dimension_value(dimension)
    }

    /// Sets or clears the tenant of a dimension for this unit of work.
    pub fn set_named_tenant(&self, dimension: &TenantDimension, tenant: Option<TenantRef>) {
        trace!(dimension = %dimension, tenant = ?tenant, "Set tenant");
        RequestStore::set_dimension_value(dimension, tenant);
    }

    /// Sets the worker-scoped test tenant.
    ///
    /// The value is shared by every unit of work run on the current thread.
    pub fn set_test_tenant(&self, tenant: Option<TenantRef>) {
        RequestStore::set_test_override(tenant);
    }

    /// Returns the worker-scoped test tenant.
    pub fn test_tenant(&self) -> Option<TenantRef> {
        RequestStore::test_override()
    }

    /// Returns `true` inside an unscoped block.
    pub fn is_unscoped(&self) -> bool {
        RequestStore::unscoped()
    }

    /// Returns the current tenant, failing if the policy requires one and
    /// none resolves.
    ///
    /// Unscoped blocks never fail this check.
    pub fn require_current_tenant(&self) -> TenancyResult<Option<TenantRef>> {
        if let Some(tenant) = self.current_tenant() {
            return Ok(Some(tenant));
        }
        if self.is_unscoped() || !self.should_require_tenant() {
            return Ok(None);
        }
        Err(TenancyError::NoTenantSet {
            dimension: TenantDimension::CURRENT,
        })
    }

    // -------------------------------------------------------------------------
    // Scoped overrides
    // -------------------------------------------------------------------------

    /// Makes `tenant` the primary tenant until the returned guard is dropped.
    ///
    /// The guard restores the tenant that resolved on entry, including one
    /// that came from the test override or the default. Hold it across
    /// `.await` only inside a task scope.
    pub fn enter_tenant(&self, tenant: impl Into<Option<TenantRef>>) -> TenantGuard {
        let previous = self.current_tenant();
        TenantGuard::install(TenantDimension::CURRENT, tenant.into(), previous)
    }

    /// Sets the tenant of `dimension` until the returned guard is dropped.
    pub fn enter_named_tenant(
        &self,
        dimension: impl Into<TenantDimension>,
        tenant: impl Into<Option<TenantRef>>,
    ) -> TenantGuard {
        let dimension = dimension.into();
        let previous = RequestStore::dimension_value(&dimension);
        TenantGuard::install(dimension, tenant.into(), previous)
    }

    /// Suspends tenant resolution until the returned guard is dropped.
    pub fn enter_unscoped(&self) -> UnscopedGuard {
        UnscopedGuard::install()
    }

    /// Suspends tenant resolution and allows reassigning tenant-owning fields
    /// until the returned guard is dropped.
    pub fn enter_mutable(&self) -> MutableTenantGuard<'_> {
        MutableTenantGuard::install(&self.registry)
    }

    /// Runs `work` with `tenant` as the primary tenant.
    ///
    /// The previous tenant is restored however `work` exits; its result, or
    /// its panic, reaches the caller unchanged.
    pub fn with_tenant<R>(
        &self,
        tenant: impl Into<Option<TenantRef>>,
        work: impl FnOnce() -> R,
    ) -> R {
        let _guard = self.enter_tenant(tenant);
        work()
    }

    /// Runs `work` with `tenant` assigned to `dimension`.
    pub fn with_named_tenant<R>(
        &self,
        dimension: impl Into<TenantDimension>,
        tenant: impl Into<Option<TenantRef>>,
        work: impl FnOnce() -> R,
    ) -> R {
        let _guard = self.enter_named_tenant(dimension, tenant);
        work()
    }

    /// Runs `work` with tenant resolution suspended.
    ///
    /// Inside `work` the current tenant is `None`, even when a default or test
    /// tenant is configured. The primary tenant, the test tenant and the
    /// unscoped flag are restored afterwards.
    pub fn without_tenant<R>(&self, work: impl FnOnce() -> R) -> R {
        let _guard = self.enter_unscoped();
        work()
    }

    /// Runs `work` unscoped and with the primary dimension mutable.
    ///
    /// Mutability is reset to `false` on exit regardless of its prior value.
    pub fn with_mutable_tenant<R>(&self, work: impl FnOnce() -> R) -> R {
        let _guard = self.enter_mutable();
        work()
    }

    /// Async form of [`with_tenant`](Self::with_tenant).
    ///
    /// Never uses the thread-bound slot: outside a task scope the work runs
    /// in a new scope seeded with a snapshot of the current store, so the
    /// override stays private to this future across `.await`.
    pub async fn with_tenant_async<F: Future>(
        &self,
        tenant: impl Into<Option<TenantRef>>,
        work: F,
    ) -> F::Output {
        let tenant = tenant.into();
        RequestStore::task_scoped(async move {
            let _guard = self.enter_tenant(tenant);
            work.await
        })
        .await
    }

    /// Async form of [`with_named_tenant`](Self::with_named_tenant).
    ///
    /// Outside a task scope the work runs in a new, seeded scope, as with
    /// [`with_tenant_async`](Self::with_tenant_async).
    pub async fn with_named_tenant_async<F: Future>(
        &self,
        dimension: impl Into<TenantDimension>,
        tenant: impl Into<Option<TenantRef>>,
        work: F,
    ) -> F::Output {
        let dimension = dimension.into();
        let tenant = tenant.into();
        RequestStore::task_scoped(async move {
            let _guard = self.enter_named_tenant(dimension, tenant);
            work.await
        })
        .await
    }

    /// Async form of [`without_tenant`](Self::without_tenant).
    ///
    /// Outside a task scope the work runs in a new, seeded scope, as with
    /// [`with_tenant_async`](Self::with_tenant_async).
    pub async fn without_tenant_async<F: Future>(&self, work: F) -> F::Output {
        RequestStore::task_scoped(async move {
            let _guard = self.enter_unscoped();
            work.await
        })
        .await
    }

    /// Async form of [`with_mutable_tenant`](Self::with_mutable_tenant).
    ///
    /// Outside a task scope the work runs in a new, seeded scope, as with
    /// [`with_tenant_async`](Self::with_tenant_async). The mutability flag
    /// itself lives in the registry and is visible to every unit of work.
    pub async fn with_mutable_tenant_async<F: Future>(&self, work: F) -> F::Output {
        RequestStore::task_scoped(async move {
            let _guard = self.enter_mutable();
            work.await
        })
        .await
    }
}
