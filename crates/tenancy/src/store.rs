//! Request-scoped context store.
//!
//! The store holds the tenant assigned to each [`TenantDimension`] for the
//! duration of one unit of work, together with the unscoped flag. It is
//! ambient: code reads it without being handed a reference.
//!
//! # Storage Scopes
//!
//! Two slots back the request store, checked in this order:
//!
//! 1. A tokio task-local slot, installed by [`RequestStore::scope`],
//!    [`RequestStore::sync_scope`] or [`StoreSnapshot::scope`]. Each scope
//!    gets its own state, so concurrent tasks never observe each other.
//! 2. A thread-local slot for synchronous hosts, bracketed by
//!    [`RequestStore::begin`] and the drop of the returned [`UnitOfWork`].
//!
//! The thread slot is shared by every task a runtime worker thread polls, so
//! it is reserved for synchronous hosts. [`RequestStore::begin`] refuses to
//! open a unit of work on a runtime thread outside a task scope, and async
//! scoped overrides such as
//! [`Tenancy::with_tenant_async`](crate::Tenancy::with_tenant_async) install a
//! task scope of their own when none is present. Async code that sets tenants
//! directly should run inside [`RequestStore::scope`].
//!
//! The test override lives in a third, thread-local slot that ignores unit of
//! work boundaries entirely. Every unit of work executed by the same thread
//! shares it. On a multi-threaded runtime a task may resume on another thread,
//! so the override is only meaningful for synchronous tests or a
//! current-thread runtime.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;

use tracing::debug;

use crate::dimension::TenantDimension;
use crate::error::{TenancyError, TenancyResult};
use crate::id::TenantRef;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct StoreState {
    entries: HashMap<TenantDimension, TenantRef>,
    unscoped: bool,
}

tokio::task_local! {
    static TASK_STORE: RefCell<StoreState>;
}

thread_local! {
    static THREAD_STORE: RefCell<StoreState> = RefCell::new(StoreState::default());
    static TEST_OVERRIDE: RefCell<Option<TenantRef>> = const { RefCell::new(None) };
}

fn with_state<R>(f: impl FnOnce(&mut StoreState) -> R) -> R {
    if RequestStore::in_task_scope() {
        TASK_STORE.with(|cell| f(&mut cell.borrow_mut()))
    } else {
        THREAD_STORE.with(|cell| f(&mut cell.borrow_mut()))
    }
}

/// Accessors for the ambient request store.
///
/// # Examples
///
/// ```
/// use helios_tenancy::{RequestStore, TenantDimension, TenantRef};
///
/// let acme = TenantRef::new("account", "acme");
///
/// let seen = RequestStore::sync_scope(|| {
///     RequestStore::set_dimension_value(&TenantDimension::CURRENT, Some(acme.clone()));
///     RequestStore::dimension_value(&TenantDimension::CURRENT)
/// });
/// assert_eq!(seen, Some(acme));
///
/// // The scope's state is gone once it returns.
/// assert_eq!(RequestStore::sync_scope(|| RequestStore::dimension_value(&TenantDimension::CURRENT)), None);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestStore;

impl RequestStore {
    /// Begins a unit of work on the current thread.
    ///
    /// The ambient store is reset now and cleared again when the returned
    /// guard is dropped.
    ///
    /// Thread-bound units of work are for synchronous hosts. On a tokio
    /// runtime thread outside a task scope this returns
    /// [`TenancyError::InvalidArgument`], since the thread slot is shared by
    /// every task that thread polls; use [`RequestStore::scope`] there.
    /// Inside a task scope the scope's own store is reset.
    pub fn begin() -> TenancyResult<UnitOfWork> {
        let task_scope = Self::in_task_scope();
        if !task_scope && tokio::runtime::Handle::try_current().is_ok() {
            return Err(TenancyError::invalid_argument(
                "thread-bound unit of work cannot begin on an async runtime thread, use RequestStore::scope",
            ));
        }
        with_state(|state| *state = StoreState::default());
        debug!(task_scope, "Began unit of work");
        Ok(UnitOfWork { _private: () })
    }

    /// Runs a future as one unit of work with its own, initially empty, store.
    pub async fn scope<F: Future>(fut: F) -> F::Output {
        TASK_STORE
            .scope(RefCell::new(StoreState::default()), fut)
            .await
    }

    /// Runs a closure as one unit of work with its own, initially empty, store.
    pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
        TASK_STORE.sync_scope(RefCell::new(StoreState::default()), f)
    }

    /// Runs `fut` in the current task scope, or in a new one seeded with a
    /// snapshot of the current store when no task scope is installed.
    pub(crate) async fn task_scoped<F: Future>(fut: F) -> F::Output {
        if Self::in_task_scope() {
            fut.await
        } else {
            Self::snapshot().scope(fut).await
        }
    }

    /// Returns `true` if a task-local store is installed.
    pub fn in_task_scope() -> bool {
        TASK_STORE.try_with(|_| ()).is_ok()
    }

    /// Captures a copy of the current store, e.g. to hand to a spawned task.
    pub fn snapshot() -> StoreSnapshot {
        StoreSnapshot {
            state: with_state(|state| state.clone()),
        }
    }

    /// Sets or clears the tenant of a dimension.
    pub fn set_dimension_value(dimension: &TenantDimension, value: Option<TenantRef>) {
        with_state(|state| match value {
            Some(tenant) => {
                state.entries.insert(dimension.clone(), tenant);
            }
            None => {
                state.entries.remove(dimension);
            }
        })
    }

    /// Returns the tenant of a dimension in the current unit of work.
    pub fn dimension_value(dimension: &TenantDimension) -> Option<TenantRef> {
        with_state(|state| state.entries.get(dimension).cloned())
    }

    /// Sets the unscoped flag.
    pub fn set_unscoped(unscoped: bool) {
        with_state(|state| state.unscoped = unscoped)
    }

    /// Returns the unscoped flag, `false` unless set.
    pub fn unscoped() -> bool {
        with_state(|state| state.unscoped)
    }

    /// Sets the worker-scoped test override.
    pub fn set_test_override(value: Option<TenantRef>) {
        TEST_OVERRIDE.with(|cell| *cell.borrow_mut() = value)
    }

    /// Returns the worker-scoped test override.
    pub fn test_override() -> Option<TenantRef> {
        TEST_OVERRIDE.with(|cell| cell.borrow().clone())
    }

    /// Resolves the primary tenant.
    ///
    /// Returns the first present value of: the request's `current_tenant`
    /// entry, the test override, then `default_tenant` unless unscoped.
    pub fn resolve_current_tenant(default_tenant: Option<&TenantRef>) -> Option<TenantRef> {
        Self::dimension_value(&TenantDimension::CURRENT)
            .or_else(Self::test_override)
            .or_else(|| {
                if Self::unscoped() {
                    None
                } else {
                    default_tenant.cloned()
                }
            })
    }
}

/// Guard for a thread-bound unit of work.
///
/// Dropping the guard ends the unit of work and discards its context.
#[must_use = "the unit of work ends when this guard is dropped"]
#[derive(Debug)]
pub struct UnitOfWork {
    _private: (),
}

impl UnitOfWork {
    /// Ends the unit of work.
    pub fn end(self) {}
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        with_state(|state| *state = StoreState::default());
        debug!("Ended unit of work");
    }
}

/// A copy of a request store, used to seed another unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    state: StoreState,
}

impl StoreSnapshot {
    /// Returns the captured tenant of a dimension.
    pub fn dimension_value(&self, dimension: &TenantDimension) -> Option<&TenantRef> {
        self.state.entries.get(dimension)
    }

    /// Returns the captured unscoped flag.
    pub fn unscoped(&self) -> bool {
        self.state.unscoped
    }

    /// Runs a future as a unit of work seeded with this snapshot.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        TASK_STORE.scope(RefCell::new(self.state), fut).await
    }

    /// Runs a closure as a unit of work seeded with this snapshot.
    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        TASK_STORE.sync_scope(RefCell::new(self.state), f)
    }
}
