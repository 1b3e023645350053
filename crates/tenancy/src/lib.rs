//! Helios Tenancy
//!
//! Ambient multi-tenant context propagation. This crate associates a "current
//! tenant" with each unit of work (an inbound request, a job, a test) so that
//! downstream code can discover which tenant it acts for without having the
//! tenant threaded through every call, and lets code temporarily act as a
//! different tenant, or with tenant isolation suspended, with guaranteed
//! restoration.
//!
//! # Architecture
//!
//! - [`config`] - Tenant requirement policy and primary-key settings
//! - [`registry`] - Tenant dimensions, global-record entity types, mutability flags
//! - [`store`] - The ambient request-scoped store and unit-of-work boundaries
//! - [`scope`] - Guards that restore prior context on drop
//! - [`Tenancy`] - The API application code uses
//!
//! # Quick Start
//!
//! ```
//! use helios_tenancy::{RequestStore, Tenancy, TenantRef};
//!
//! let tenancy = Tenancy::new();
//! tenancy.register_dimension("current_tenant", "account");
//! tenancy.configure(|config| {
//!     config.require_tenant(true);
//! });
//!
//! // Each request runs in its own store.
//! RequestStore::sync_scope(|| {
//!     tenancy.set_current_tenant(Some(TenantRef::new("account", "acme")));
//!     assert_eq!(tenancy.current_tenant().unwrap().id().as_str(), "acme");
//!
//!     // Cross-tenant maintenance
//!     tenancy.without_tenant(|| {
//!         assert!(tenancy.is_unscoped());
//!         assert_eq!(tenancy.current_tenant(), None);
//!     });
//! });
//!
//! assert_eq!(tenancy.foreign_key_for("current_tenant").unwrap(), "account_id");
//! ```
//!
//! # Async Units of Work
//!
//! ```
//! use helios_tenancy::{RequestStore, Tenancy, TenantRef};
//!
//! # tokio_test::block_on(async {
//! let tenancy = Tenancy::new();
//! let acme = TenantRef::new("account", "acme");
//!
//! let seen = RequestStore::scope(async {
//!     tenancy
//!         .with_tenant_async(acme.clone(), async { tenancy.current_tenant() })
//!         .await
//! })
//! .await;
//! assert_eq!(seen, Some(acme));
//! # });
//! ```
//!
//! # Resolution Order
//!
//! [`Tenancy::current_tenant`] returns the first present value of:
//!
//! 1. The tenant set in the current unit of work
//! 2. The worker-scoped test tenant
//! 3. The default tenant, unless inside an unscoped block

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod dimension;
pub mod error;
pub mod id;
pub mod registry;
pub mod scope;
pub mod store;
mod tenancy;

pub use config::{RequireTenant, TenancyConfig, TenancySettings};
pub use dimension::TenantDimension;
pub use error::{TenancyError, TenancyResult};
pub use id::{EntityType, TenantEntity, TenantId, TenantRef};
pub use registry::{RegistryEntry, TenantRegistry};
pub use scope::{MutableGuard, MutableTenantGuard, TenantGuard, UnscopedGuard};
pub use store::{RequestStore, StoreSnapshot, UnitOfWork};
pub use tenancy::Tenancy;
