//! Named tenant registry.
//!
//! The [`TenantRegistry`] maps each [`TenantDimension`] to the entity type that
//! represents its tenants, tracks which entity types hold records visible to
//! every tenant, and holds the per-dimension mutability flag.
//!
//! The registry is setup-time data populated once at startup. Mutability is
//! toggled at runtime by
//! [`Tenancy::with_mutable_tenant`](crate::Tenancy::with_mutable_tenant), so
//! the state sits behind a reader/writer lock.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::dimension::TenantDimension;
use crate::error::{TenancyError, TenancyResult};
use crate::id::{EntityType, TenantEntity};

/// Registration data for one tenant dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// The dimension this entry describes.
    pub dimension: TenantDimension,
    /// The entity type representing tenants of the dimension.
    pub entity_type: EntityType,
    /// Whether tenant-owning fields may currently be reassigned.
    pub mutable: bool,
}

impl RegistryEntry {
    /// Returns the foreign-key column name, `<entity>_id`.
    pub fn foreign_key(&self) -> String {
        self.entity_type.foreign_key()
    }

    /// Returns the polymorphic type column name, `<entity>_type`.
    pub fn polymorphic_type(&self) -> String {
        self.entity_type.polymorphic_type()
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    entities: HashMap<TenantDimension, EntityType>,
    mutable: HashMap<TenantDimension, bool>,
    global_models: Vec<EntityType>,
}

/// Registry of tenant dimensions and global-record entity types.
///
/// # Examples
///
/// ```
/// use helios_tenancy::{EntityType, TenantDimension, TenantRegistry};
///
/// let registry = TenantRegistry::new();
/// registry.register_dimension("account", EntityType::from_static("account"));
///
/// assert_eq!(registry.foreign_key_for("account").unwrap(), "account_id");
/// assert_eq!(registry.polymorphic_type_for("account").unwrap(), "account_type");
/// assert!(registry.foreign_key_for("region").is_err());
/// ```
#[derive(Debug, Default)]
pub struct TenantRegistry {
    state: RwLock<RegistryState>,
}

impl TenantRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the entity type for a dimension.
    ///
    /// Registering the same name again overwrites the entity type. The
    /// mutability flag is left as it was.
    pub fn register_dimension(
        &self,
        name: impl Into<TenantDimension>,
        entity_type: impl Into<EntityType>,
    ) {
        let name = name.into();
        let entity_type = entity_type.into();
        debug!(dimension = %name, entity_type = %entity_type, "Registered tenant dimension");
        self.state.write().entities.insert(name, entity_type);
    }

    /// Registers a dimension for an application tenant type.
    pub fn register_entity<T: TenantEntity>(&self, name: impl Into<TenantDimension>) {
        self.register_dimension(name, T::entity_type());
    }

    /// Returns the entity type registered for a dimension.
    pub fn lookup_dimension(&self, name: &str) -> Option<EntityType> {
        self.state.read().entities.get(name).cloned()
    }

    /// Returns `true` if the dimension has been registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.state.read().entities.contains_key(name)
    }

    /// Returns the full registration for a dimension.
    pub fn entry(&self, name: &str) -> Option<RegistryEntry> {
        let state = self.state.read();
        let (dimension, entity_type) = state.entities.get_key_value(name)?;
        Some(RegistryEntry {
            dimension: dimension.clone(),
            entity_type: entity_type.clone(),
            mutable: state.mutable.get(name).copied().unwrap_or(false),
        })
    }

    /// Returns the registered dimensions in name order.
    pub fn dimensions(&self) -> Vec<TenantDimension> {
        let mut dimensions: Vec<_> = self.state.read().entities.keys().cloned().collect();
        dimensions.sort();
        dimensions
    }

    /// Returns the foreign-key column name for a dimension.
    pub fn foreign_key_for(&self, name: &str) -> TenancyResult<String> {
        self.require_entity(name).map(|entity| entity.foreign_key())
    }

    /// Returns the polymorphic type column name for a dimension.
    pub fn polymorphic_type_for(&self, name: &str) -> TenancyResult<String> {
        self.require_entity(name)
            .map(|entity| entity.polymorphic_type())
    }

    fn require_entity(&self, name: &str) -> TenancyResult<EntityType> {
        self.lookup_dimension(name)
            .ok_or_else(|| TenancyError::UnregisteredDimension {
                dimension: TenantDimension::new(name),
            })
    }

    /// Declares an entity type whose records are visible to every tenant.
    ///
    /// Repeated declarations of the same type are ignored.
    pub fn mark_global(&self, entity_type: impl Into<EntityType>) {
        let entity_type = entity_type.into();
        let mut state = self.state.write();
        if !state.global_models.contains(&entity_type) {
            debug!(entity_type = %entity_type, "Marked entity type as global");
            state.global_models.push(entity_type);
        }
    }

    /// Returns the global-record entity types in declaration order.
    pub fn global_record_models(&self) -> Vec<EntityType> {
        self.state.read().global_models.clone()
    }

    /// Returns `true` if the entity type holds global records.
    pub fn is_global(&self, entity_type: &EntityType) -> bool {
        self.state.read().global_models.contains(entity_type)
    }

    /// Sets whether tenant-owning fields of a dimension may be reassigned.
    ///
    /// The dimension does not need to be registered.
    pub fn set_mutable(&self, name: impl Into<TenantDimension>, mutable: bool) {
        self.state.write().mutable.insert(name.into(), mutable);
    }

    /// Returns the mutability flag of a dimension, `false` if never set.
    pub fn is_mutable(&self, name: &str) -> bool {
        self.state.read().mutable.get(name).copied().unwrap_or(false)
    }
}
