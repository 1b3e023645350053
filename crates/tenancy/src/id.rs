//! Tenant identity types.
//!
//! This module defines the values held by the context store:
//!
//! - [`TenantId`] - opaque identifier of one tenant
//! - [`EntityType`] - the entity kind that represents tenants of a dimension
//! - [`TenantRef`] - the handle stored per dimension, compared by equality only
//! - [`TenantEntity`] - implemented by application types that act as tenants

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TenancyError;

/// An opaque tenant identifier.
///
/// The context store never inspects a `TenantId` beyond equality.
///
/// # Examples
///
/// ```
/// use helios_tenancy::TenantId;
///
/// let tenant = TenantId::new("acme");
/// assert_eq!(tenant.as_str(), "acme");
/// assert_eq!(tenant, "acme".parse::<TenantId>().unwrap());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a new tenant ID from the given string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the tenant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the ID and returns the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The entity kind representing tenants of one dimension.
///
/// The name is used verbatim to derive foreign-key and polymorphic-type
/// column names, so it is normally the snake_case model name.
///
/// ```
/// use helios_tenancy::EntityType;
///
/// let account = EntityType::from_static("account");
/// assert_eq!(account.foreign_key(), "account_id");
/// assert_eq!(account.polymorphic_type(), "account_type");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(Cow<'static, str>);

impl EntityType {
    /// Creates an entity type from a static name without allocating.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates an entity type from an owned name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Parses an entity type name, rejecting empty or blank names.
    pub fn parse(name: &str) -> Result<Self, TenancyError> {
        if name.trim().is_empty() {
            return Err(TenancyError::invalid_argument(
                "entity type name must not be empty",
            ));
        }
        Ok(Self::new(name))
    }

    /// Returns the entity type name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the foreign-key column name, `<entity>_id`.
    pub fn foreign_key(&self) -> String {
        format!("{}_id", self.0)
    }

    /// Returns the polymorphic type column name, `<entity>_type`.
    pub fn polymorphic_type(&self) -> String {
        format!("{}_type", self.0)
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityType({})", self.0)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&'static str> for EntityType {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for EntityType {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// A handle identifying the tenant active for one dimension.
///
/// # Examples
///
/// ```
/// use helios_tenancy::{EntityType, TenantId, TenantRef};
///
/// let acme = TenantRef::new(EntityType::from_static("account"), TenantId::new("acme"));
/// assert_eq!(acme.to_string(), "account:acme");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantRef {
    /// The entity kind of the tenant.
    pub entity_type: EntityType,
    /// The tenant identifier within that entity kind.
    pub id: TenantId,
}

impl TenantRef {
    /// Creates a new tenant reference.
    pub fn new(entity_type: impl Into<EntityType>, id: impl Into<TenantId>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Returns the entity type.
    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// Returns the tenant ID.
    pub fn id(&self) -> &TenantId {
        &self.id
    }
}

impl fmt::Display for TenantRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.id)
    }
}

/// Implemented by application types whose instances act as tenants.
///
/// ```
/// use helios_tenancy::{TenantEntity, TenantId, TenantRef};
///
/// struct Account {
///     id: u64,
/// }
///
/// impl TenantEntity for Account {
///     const ENTITY_TYPE: &'static str = "account";
///
///     fn tenant_id(&self) -> TenantId {
///         TenantId::new(self.id.to_string())
///     }
/// }
///
/// let tenant = TenantRef::from(&Account { id: 7 });
/// assert_eq!(tenant.to_string(), "account:7");
/// ```
pub trait TenantEntity {
    /// Entity type name used for column derivation.
    const ENTITY_TYPE: &'static str;

    /// Returns the identity of this tenant.
    fn tenant_id(&self) -> TenantId;

    /// Returns the entity type of this tenant kind.
    fn entity_type() -> EntityType {
        EntityType::from_static(Self::ENTITY_TYPE)
    }

    /// Returns a handle suitable for the context store.
    fn tenant_ref(&self) -> TenantRef {
        TenantRef::new(Self::entity_type(), self.tenant_id())
    }
}

impl<T: TenantEntity> From<&T> for TenantRef {
    fn from(entity: &T) -> Self {
        entity.tenant_ref()
    }
}
