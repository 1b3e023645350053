//! Tenant dimension names.
//!
//! A [`TenantDimension`] names one independent axis of tenancy. Most
//! applications only use the primary dimension, [`TenantDimension::CURRENT`],
//! but several dimensions (for example `account` and `region`) can be active
//! in the same unit of work.

use std::borrow::{Borrow, Cow};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TenancyError;

/// Name of the reserved primary dimension.
pub const CURRENT_TENANT: &str = "current_tenant";

/// An identifier naming one axis of tenancy.
///
/// # Examples
///
/// ```
/// use helios_tenancy::TenantDimension;
///
/// let region = TenantDimension::from_static("region");
/// assert_eq!(region.as_str(), "region");
/// assert!(TenantDimension::CURRENT.is_current());
/// assert!(TenantDimension::parse("").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantDimension(Cow<'static, str>);

impl TenantDimension {
    /// The primary dimension consulted by `current_tenant`.
    pub const CURRENT: TenantDimension = TenantDimension(Cow::Borrowed(CURRENT_TENANT));

    /// Creates a dimension from a static name without allocating.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates a dimension from an owned name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Parses a dimension name, rejecting empty or blank names.
    pub fn parse(name: &str) -> Result<Self, TenancyError> {
        if name.trim().is_empty() {
            return Err(TenancyError::invalid_argument(
                "tenant dimension name must not be empty",
            ));
        }
        Ok(Self::new(name))
    }

    /// Returns the dimension name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this is the primary dimension.
    pub fn is_current(&self) -> bool {
        self.0 == CURRENT_TENANT
    }
}

impl Default for TenantDimension {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Debug for TenantDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantDimension({})", self.0)
    }
}

impl fmt::Display for TenantDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantDimension {
    type Err = TenancyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&'static str> for TenantDimension {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for TenantDimension {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&TenantDimension> for TenantDimension {
    fn from(dimension: &TenantDimension) -> Self {
        dimension.clone()
    }
}

impl AsRef<str> for TenantDimension {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for TenantDimension {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}
