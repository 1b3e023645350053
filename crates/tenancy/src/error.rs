//! Error types for tenant context operations.
//!
//! Every error in this crate is an immediate, synchronous failure. Nothing is
//! retried, and restoring a scoped override never fails.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::dimension::TenantDimension;

/// The error type for tenant context operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TenancyError {
    /// A caller supplied an argument that violates the API contract.
    ///
    /// Raised before any context state is touched.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A foreign key or polymorphic type was requested for a dimension that
    /// was never registered.
    #[error("tenant dimension not registered: {dimension}")]
    UnregisteredDimension { dimension: TenantDimension },

    /// The tenant policy requires a tenant but none could be resolved.
    #[error("no tenant set for {dimension}")]
    NoTenantSet { dimension: TenantDimension },
}

impl TenancyError {
    /// Creates a [`TenancyError::InvalidArgument`] with the given message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        TenancyError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns `true` for caller-contract violations.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, TenancyError::InvalidArgument { .. })
    }

    /// Returns `true` for lookups against an unregistered dimension.
    pub fn is_unregistered(&self) -> bool {
        matches!(self, TenancyError::UnregisteredDimension { .. })
    }
}

/// Result type for tenant context operations.
pub type TenancyResult<T> = Result<T, TenancyError>;
