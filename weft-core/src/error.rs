//! Error types for container access.
//!
//! The observation layer exposes an explicit accessor API instead of
//! transparent field syntax, so using the wrong family of operations on a
//! handle (say, `push` on an object) is detectable and reported as an error
//! rather than a panic. Writes to read-only views are *not* errors: they are
//! silently accepted no-ops, matching the read-only contract.

use thiserror::Error;

use crate::container::ContainerKind;

/// Errors produced by kind-dispatched container operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The operation belongs to a different container kind.
    #[error("expected a {expected} container, found {found}")]
    KindMismatch {
        /// The kind the operation requires.
        expected: ContainerKind,
        /// The kind the handle actually points at.
        found: ContainerKind,
    },

    /// The value cannot be used as a map or set key.
    #[error("{0} values cannot be used as map or set keys")]
    InvalidKey(&'static str),
}

/// Convenience alias for container-access results.
pub type AccessResult<T> = Result<T, AccessError>;
