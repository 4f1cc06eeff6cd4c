//! Typed error variants for resource operations.
//!
//! This module provides [`ResourceError`], a structured error type for
//! mapping discovery and symlink checks.  Callers convert to
//! [`anyhow::Error`] via `?`.

use thiserror::Error;

/// Errors that arise from mapping discovery and resource checks.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// A component has no source tree in the repository.
    #[error("source directory for component '{component}' not found: {path}")]
    ComponentDirectoryMissing {
        /// Component name.
        component: String,
        /// Expected source directory.
        path: String,
    },

    /// The file a mapping points at no longer exists.
    #[error("source does not exist: {path}")]
    SourceMissing {
        /// Missing source path.
        path: String,
    },

    /// A resource exists but is in an unexpected or inconsistent state.
    #[error("invalid state for '{resource}': {reason}")]
    InvalidState {
        /// Name or description of the resource in the invalid state.
        resource: String,
        /// Human-readable explanation of why the state is invalid.
        reason: String,
    },

    /// Walking a source tree failed part way.
    #[error("cannot read {path}: {reason}")]
    Walk {
        /// Path being read.
        path: String,
        /// Underlying failure.
        reason: String,
    },
}
