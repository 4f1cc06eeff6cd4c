//! Domain-specific error types for the workstation engine.
//!
//! Internal modules return typed errors (e.g., [`CatalogError`],
//! [`ResolveError`]) while command handlers at the CLI boundary convert them
//! to [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! WorkstationError
//! ├── Catalog(CatalogError)   — unreadable/malformed metadata, unknown names
//! ├── Resolve(ResolveError)   — dependency cycles, dangling dependencies
//! ├── Resource(ResourceError) — mapping discovery and symlink deployment
//! └── Backup(BackupError)     — session creation, copy and restore failures
//! ```
//!
//! Conflict findings are deliberately absent: they are advisory and reported
//! through [`ConflictReport`](crate::graph::conflicts::ConflictReport).

use thiserror::Error;

pub use crate::resources::error::ResourceError;

/// Top-level error type for the workstation engine.
#[derive(Error, Debug)]
pub enum WorkstationError {
    /// The component catalog could not be loaded or referenced.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Dependency resolution failed.
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// A resource operation failed.
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// A backup or restore operation failed.
    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),
}

/// Errors that arise while loading or querying the component catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("cannot read catalog {path}: {source}")]
    Unreadable {
        /// Path of the catalog file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The catalog does not parse as the expected structured document.
    #[error("malformed catalog {path}: {message}")]
    Malformed {
        /// Path (or origin label) of the catalog.
        path: String,
        /// Parser message.
        message: String,
    },

    /// A component name is not present in the catalog.
    #[error("unknown component '{name}' (available: {available})")]
    UnknownComponent {
        /// The name that was looked up.
        name: String,
        /// Comma-separated list of known component names.
        available: String,
    },
}

/// Errors that abort dependency resolution before any mutation happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A component (transitively) depends on itself.
    #[error("circular dependency on '{name}': {}", .path.join(" -> "))]
    CircularDependency {
        /// The component that closed the cycle.
        name: String,
        /// The resolution path that forms the cycle, ending with `name`.
        path: Vec<String>,
    },

    /// A selected component or a declared dependency does not exist.
    #[error("unknown component '{name}'{}", required_by_suffix(.required_by))]
    UnknownComponent {
        /// The missing component name.
        name: String,
        /// The component that declared the dependency, if any.
        required_by: Option<String>,
    },

    /// A component in the installation set declares a conflict with a name
    /// the catalog does not know.
    #[error("unknown component '{name}' in conflicts of '{declared_by}'")]
    UnknownConflict {
        /// The missing component name.
        name: String,
        /// The component declaring the conflict.
        declared_by: String,
    },
}

fn required_by_suffix(required_by: &Option<String>) -> String {
    required_by
        .as_ref()
        .map_or_else(String::new, |parent| format!(" (required by '{parent}')"))
}

/// Errors that arise from backup session handling.
#[derive(Error, Debug)]
pub enum BackupError {
    /// The path to back up does not exist.
    #[error("cannot back up {path}: path does not exist")]
    SourceMissing {
        /// Path that was expected to exist.
        path: String,
    },

    /// Copying into (or out of) a session failed.
    #[error("copy failed for {path}: {reason}")]
    CopyFailed {
        /// Path being copied.
        path: String,
        /// Underlying failure.
        reason: String,
    },

    /// The session directory could not be created.
    #[error("cannot create backup session in {path}: {reason}")]
    SessionUnavailable {
        /// Session directory path.
        path: String,
        /// Underlying failure.
        reason: String,
    },

    /// No session with this identifier exists under the backup root.
    #[error("backup session not found: {0}")]
    SessionNotFound(String),

    /// The requested path was never backed up in the session.
    #[error("path '{path}' is not part of backup session {session}")]
    PathNotInSession {
        /// Session identifier.
        session: String,
        /// Requested path.
        path: String,
    },

    /// The session metadata file could not be read or written.
    #[error("invalid session metadata {path}: {reason}")]
    Metadata {
        /// Metadata file path.
        path: String,
        /// Underlying failure.
        reason: String,
    },
}
