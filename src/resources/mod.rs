//! Idempotent filesystem primitives: mapping discovery, managed symlinks
//! and backup sessions.
pub mod backup;
pub mod error;
pub mod fs;
pub mod mapping;
pub mod policy;
pub mod symlink;

use anyhow::Result;

/// State of a resource relative to its desired state.
///
/// # Examples
///
/// ```
/// use workstation_cli::resources::ResourceState;
///
/// let missing = ResourceState::Missing;
/// let correct = ResourceState::Correct;
/// let wrong = ResourceState::Incorrect { current: "points to /other".into() };
/// let broken = ResourceState::Invalid { reason: "source does not exist".into() };
///
/// assert_ne!(missing, correct);
/// assert_ne!(wrong, broken);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Resource does not exist.
    Missing,
    /// Resource exists and matches the desired state.
    Correct,
    /// Something else occupies the resource's location.
    Incorrect {
        /// Description of the occupant.
        current: String,
    },
    /// Resource cannot be applied (e.g., its source is gone).
    Invalid {
        /// Reason why the resource cannot be applied.
        reason: String,
    },
}

/// A resource whose state can be inspected without side effects.
pub trait Resource {
    /// Human-readable description of this resource.
    fn description(&self) -> String;

    /// Check the current state of the resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be determined due to I/O
    /// failures or permission issues.
    fn current_state(&self) -> Result<ResourceState>;

    /// Determine if the resource needs to be changed.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`current_state`](Self::current_state).
    fn needs_change(&self) -> Result<bool> {
        Ok(matches!(
            self.current_state()?,
            ResourceState::Missing | ResourceState::Incorrect { .. }
        ))
    }
}
