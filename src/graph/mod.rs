//! Component graph: dependency closure and conflict detection.
//!
//! Both operations are pure functions over an explicit [`Catalog`](crate::config::catalog::Catalog)
//! value and never touch the filesystem.

pub mod conflicts;
pub mod resolve;

pub use conflicts::{Conflict, ConflictReason, ConflictReport, detect_conflicts};
pub use resolve::{Resolution, dependents_of, resolve};
