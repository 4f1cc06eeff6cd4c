//! Personal workstation bootstrap engine.
//!
//! Resolves a selection of catalog components to their dependency closure,
//! reports conflicts, links each component's configuration tree into the
//! home directory and keeps timestamped backups of whatever it replaces.
//!
//! The public API is organised into layers:
//!
//! - **[`config`]** load and validate the component catalog
//! - **[`graph`]** dependency resolution and conflict detection
//! - **[`resources`]** idempotent primitives (mappings, symlinks, backups)
//! - **[`tasks`]** per-component units of work wired to resources
//! - **[`commands`]** top-level subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod graph;
pub mod logging;
pub mod platform;
pub mod prompt;
pub mod resources;
pub mod tasks;

/// Tool version: `WORKSTATION_VERSION` at build time, else the crate version.
pub const VERSION: &str = match option_env!("WORKSTATION_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
