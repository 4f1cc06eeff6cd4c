use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::resources::backup::{OriginFilter, RestorePolicy};
use crate::resources::policy::ConflictMode;

/// Top-level CLI entry point for the workstation bootstrap tool.
#[derive(Parser, Debug)]
#[command(
    name = "workstation",
    about = "Resolve, deploy and back up workstation components",
    version = crate::VERSION
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Repository root containing components.toml (env: `WORKSTATION_ROOT`)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Home directory to deploy into (env: `HOME`)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Directory holding backup sessions (env: `WORKSTATION_BACKUP_DIR`)
    #[arg(long, global = true)]
    pub backup_root: Option<PathBuf>,

    /// Distro identifier used for package lists (env: `WORKSTATION_DISTRO`)
    #[arg(long, global = true)]
    pub distro: Option<String>,

    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Answer yes to every confirmation
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every component in the catalog
    List,
    /// Show one component's details and deployment targets
    Show(ShowOpts),
    /// Resolve, check and deploy components
    Apply(ApplyOpts),
    /// Remove the managed links of components
    Remove(RemoveOpts),
    /// Check the catalog and component trees for mistakes
    Validate,
    /// List backup sessions, newest first
    BackupList,
    /// Restore a backup session
    Restore(RestoreOpts),
    /// Print version information
    Version,
}

/// Options for the `show` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ShowOpts {
    /// Component name
    pub component: String,
}

/// Options for the `apply` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ApplyOpts {
    /// Components to install; dependencies are added automatically
    #[arg(required = true)]
    pub components: Vec<String>,

    /// What to do when a target is already occupied
    #[arg(long, value_enum, default_value_t = ConflictMode::Backup)]
    pub on_conflict: ConflictMode,

    /// Stop at the first failed mapping
    #[arg(long)]
    pub strict: bool,

    /// Apply even when components conflict
    #[arg(long)]
    pub force: bool,

    /// Do not install native packages
    #[arg(long)]
    pub skip_packages: bool,
}

/// Options for the `remove` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct RemoveOpts {
    /// Components whose links are removed
    #[arg(required = true)]
    pub components: Vec<String>,
}

/// Options for the `restore` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct RestoreOpts {
    /// Session identifier, or `latest`
    pub session: String,

    /// Restore only this path (`~/...`, absolute, or `home/...`/`root/...`)
    #[arg(conflicts_with = "only")]
    pub path: Option<PathBuf>,

    /// Restore only entries matching user, system or component:<name>
    #[arg(long)]
    pub only: Option<OriginFilter>,

    /// What to do when the original location is occupied
    #[arg(long, value_enum, default_value_t = RestorePolicy::Replace)]
    pub policy: RestorePolicy,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Show(_) => "show",
            Self::Apply(_) => "apply",
            Self::Remove(_) => "remove",
            Self::Validate => "validate",
            Self::BackupList => "backup-list",
            Self::Restore(_) => "restore",
            Self::Version => "version",
        }
    }
}
