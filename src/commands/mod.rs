pub mod apply;
pub mod backups;
pub mod list;
pub mod remove;
pub mod show;
pub mod validate;
pub mod version;

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::GlobalOpts;
use crate::config::{CATALOG_FILE, Config};
use crate::exec::{DryRunExecutor, Executor, SystemExecutor};
use crate::logging::{Log, Logger, TaskStatus};
use crate::platform::Platform;
use crate::prompt::Prompter;
use crate::resources::backup::BackupManager;
use crate::resources::policy::{ConflictMode, PolicyDecider};
use crate::tasks::{self, Context, Task};

/// Environment variable overriding the repository root.
pub const ROOT_ENV: &str = "WORKSTATION_ROOT";

/// Environment variable overriding the backup root.
pub const BACKUP_DIR_ENV: &str = "WORKSTATION_BACKUP_DIR";

/// Environment variable overriding distro detection.
pub const DISTRO_ENV: &str = "WORKSTATION_DISTRO";

/// Shared state produced by the common command setup sequence.
#[derive(Debug)]
pub struct CommandSetup {
    /// Detected or overridden platform.
    pub platform: Platform,
    /// Loaded configuration.
    pub config: Arc<Config>,
}

impl CommandSetup {
    /// Resolve paths, detect the platform and load the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the root or home directory cannot be determined or
    /// the catalog fails to load.
    pub fn init(global: &GlobalOpts, log: &dyn Log) -> Result<Self> {
        let root = resolve_root(global)?;
        let home = resolve_home(global)?;
        let backup_root = resolve_backup_root(global, &home)?;
        let platform = resolve_platform(global);

        log.debug(&format!("root: {}", root.display()));
        log.debug(&format!("home: {}", home.display()));
        log.debug(&format!("backups: {}", backup_root.display()));
        log.debug(&format!("distro: {} ({})", platform.distro, platform.family));

        let config = Config::load(&root, &home, &backup_root)?;
        log.debug(&format!("{} components in catalog", config.catalog.len()));

        Ok(Self {
            platform,
            config: Arc::new(config),
        })
    }

    /// Build the task context for this run.
    #[must_use]
    pub fn context(
        &self,
        global: &GlobalOpts,
        log: Arc<dyn Log>,
        mode: ConflictMode,
        prompter: Arc<dyn Prompter>,
    ) -> Context {
        let executor = select_executor(global.dry_run, Arc::clone(&log));
        let backups = Arc::new(BackupManager::new(
            self.config.backup_root.clone(),
            self.config.home.clone(),
            Arc::clone(&executor),
        ));
        Context::new(
            Arc::clone(&self.config),
            Arc::new(self.platform.clone()),
            log,
            executor,
            backups,
            Arc::new(PolicyDecider::new(mode, prompter)),
        )
    }
}

/// The recording executor for dry runs, the real one otherwise.
#[must_use]
pub fn select_executor(dry_run: bool, log: Arc<dyn Log>) -> Arc<dyn Executor> {
    if dry_run {
        Arc::new(DryRunExecutor::new(log))
    } else {
        Arc::new(SystemExecutor)
    }
}

/// Resolve the repository root from CLI arguments, environment or
/// auto-detection.
///
/// # Errors
///
/// Returns an error if no candidate directory contains the catalog.
pub fn resolve_root(global: &GlobalOpts) -> Result<PathBuf> {
    if let Some(ref root) = global.root {
        return absolute(root);
    }

    if let Ok(root) = std::env::var(ROOT_ENV) {
        return absolute(Path::new(&root));
    }

    // Binary installed at <root>/bin/ or built at <root>/target/<profile>/
    if let Ok(exe) = std::env::current_exe()
        && let Some(parent) = exe.parent()
    {
        for candidate in [parent.join("../.."), parent.join("..")] {
            if candidate.join(CATALOG_FILE).is_file() {
                return dunce::canonicalize(&candidate)
                    .with_context(|| format!("resolving {}", candidate.display()));
            }
        }
    }

    let cwd = std::env::current_dir()?;
    if cwd.join(CATALOG_FILE).is_file() {
        return Ok(cwd);
    }

    anyhow::bail!("cannot determine workstation root. Use --root or set {ROOT_ENV}");
}

/// Make `path` absolute against the current directory without touching the
/// filesystem. Link targets are built from these paths, so they must not be
/// relative.
fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("resolving {}", path.display()))
}

/// Resolve the deployment home directory.
///
/// # Errors
///
/// Returns an error if neither `--home` nor `HOME` is set.
pub fn resolve_home(global: &GlobalOpts) -> Result<PathBuf> {
    if let Some(ref home) = global.home {
        return absolute(home);
    }
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME environment variable is not set; use --home"))?;
    absolute(Path::new(&home))
}

/// Resolve the directory holding backup sessions.
///
/// # Errors
///
/// Returns an error if the directory cannot be made absolute.
pub fn resolve_backup_root(global: &GlobalOpts, home: &Path) -> Result<PathBuf> {
    if let Some(ref dir) = global.backup_root {
        return absolute(dir);
    }
    if let Ok(dir) = std::env::var(BACKUP_DIR_ENV) {
        return absolute(Path::new(&dir));
    }
    absolute(&default_backup_root(
        std::env::var("XDG_STATE_HOME").ok().as_deref(),
        home,
    ))
}

/// `$XDG_STATE_HOME/workstation/backups`, falling back to
/// `~/.local/state/workstation/backups`.
#[must_use]
pub fn default_backup_root(xdg_state_home: Option<&str>, home: &Path) -> PathBuf {
    xdg_state_home
        .filter(|dir| !dir.is_empty())
        .map_or_else(|| home.join(".local/state"), PathBuf::from)
        .join("workstation")
        .join("backups")
}

/// Resolve the platform from `--distro`, the environment or `/etc/os-release`.
#[must_use]
pub fn resolve_platform(global: &GlobalOpts) -> Platform {
    global
        .distro
        .clone()
        .or_else(|| std::env::var(DISTRO_ENV).ok())
        .map_or_else(Platform::detect, |id| Platform::from_distro(&id))
}

/// Run `tasks` for each component in order, print the summary, and bail if
/// any task failed.
///
/// With `ctx.strict`, processing stops at the first failed task.
///
/// # Errors
///
/// Returns an error if a component is unknown or one or more tasks recorded
/// a failure.
pub fn run_tasks_to_completion(
    tasks: &[Box<dyn Task>],
    components: &[String],
    ctx: &Context,
    log: &Logger,
) -> Result<()> {
    let config = Arc::clone(&ctx.config);
    'components: for name in components {
        let component = config.catalog.require(name)?;
        for task in tasks {
            let status = tasks::execute(task.as_ref(), ctx, component);
            if ctx.strict && status == TaskStatus::Failed {
                log.error("stopping after the first failure (--strict)");
                break 'components;
            }
        }
    }

    log.print_summary();

    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} task(s) failed");
    }
    Ok(())
}
