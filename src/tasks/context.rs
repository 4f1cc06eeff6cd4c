use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::config::catalog::Component;
use crate::exec::Executor;
use crate::logging::Log;
use crate::platform::Platform;
use crate::resources::backup::BackupManager;
use crate::resources::policy::PolicyDecider;

/// Shared context for task execution.
pub struct Context {
    /// Repository configuration and catalog.
    pub config: Arc<Config>,
    /// Detected platform information.
    pub platform: Arc<Platform>,
    /// Logger for output and task recording.
    pub log: Arc<dyn Log>,
    /// Whether mutating actions are only reported.
    pub dry_run: bool,
    /// Command and filesystem executor.
    pub executor: Arc<dyn Executor>,
    /// Backup sessions for replaced targets.
    pub backups: Arc<BackupManager>,
    /// Conflict policy for occupied targets.
    pub decider: Arc<PolicyDecider>,
    /// Stop a component's deployment at its first failed mapping.
    pub strict: bool,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &"<Config>")
            .field("platform", &self.platform)
            .field("log", &"<dyn Log>")
            .field("dry_run", &self.dry_run)
            .field("executor", &self.executor)
            .field("backups", &self.backups)
            .field("decider", &self.decider)
            .field("strict", &self.strict)
            .finish()
    }
}

impl Context {
    /// Create a context; `dry_run` follows the executor.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        platform: Arc<Platform>,
        log: Arc<dyn Log>,
        executor: Arc<dyn Executor>,
        backups: Arc<BackupManager>,
        decider: Arc<PolicyDecider>,
    ) -> Self {
        Self {
            dry_run: executor.is_dry_run(),
            config,
            platform,
            log,
            executor,
            backups,
            decider,
            strict: false,
        }
    }

    /// Stop deployments at the first failure.
    #[must_use]
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Replace the logger (used by tests to capture output).
    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn Log>) -> Self {
        self.log = log;
        self
    }

    /// Deployment home directory.
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.config.home
    }

    /// Source tree of `component`.
    #[must_use]
    pub fn component_dir(&self, component: &Component) -> PathBuf {
        self.config.component_dir(component)
    }
}
