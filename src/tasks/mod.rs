//! Per-component units of work run by `apply` and `remove`.
mod context;
pub mod packages;
pub mod services;
pub mod symlinks;

pub use context::Context;

use anyhow::Result;

use crate::config::catalog::Component;
use crate::logging::TaskStatus;

/// Result of a single task execution.
///
/// # Examples
///
/// ```
/// use workstation_cli::tasks::TaskResult;
///
/// let ok = TaskResult::Ok;
/// let skipped = TaskResult::Skipped("no packages for gentoo".into());
/// let dry = TaskResult::DryRun;
///
/// assert!(matches!(ok, TaskResult::Ok));
/// assert!(matches!(skipped, TaskResult::Skipped(_)));
/// assert!(matches!(dry, TaskResult::DryRun));
/// ```
#[derive(Debug, Clone)]
pub enum TaskResult {
    /// Task completed successfully.
    Ok,
    /// Task ran but left something untouched.
    Skipped(String),
    /// Task ran in dry-run mode.
    DryRun,
}

/// A named step applied to one component.
pub trait Task: Send + Sync {
    /// Human-readable task name.
    fn name(&self) -> &str;

    /// Whether this task has anything to do for `component`.
    fn should_run(&self, ctx: &Context, component: &Component) -> bool;

    /// Execute the task for `component`.
    ///
    /// # Errors
    ///
    /// Returns an error if an external command fails or the component's
    /// configuration cannot be deployed.
    fn run(&self, ctx: &Context, component: &Component) -> Result<TaskResult>;
}

/// Tasks run by `apply`, in order, for each component.
#[must_use]
pub fn apply_tasks(skip_packages: bool) -> Vec<Box<dyn Task>> {
    let mut tasks: Vec<Box<dyn Task>> = Vec::new();
    if !skip_packages {
        tasks.push(Box::new(packages::InstallPackages));
    }
    tasks.push(Box::new(symlinks::DeployConfig));
    tasks.push(Box::new(services::EnableServices));
    tasks
}

/// Tasks run by `remove`, in order, for each component.
#[must_use]
pub fn remove_tasks() -> Vec<Box<dyn Task>> {
    vec![
        Box::new(services::DisableServices),
        Box::new(symlinks::RemoveConfig),
    ]
}

/// Execute a task for `component`, recording the result in the logger.
pub fn execute(task: &dyn Task, ctx: &Context, component: &Component) -> TaskStatus {
    let name = format!("{}: {}", component.name, task.name());

    if !task.should_run(ctx, component) {
        ctx.log
            .debug(&format!("skipping task: {name} (not applicable)"));
        ctx.log.record_task(&name, TaskStatus::NotApplicable, None);
        return TaskStatus::NotApplicable;
    }

    ctx.log.stage(&name);

    match task.run(ctx, component) {
        Ok(TaskResult::Ok) => {
            ctx.log.record_task(&name, TaskStatus::Ok, None);
            TaskStatus::Ok
        }
        Ok(TaskResult::Skipped(reason)) => {
            ctx.log.info(&format!("skipped: {reason}"));
            ctx.log.record_task(&name, TaskStatus::Skipped, Some(&reason));
            TaskStatus::Skipped
        }
        Ok(TaskResult::DryRun) => {
            ctx.log.record_task(&name, TaskStatus::DryRun, None);
            TaskStatus::DryRun
        }
        Err(e) => {
            ctx.log.error(&format!("{name}: {e:#}"));
            ctx.log
                .record_task(&name, TaskStatus::Failed, Some(&format!("{e:#}")));
            TaskStatus::Failed
        }
    }
}

/// Shared helpers for task unit tests.
#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub mod test_helpers {
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use crate::config::Config;
    use crate::config::catalog::{Catalog, Component};
    use crate::exec::{ExecResult, Executor, SystemExecutor};
    use crate::logging::CaptureLog;
    use crate::platform::Platform;
    use crate::prompt::AutoPrompter;
    use crate::resources::backup::BackupManager;
    use crate::resources::policy::{ConflictMode, PolicyDecider};

    use super::Context;

    /// Executor that records external commands instead of running them and
    /// performs filesystem operations for real.
    #[derive(Debug, Default)]
    pub struct RecordingExecutor {
        /// Value returned by `which()` regardless of program name.
        pub which_result: bool,
        /// Every command line passed to `run()`.
        pub commands: Mutex<Vec<String>>,
        /// Programs whose invocation fails.
        pub failing: Vec<String>,
    }

    impl RecordingExecutor {
        /// Executor whose `which()` answers `which_result`.
        #[must_use]
        pub fn with_which(which_result: bool) -> Self {
            Self {
                which_result,
                ..Self::default()
            }
        }

        /// Recorded command lines.
        #[must_use]
        pub fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl Executor for RecordingExecutor {
        fn run(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
            self.commands
                .lock()
                .unwrap()
                .push(format!("{program} {}", args.join(" ")));
            if self.failing.iter().any(|p| p == program) {
                anyhow::bail!("{program} failed (exit 1): boom");
            }
            Ok(ExecResult {
                stdout: String::new(),
                stderr: String::new(),
                success: true,
                code: Some(0),
            })
        }

        fn create_dir_all(&self, path: &Path) -> anyhow::Result<()> {
            SystemExecutor.create_dir_all(path)
        }

        fn symlink(&self, original: &Path, link: &Path) -> anyhow::Result<()> {
            SystemExecutor.symlink(original, link)
        }

        fn remove(&self, path: &Path) -> anyhow::Result<()> {
            SystemExecutor.remove(path)
        }

        fn copy_file(&self, from: &Path, to: &Path) -> anyhow::Result<()> {
            SystemExecutor.copy_file(from, to)
        }

        fn write_file(&self, path: &Path, contents: &str) -> anyhow::Result<()> {
            SystemExecutor.write_file(path, contents)
        }

        fn which(&self, _program: &str) -> bool {
            self.which_result
        }
    }

    /// Temporary repository, home and backup root.
    #[derive(Debug)]
    pub struct Fixture {
        /// Keeps the directories alive.
        pub dir: tempfile::TempDir,
        /// Repository root.
        pub root: PathBuf,
        /// Home directory.
        pub home: PathBuf,
        /// Backup root.
        pub backups: PathBuf,
    }

    impl Fixture {
        /// Create empty directories.
        #[must_use]
        pub fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("repo");
            let home = dir.path().join("home");
            let backups = dir.path().join("backups");
            std::fs::create_dir_all(root.join(crate::config::COMPONENTS_DIR)).unwrap();
            std::fs::create_dir_all(&home).unwrap();
            Self {
                dir,
                root,
                home,
                backups,
            }
        }

        /// Write `contents` to `components/<component>/<relative>`.
        pub fn source_file(&self, component: &str, relative: &str, contents: &str) -> PathBuf {
            let path = self
                .root
                .join(crate::config::COMPONENTS_DIR)
                .join(component)
                .join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, contents).unwrap();
            path
        }

        /// Config for `components`.
        #[must_use]
        pub fn config(&self, components: Vec<Component>) -> Config {
            Config {
                root: self.root.clone(),
                home: self.home.clone(),
                backup_root: self.backups.clone(),
                catalog: Catalog::new(components, std::collections::BTreeMap::new()),
            }
        }
    }

    /// A component with only a name.
    #[must_use]
    pub fn component(name: &str) -> Component {
        Component {
            name: name.to_string(),
            ..Component::default()
        }
    }

    /// Build a context using `executor`, capturing log output.
    #[must_use]
    pub fn make_context(
        config: Config,
        distro: &str,
        executor: Arc<dyn Executor>,
        mode: ConflictMode,
    ) -> (Context, Arc<CaptureLog>) {
        let log = Arc::new(CaptureLog::default());
        let backups = Arc::new(BackupManager::new(
            config.backup_root.clone(),
            config.home.clone(),
            Arc::clone(&executor),
        ));
        let decider = Arc::new(PolicyDecider::new(mode, Arc::new(AutoPrompter::default())));
        let ctx = Context::new(
            Arc::new(config),
            Arc::new(Platform::from_distro(distro)),
            Arc::clone(&log) as Arc<dyn crate::logging::Log>,
            executor,
            backups,
            decider,
        );
        (ctx, log)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::resources::policy::ConflictMode;
    use std::sync::Arc;
    use test_helpers::{Fixture, RecordingExecutor, component, make_context};

    struct MockTask {
        should_run: bool,
        result: Result<TaskResult, String>,
    }

    impl Task for MockTask {
        fn name(&self) -> &'static str {
            "mock"
        }
        fn should_run(&self, _ctx: &Context, _component: &Component) -> bool {
            self.should_run
        }
        fn run(&self, _ctx: &Context, _component: &Component) -> Result<TaskResult> {
            self.result.clone().map_err(|s| anyhow::anyhow!("{s}"))
        }
    }

    fn run_mock(should_run: bool, result: Result<TaskResult, String>) -> (TaskStatus, Vec<crate::logging::TaskEntry>) {
        let fixture = Fixture::new();
        let (ctx, log) = make_context(
            fixture.config(vec![]),
            "arch",
            Arc::new(RecordingExecutor::default()),
            ConflictMode::Backup,
        );
        let status = execute(&MockTask { should_run, result }, &ctx, &component("zsh"));
        let tasks = log.tasks.lock().unwrap().clone();
        (status, tasks)
    }

    #[test]
    fn execute_records_component_scoped_name() {
        let (status, tasks) = run_mock(true, Ok(TaskResult::Ok));
        assert_eq!(status, TaskStatus::Ok);
        assert_eq!(tasks[0].name, "zsh: mock");
    }

    #[test]
    fn execute_skips_non_applicable_task() {
        let (status, tasks) = run_mock(false, Ok(TaskResult::Ok));
        assert_eq!(status, TaskStatus::NotApplicable);
        assert_eq!(tasks[0].status, TaskStatus::NotApplicable);
    }

    #[test]
    fn execute_records_failure_message() {
        let (status, tasks) = run_mock(true, Err("kaboom".to_string()));
        assert_eq!(status, TaskStatus::Failed);
        assert_eq!(tasks[0].message.as_deref(), Some("kaboom"));
    }

    #[test]
    fn execute_records_skip_reason() {
        let (status, tasks) = run_mock(true, Ok(TaskResult::Skipped("nothing".to_string())));
        assert_eq!(status, TaskStatus::Skipped);
        assert_eq!(tasks[0].message.as_deref(), Some("nothing"));
    }

    #[test]
    fn skip_packages_drops_install_task() {
        let names: Vec<String> = apply_tasks(true)
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert!(!names.iter().any(|n| n == "install packages"));
        assert_eq!(apply_tasks(false).len(), names.len() + 1);
    }
}
