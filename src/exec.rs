//! Executors for every mutating operation the engine performs.
//!
//! Symlink creation, removals, backup copies, package installs and service
//! changes all go through an [`Executor`].  [`SystemExecutor`] performs them;
//! [`DryRunExecutor`] reports and records them without touching anything.
//! Read-only queries (metadata, `read_link`, directory walks) are never routed
//! through the executor, so a dry run still sees the real filesystem.
use anyhow::{Context as _, Result, bail};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};

use crate::logging::Log;

/// Result of a command execution.
#[derive(Debug)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited successfully.
    pub success: bool,
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Abstraction over mutating operations.
pub trait Executor: Send + Sync + fmt::Debug {
    /// Run an external command, failing on non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be spawned or exits non-zero.
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Create `path` and all missing ancestors.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Create a symlink at `link` pointing to `original`.
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be created.
    fn symlink(&self, original: &Path, link: &Path) -> Result<()>;

    /// Remove the file, symlink, or directory tree at `path`.
    ///
    /// Symlinks are removed themselves, never followed.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not exist or cannot be removed.
    fn remove(&self, path: &Path) -> Result<()>;

    /// Copy a regular file, preserving its permissions.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    fn copy_file(&self, from: &Path, to: &Path) -> Result<()>;

    /// Write `contents` to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn write_file(&self, path: &Path, contents: &str) -> Result<()>;

    /// Check if a program is available on PATH.
    fn which(&self, program: &str) -> bool;

    /// Whether this executor only records actions.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Execute a command and return the result, bailing on non-zero exit.
fn execute_checked(mut cmd: Command, label: &str) -> Result<ExecResult> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to execute: {label}"))?;
    let result = ExecResult::from(output);
    if !result.success {
        bail!(
            "{label} failed (exit {}): {}",
            result.code.unwrap_or(-1),
            result.stderr.trim()
        );
    }
    Ok(result)
}

/// Executor that performs every operation for real.
#[derive(Debug, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        execute_checked(cmd, program)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("create directory: {}", path.display()))
    }

    fn symlink(&self, original: &Path, link: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(original, link).with_context(|| {
                format!(
                    "creating symlink {} -> {}",
                    link.display(),
                    original.display()
                )
            })
        }

        #[cfg(windows)]
        {
            let result = if original.is_dir() {
                std::os::windows::fs::symlink_dir(original, link)
            } else {
                std::os::windows::fs::symlink_file(original, link)
            };
            result.with_context(|| {
                format!(
                    "creating symlink {} -> {}",
                    link.display(),
                    original.display()
                )
            })
        }
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let meta = std::fs::symlink_metadata(path)
            .with_context(|| format!("reading metadata: {}", path.display()))?;
        if meta.is_dir() {
            std::fs::remove_dir_all(path)
                .with_context(|| format!("removing directory: {}", path.display()))
        } else {
            std::fs::remove_file(path).with_context(|| format!("removing: {}", path.display()))
        }
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        std::fs::copy(from, to)
            .map(|_| ())
            .with_context(|| format!("copying {} to {}", from.display(), to.display()))
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// A mutating action captured by [`DryRunExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// An external command.
    Run {
        /// Program name.
        program: String,
        /// Arguments.
        args: Vec<String>,
    },
    /// Directory creation.
    CreateDir(PathBuf),
    /// Symlink creation.
    Symlink {
        /// What the link points to.
        original: PathBuf,
        /// Where the link is created.
        link: PathBuf,
    },
    /// Removal of a file, symlink, or directory tree.
    Remove(PathBuf),
    /// File copy.
    Copy {
        /// Copy source.
        from: PathBuf,
        /// Copy destination.
        to: PathBuf,
    },
    /// File write.
    Write(PathBuf),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run { program, args } => write!(f, "run: {program} {}", args.join(" ")),
            Self::CreateDir(path) => write!(f, "create directory {}", path.display()),
            Self::Symlink { original, link } => {
                write!(f, "link {} -> {}", link.display(), original.display())
            }
            Self::Remove(path) => write!(f, "remove {}", path.display()),
            Self::Copy { from, to } => write!(f, "copy {} to {}", from.display(), to.display()),
            Self::Write(path) => write!(f, "write {}", path.display()),
        }
    }
}

/// Executor that logs and records every action without performing it.
pub struct DryRunExecutor {
    log: Arc<dyn Log>,
    actions: Mutex<Vec<Action>>,
}

impl fmt::Debug for DryRunExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DryRunExecutor")
            .field("log", &"<dyn Log>")
            .field("actions", &self.actions)
            .finish()
    }
}

impl DryRunExecutor {
    /// Create a dry-run executor reporting through `log`.
    #[must_use]
    pub fn new(log: Arc<dyn Log>) -> Self {
        Self {
            log,
            actions: Mutex::new(Vec::new()),
        }
    }

    /// Return every action recorded so far, in order.
    #[must_use]
    pub fn actions(&self) -> Vec<Action> {
        self.actions
            .lock()
            .map_or_else(|_| vec![], |guard| guard.clone())
    }

    fn record(&self, action: Action) {
        self.log.dry_run(&action.to_string());
        self.actions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(action);
    }
}

impl Executor for DryRunExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        self.record(Action::Run {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
        });
        Ok(ExecResult {
            stdout: String::new(),
            stderr: String::new(),
            success: true,
            code: Some(0),
        })
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.record(Action::CreateDir(path.to_path_buf()));
        Ok(())
    }

    fn symlink(&self, original: &Path, link: &Path) -> Result<()> {
        self.record(Action::Symlink {
            original: original.to_path_buf(),
            link: link.to_path_buf(),
        });
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.record(Action::Remove(path.to_path_buf()));
        Ok(())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        self.record(Action::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
        Ok(())
    }

    fn write_file(&self, path: &Path, _contents: &str) -> Result<()> {
        self.record(Action::Write(path.to_path_buf()));
        Ok(())
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}
