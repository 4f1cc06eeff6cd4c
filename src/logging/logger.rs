//! The console [`Log`] implementation with a per-run task summary.
use std::path::PathBuf;
use std::sync::Mutex;

use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET, log_file_path};
use super::types::{Log, TaskEntry, TaskStatus};

/// Logger used by every command.
///
/// Messages go through [`tracing`], so they reach the console and the run
/// log at `$XDG_CACHE_HOME/workstation/<command>.log`. Task outcomes are
/// kept in memory for [`print_summary`](Self::print_summary).
#[derive(Debug)]
pub struct Logger {
    tasks: Mutex<Vec<TaskEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a logger for `command`; the log file itself is opened by
    /// [`init_subscriber`](super::subscriber::init_subscriber).
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self::with_log_file(log_file_path(command))
    }

    /// Create a logger that reports `log_file` in its summary.
    #[must_use]
    pub const fn with_log_file(log_file: Option<PathBuf>) -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            log_file,
        }
    }

    /// Return the log file path, if available.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded task entries.
    #[must_use]
    pub fn task_entries(&self) -> Vec<TaskEntry> {
        self.tasks.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Count recorded tasks with `status`.
    #[must_use]
    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks
            .lock()
            .map_or(0, |g| g.iter().filter(|t| t.status == status).count())
    }

    /// Count the number of failed tasks.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.count(TaskStatus::Failed)
    }

    /// Log every recorded task followed by per-status totals.
    pub fn print_summary(&self) {
        let tasks = self.task_entries();
        if tasks.is_empty() {
            return;
        }

        self.stage("Summary");
        for task in &tasks {
            let suffix = task
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));
            self.info(&format!(
                "{}{} {}{suffix}\x1b[0m",
                task.status.color(),
                task.status.icon(),
                task.name
            ));
        }

        let totals: Vec<String> = TaskStatus::ALL
            .iter()
            .map(|&status| {
                let n = tasks.iter().filter(|t| t.status == status).count();
                format!("{}{n} {}\x1b[0m", status.color(), status.label())
            })
            .collect();
        self.info(&format!("{} tasks: {}", tasks.len(), totals.join(", ")));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.tasks.lock() {
            guard.push(TaskEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }
}
