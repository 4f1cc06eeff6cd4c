//! Core logging types: task entries, status, and the [`Log`] trait.

/// One `<component>: <task>` outcome kept for the run summary.
#[derive(Debug, Clone)]
pub struct TaskEntry {
    /// Task label, e.g. `kitty: deploy config`.
    pub name: String,
    /// Final status of the task.
    pub status: TaskStatus,
    /// Skip reason or error chain, if any.
    pub message: Option<String>,
}

/// Status of a completed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Task completed successfully.
    Ok,
    /// Task does not apply to this component (nothing to install or deploy).
    NotApplicable,
    /// Task ran but deliberately left something untouched.
    Skipped,
    /// Task ran in dry-run mode; no changes were applied.
    DryRun,
    /// Task encountered an error and could not complete.
    Failed,
}

impl TaskStatus {
    /// Every status, in summary order.
    pub const ALL: [Self; 5] = [
        Self::Ok,
        Self::NotApplicable,
        Self::Skipped,
        Self::DryRun,
        Self::Failed,
    ];

    /// Short label used in the summary totals.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NotApplicable => "n/a",
            Self::Skipped => "skipped",
            Self::DryRun => "dry-run",
            Self::Failed => "failed",
        }
    }

    /// Console icon for a summary line.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Ok => "✓",
            Self::NotApplicable => "·",
            Self::Skipped => "○",
            Self::DryRun => "~",
            Self::Failed => "✗",
        }
    }

    /// ANSI SGR prefix for this status.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Ok => "\x1b[32m",
            Self::NotApplicable => "\x1b[2m",
            Self::Skipped => "\x1b[33m",
            Self::DryRun => "\x1b[37m",
            Self::Failed => "\x1b[31m",
        }
    }
}

/// Abstraction over logging backends.
///
/// Resolution, deployment and backup code report through this trait so they
/// never write to the console directly.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log an action that would have been taken without `--dry-run`.
    fn dry_run(&self, msg: &str);
    /// Record a task result for the summary.
    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>);
}
