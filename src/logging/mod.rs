//! Console and run-log output for every command.

mod logger;
mod subscriber;
mod types;

pub use logger::Logger;
pub use subscriber::init_subscriber;
pub use types::{Log, TaskEntry, TaskStatus};

/// Create a Logger whose events land in a log file inside a fresh temporary
/// directory, through a subscriber scoped to the current thread.
///
/// Keep the returned guard alive for the duration of the test.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (Logger, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let path = tmp.path().join("test.log");
    let file_layer = subscriber::FileLayer::open(&path, "test").expect("failed to create file layer");
    let log = Logger::with_log_file(Some(path));
    let subscriber =
        tracing_subscriber::registry().with(file_layer.with_filter(LevelFilter::DEBUG));
    let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));
    (log, tmp, guard)
}

/// A [`Log`] implementation that keeps every message in memory.
///
/// Used by unit tests that need to assert on what core code reported.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CaptureLog {
    pub(crate) lines: std::sync::Mutex<Vec<(&'static str, String)>>,
    pub(crate) tasks: std::sync::Mutex<Vec<TaskEntry>>,
}

#[cfg(test)]
impl CaptureLog {
    fn push(&self, level: &'static str, msg: &str) {
        if let Ok(mut guard) = self.lines.lock() {
            guard.push((level, msg.to_string()));
        }
    }

    /// Return every message logged at `level`.
    pub(crate) fn messages(&self, level: &str) -> Vec<String> {
        self.lines.lock().map_or_else(
            |_| vec![],
            |g| {
                g.iter()
                    .filter(|(l, _)| *l == level)
                    .map(|(_, m)| m.clone())
                    .collect()
            },
        )
    }
}

#[cfg(test)]
impl Log for CaptureLog {
    fn stage(&self, msg: &str) {
        self.push("stage", msg);
    }
    fn info(&self, msg: &str) {
        self.push("info", msg);
    }
    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }
    fn warn(&self, msg: &str) {
        self.push("warn", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
    fn dry_run(&self, msg: &str) {
        self.push("dry_run", msg);
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
