//! Tracing subscriber setup: console formatter, run log file, and initialisation.
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Target used for stage headers.
pub(super) const STAGE_TARGET: &str = "workstation::stage";
/// Target used for dry-run action lines.
pub(super) const DRY_RUN_TARGET: &str = "workstation::dry_run";

/// Return the run log path `$XDG_CACHE_HOME/workstation/<command>.log`
/// (falling back to `~/.cache`), creating the directory if needed.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    let cache = std::env::var_os("XDG_CACHE_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".cache")))?;
    let dir = cache.join("workstation");
    fs::create_dir_all(&dir).ok()?;
    Some(dir.join(format!("{command}.log")))
}

/// Remove ANSI CSI sequences so the log file stays plain text.
fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            // Final byte of a CSI sequence is in '@'..='~'.
            for inner in chars.by_ref() {
                if ('@'..='~').contains(&inner) {
                    break;
                }
            }
        }
    }
    out
}

/// Tag written in the second column of a log file line.
fn file_tag(level: tracing::Level, target: &str) -> &'static str {
    match (level, target) {
        (tracing::Level::INFO, STAGE_TARGET) => "stage",
        (tracing::Level::INFO, DRY_RUN_TARGET) => "dry-run",
        (tracing::Level::ERROR, _) => "error",
        (tracing::Level::WARN, _) => "warn",
        (tracing::Level::INFO, _) => "info",
        _ => "debug",
    }
}

/// Extracts the `message` field from a [`tracing::Event`].
#[derive(Default)]
struct MessageExtractor {
    message: String,
}

impl MessageExtractor {
    fn of(event: &tracing::Event<'_>) -> String {
        let mut extractor = Self::default();
        event.record(&mut extractor);
        extractor.message
    }
}

impl tracing::field::Visit for MessageExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

/// A [`tracing_subscriber::Layer`] that appends every event to the run log.
///
/// Lines look like `[12:00:01] warn    message`, without colour codes.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Open the run log for `command` under the cache directory.
    pub(super) fn new(command: &str) -> Option<Self> {
        Self::open(&log_file_path(command)?, command)
    }

    /// Truncate `path`, write a header naming `command`, and append from there.
    pub(super) fn open(path: &Path, command: &str) -> Option<Self> {
        let header = format!(
            "# workstation {} {command} started {}\n",
            crate::VERSION,
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        );
        fs::write(path, header).ok()?;
        let file = fs::OpenOptions::new().append(true).open(path).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        let tag = file_tag(*metadata.level(), metadata.target());
        let msg = strip_ansi(&MessageExtractor::of(event));
        let ts = chrono::Utc::now().format("%H:%M:%S");

        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "[{ts}] {tag:<7} {msg}").ok();
        }
    }
}

/// A [`tracing_subscriber::fmt::FormatEvent`] that emits the console style.
struct ConsoleFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let msg = MessageExtractor::of(event);

        match (*metadata.level(), metadata.target()) {
            (tracing::Level::ERROR, _) => writeln!(writer, "\x1b[31merror:\x1b[0m {msg}"),
            (tracing::Level::WARN, _) => writeln!(writer, "\x1b[33mwarning:\x1b[0m {msg}"),
            (tracing::Level::INFO, STAGE_TARGET) => {
                writeln!(writer, "\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m")
            }
            (tracing::Level::INFO, DRY_RUN_TARGET) => {
                writeln!(writer, "  \x1b[36m(dry run)\x1b[0m {msg}")
            }
            (tracing::Level::INFO, _) => writeln!(writer, "  {msg}"),
            _ => writeln!(writer, "  \x1b[2m{msg}\x1b[0m"),
        }
    }
}

/// Initialise the global [`tracing`] subscriber.
///
/// Warnings and errors go to stderr, everything else to stdout; `debug`
/// reaches the console only with `verbose` but always lands in the run log.
/// Must be called once at program startup, before any logging.
pub fn init_subscriber(verbose: bool, command: &str) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let make_writer = std::io::stderr
        .with_max_level(tracing::Level::WARN)
        .and(std::io::stdout.with_min_level(tracing::Level::INFO));

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(make_writer)
        .with_filter(console_level);

    let file_layer = FileLayer::new(command).map(|l| l.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_ansi_removes_sequences() {
        assert_eq!(strip_ansi("\x1b[31merror:\x1b[0m hi"), "error: hi");
        assert_eq!(strip_ansi("\x1b[2;5Htext"), "text");
        assert_eq!(strip_ansi("plain"), "plain");
        assert_eq!(strip_ansi(""), "");
    }

    #[test]
    fn tags_follow_level_and_target() {
        assert_eq!(file_tag(tracing::Level::INFO, STAGE_TARGET), "stage");
        assert_eq!(file_tag(tracing::Level::INFO, DRY_RUN_TARGET), "dry-run");
        assert_eq!(file_tag(tracing::Level::INFO, "workstation_cli"), "info");
        assert_eq!(file_tag(tracing::Level::TRACE, "x"), "debug");
    }
}
