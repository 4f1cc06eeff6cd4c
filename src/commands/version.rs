//! Command: print version information.
use crate::logging::{Log, Logger};

/// Print the workstation version.
pub fn run(log: &Logger) {
    log.info(&format!("workstation {}", crate::VERSION));
}
