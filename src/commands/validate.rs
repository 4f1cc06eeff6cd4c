//! Command: check the catalog and component trees.
use anyhow::Result;

use super::CommandSetup;
use crate::cli::GlobalOpts;
use crate::config::validation::{Severity, ValidationFinding, has_errors};
use crate::logging::{Log, Logger};

/// Log each finding at the level matching its severity and return the
/// summary line.
fn report(findings: &[ValidationFinding], log: &dyn Log) -> String {
    let (mut errors, mut warnings, mut infos) = (0usize, 0usize, 0usize);
    for finding in findings {
        let line = finding.to_string();
        match finding.severity {
            Severity::Error => {
                errors += 1;
                log.error(&line);
            }
            Severity::Warning => {
                warnings += 1;
                log.warn(&line);
            }
            Severity::Info => {
                infos += 1;
                log.info(&line);
            }
        }
    }
    format!("{errors} error(s), {warnings} warning(s), {infos} note(s)")
}

/// Run the validate command.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded or any error-level
/// finding exists.
pub fn run(global: &GlobalOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;

    log.stage("Validating catalog");
    let findings = setup.config.validate();
    let summary = report(&findings, log);
    log.info(&summary);

    if has_errors(&findings) {
        anyhow::bail!("catalog validation failed: {summary}");
    }
    Ok(())
}
