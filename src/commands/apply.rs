use anyhow::{Result, bail};
use std::sync::Arc;

use super::{CommandSetup, run_tasks_to_completion};
use crate::cli::{ApplyOpts, GlobalOpts};
use crate::graph::{ConflictReport, detect_conflicts, resolve};
use crate::logging::{Log, Logger};
use crate::prompt::{self, Prompter};
use crate::tasks;

/// Whether to continue after conflicts were reported.
///
/// # Errors
///
/// Returns an error if the run must stop: conflicts without `--force` in a
/// non-interactive run, or a declined confirmation.
fn confirm_conflicts(
    report: &ConflictReport,
    force: bool,
    interactive: bool,
    prompter: &dyn Prompter,
    log: &dyn Log,
) -> Result<()> {
    if report.is_empty() {
        log.debug("no conflicts");
        return Ok(());
    }

    for conflict in report.iter() {
        log.warn(&conflict.to_string());
    }

    if force {
        log.warn("continuing despite conflicts (--force)");
        return Ok(());
    }
    if !interactive {
        bail!(
            "{} conflict(s) found; rerun with --force to apply anyway",
            report.len()
        );
    }
    if !prompter.ask_yes_no("Components conflict. Apply anyway?", false)? {
        bail!("aborted: conflicting components");
    }
    Ok(())
}

/// Run the apply command.
///
/// # Errors
///
/// Returns an error if resolution fails, conflicts stop the run, or any task
/// fails.
pub fn run(global: &GlobalOpts, opts: &ApplyOpts, log: &Arc<Logger>) -> Result<()> {
    log.info(&format!("workstation {}", crate::VERSION));
    let setup = CommandSetup::init(global, log.as_ref())?;
    let catalog = &setup.config.catalog;

    log.stage("Resolving components");
    let resolution = resolve(catalog, &opts.components)?;
    if !resolution.added.is_empty() {
        log.info(&format!(
            "adding dependencies: {}",
            resolution.added.join(", ")
        ));
    }
    log.info(&format!("installation set: {}", resolution.resolved.join(", ")));

    log.stage("Checking conflicts");
    let prompter: Arc<dyn Prompter> = Arc::from(prompt::select_prompter(global.yes));
    let report = detect_conflicts(catalog, &resolution.resolved);
    confirm_conflicts(
        &report,
        opts.force,
        prompt::is_interactive(global.yes),
        prompter.as_ref(),
        log.as_ref(),
    )?;

    let ctx = setup
        .context(
            global,
            Arc::clone(log) as Arc<dyn Log>,
            opts.on_conflict,
            prompter,
        )
        .with_strict(opts.strict);

    let result = run_tasks_to_completion(
        &tasks::apply_tasks(opts.skip_packages),
        &resolution.resolved,
        &ctx,
        log,
    );

    if let Some(session) = ctx.backups.active_session() {
        log.info(&format!(
            "backup session: {} ({})",
            session.id,
            session.dir.display()
        ));
    }
    if ctx.dry_run {
        log.info("dry run: no changes were made");
    }
    result
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::catalog::Catalog;
    use crate::logging::CaptureLog;
    use crate::prompt::MockPrompter;

    fn conflicting_report() -> ConflictReport {
        let catalog = Catalog::from_toml_str(
            "[kitty]\nconflicts = [\"alacritty\"]\n[alacritty]\n",
            "test",
        )
        .unwrap();
        detect_conflicts(&catalog, &["kitty".to_string(), "alacritty".to_string()])
    }

    #[test]
    fn no_conflicts_never_prompts() {
        let mut prompter = MockPrompter::new();
        prompter.expect_ask_yes_no().never();
        let log = CaptureLog::default();
        confirm_conflicts(&ConflictReport::default(), false, true, &prompter, &log).unwrap();
    }

    #[test]
    fn non_interactive_conflicts_abort_without_force() {
        let mut prompter = MockPrompter::new();
        prompter.expect_ask_yes_no().never();
        let log = CaptureLog::default();
        let err = confirm_conflicts(&conflicting_report(), false, false, &prompter, &log)
            .unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert_eq!(log.messages("warn"), ["kitty conflicts with alacritty"]);
    }

    #[test]
    fn force_continues() {
        let prompter = MockPrompter::new();
        let log = CaptureLog::default();
        confirm_conflicts(&conflicting_report(), true, false, &prompter, &log).unwrap();
    }

    #[test]
    fn interactive_answer_decides() {
        let mut yes = MockPrompter::new();
        yes.expect_ask_yes_no().times(1).returning(|_, _| Ok(true));
        let log = CaptureLog::default();
        confirm_conflicts(&conflicting_report(), false, true, &yes, &log).unwrap();

        let mut no = MockPrompter::new();
        no.expect_ask_yes_no().times(1).returning(|_, _| Ok(false));
        assert!(confirm_conflicts(&conflicting_report(), false, true, &no, &log).is_err());
    }
}
