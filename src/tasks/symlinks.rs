use anyhow::{Result, bail};

use super::{Context, Task, TaskResult};
use crate::config::catalog::Component;
use crate::resources::mapping::ConfigMapping;
use crate::resources::symlink::{DeployOutcome, DeploySummary, RemoveOutcome, SymlinkResource};

/// Log a single deployment outcome at a level matching its severity.
fn report(ctx: &Context, mapping: &ConfigMapping, outcome: &DeployOutcome) {
    let target = mapping.target.display();
    match outcome {
        DeployOutcome::AlreadyCorrect => ctx.log.debug(&format!("ok: {target}")),
        DeployOutcome::Created
        | DeployOutcome::BackedUpAndReplaced { .. }
        | DeployOutcome::Overwritten => ctx.log.info(&format!("{target}: {outcome}")),
        DeployOutcome::Skipped { .. } => ctx.log.warn(&format!("{target}: {outcome}")),
        DeployOutcome::Failed { .. } => ctx.log.error(&format!("{target}: {outcome}")),
    }
}

/// Link every file of a component's source tree into the home directory.
#[derive(Debug)]
pub struct DeployConfig;

impl Task for DeployConfig {
    fn name(&self) -> &'static str {
        "deploy config"
    }

    fn should_run(&self, ctx: &Context, component: &Component) -> bool {
        ctx.component_dir(component).is_dir()
    }

    fn run(&self, ctx: &Context, component: &Component) -> Result<TaskResult> {
        let mappings = ctx.config.mappings(component)?;
        if mappings.is_empty() {
            return Ok(TaskResult::Skipped("no configuration files".to_string()));
        }

        let mut summary = DeploySummary::default();
        for mapping in &mappings {
            let resource = SymlinkResource::new(mapping.source.clone(), mapping.target.clone());
            let outcome = resource.deploy(
                ctx.executor.as_ref(),
                &ctx.backups,
                Some(&component.name),
                |current| ctx.decider.decide(&mapping.target, current),
            );
            report(ctx, mapping, &outcome);
            summary.record(&outcome);

            if ctx.strict
                && let DeployOutcome::Failed { reason } = &outcome
            {
                bail!(
                    "stopped at first failure ({}): {reason}",
                    mapping.target.display()
                );
            }
        }

        ctx.log.info(&summary.to_string());

        if summary.failed > 0 {
            bail!("{} of {} mappings failed", summary.failed, mappings.len());
        }
        if ctx.dry_run {
            return Ok(TaskResult::DryRun);
        }
        if summary.skipped > 0 {
            return Ok(TaskResult::Skipped(format!(
                "{} occupied target(s) left untouched",
                summary.skipped
            )));
        }
        Ok(TaskResult::Ok)
    }
}

/// Remove every managed link of a component; foreign files stay.
#[derive(Debug)]
pub struct RemoveConfig;

impl Task for RemoveConfig {
    fn name(&self) -> &'static str {
        "remove config"
    }

    fn should_run(&self, ctx: &Context, component: &Component) -> bool {
        ctx.component_dir(component).is_dir()
    }

    fn run(&self, ctx: &Context, component: &Component) -> Result<TaskResult> {
        let root = ctx.component_dir(component);
        let mappings = ctx.config.mappings(component)?;

        let mut removed = 0usize;
        let mut foreign = 0usize;
        let mut failed = 0usize;
        for mapping in &mappings {
            let resource = SymlinkResource::new(mapping.source.clone(), mapping.target.clone());
            let target = mapping.target.display();
            match resource.remove_managed(ctx.executor.as_ref(), &root) {
                RemoveOutcome::Removed => {
                    ctx.log.info(&format!("removed {target}"));
                    removed += 1;
                }
                RemoveOutcome::Absent => ctx.log.debug(&format!("absent: {target}")),
                RemoveOutcome::NotManaged { reason } => {
                    ctx.log.warn(&format!("leaving {target}: {reason}"));
                    foreign += 1;
                }
                RemoveOutcome::Failed { reason } => {
                    ctx.log.error(&format!("failed to remove {target}: {reason}"));
                    failed += 1;
                }
            }
        }

        ctx.log.info(&format!(
            "{removed} removed, {foreign} left untouched, {failed} failed"
        ));
        if failed > 0 {
            bail!("{failed} of {} links could not be removed", mappings.len());
        }
        if ctx.dry_run {
            return Ok(TaskResult::DryRun);
        }
        Ok(TaskResult::Ok)
    }
}

#[cfg(test)]
#[cfg(unix)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::{DryRunExecutor, Executor, SystemExecutor};
    use crate::logging::CaptureLog;
    use crate::resources::policy::ConflictMode;
    use crate::tasks::test_helpers::{Fixture, component, make_context};
    use std::sync::Arc;

    fn kitty_fixture() -> Fixture {
        let fixture = Fixture::new();
        fixture.source_file("kitty", ".config/kitty/kitty.conf", "font_size 11");
        fixture.source_file("kitty", ".config/kitty/theme.conf", "dark");
        fixture
    }

    #[test]
    fn deploy_creates_links() {
        let fixture = kitty_fixture();
        let (ctx, _) = make_context(
            fixture.config(vec![component("kitty")]),
            "arch",
            Arc::new(SystemExecutor),
            ConflictMode::Backup,
        );
        let result = DeployConfig.run(&ctx, &component("kitty")).unwrap();
        assert!(matches!(result, TaskResult::Ok));

        let link = fixture.home.join(".config/kitty/kitty.conf");
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_to_string(link).unwrap(), "font_size 11");
    }

    #[test]
    fn deploy_twice_is_idempotent() {
        let fixture = kitty_fixture();
        let (ctx, log) = make_context(
            fixture.config(vec![component("kitty")]),
            "arch",
            Arc::new(SystemExecutor),
            ConflictMode::Backup,
        );
        DeployConfig.run(&ctx, &component("kitty")).unwrap();
        DeployConfig.run(&ctx, &component("kitty")).unwrap();
        let infos = log.messages("info");
        assert_eq!(
            infos.last().unwrap(),
            "0 created, 2 already correct, 0 backed up, 0 overwritten, 0 skipped, 0 failed"
        );
        assert!(ctx.backups.active_session().is_none());
    }

    #[test]
    fn skip_mode_leaves_existing_file() {
        let fixture = kitty_fixture();
        let existing = fixture.home.join(".config/kitty/kitty.conf");
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, "mine").unwrap();

        let (ctx, log) = make_context(
            fixture.config(vec![component("kitty")]),
            "arch",
            Arc::new(SystemExecutor),
            ConflictMode::Skip,
        );
        let result = DeployConfig.run(&ctx, &component("kitty")).unwrap();
        assert!(matches!(result, TaskResult::Skipped(_)));
        assert_eq!(std::fs::read_to_string(&existing).unwrap(), "mine");
        assert_eq!(log.messages("warn").len(), 1);
    }

    #[test]
    fn backup_mode_saves_existing_file() {
        let fixture = kitty_fixture();
        let existing = fixture.home.join(".config/kitty/kitty.conf");
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, "mine").unwrap();

        let (ctx, _) = make_context(
            fixture.config(vec![component("kitty")]),
            "arch",
            Arc::new(SystemExecutor),
            ConflictMode::Backup,
        );
        DeployConfig.run(&ctx, &component("kitty")).unwrap();

        let session = ctx.backups.active_session().unwrap();
        let copy = session.dir.join("home/.config/kitty/kitty.conf");
        assert_eq!(std::fs::read_to_string(copy).unwrap(), "mine");
        assert_eq!(std::fs::read_to_string(&existing).unwrap(), "font_size 11");
    }

    #[test]
    fn dry_run_leaves_home_untouched() {
        let fixture = kitty_fixture();
        let log = Arc::new(CaptureLog::default());
        let exec: Arc<dyn Executor> = Arc::new(DryRunExecutor::new(
            Arc::clone(&log) as Arc<dyn crate::logging::Log>,
        ));
        let (ctx, _) = make_context(
            fixture.config(vec![component("kitty")]),
            "arch",
            exec,
            ConflictMode::Backup,
        );
        let result = DeployConfig.run(&ctx, &component("kitty")).unwrap();
        assert!(matches!(result, TaskResult::DryRun));
        assert!(!fixture.home.join(".config").exists());
        assert!(
            log.messages("dry_run")
                .iter()
                .any(|m| m.starts_with("link ") && m.contains("kitty.conf"))
        );
    }

    #[test]
    fn missing_source_tree_is_not_applicable() {
        let fixture = Fixture::new();
        let (ctx, _) = make_context(
            fixture.config(vec![component("ghost")]),
            "arch",
            Arc::new(SystemExecutor),
            ConflictMode::Backup,
        );
        assert!(!DeployConfig.should_run(&ctx, &component("ghost")));
    }

    #[test]
    fn remove_only_touches_managed_links() {
        let fixture = kitty_fixture();
        let (ctx, _) = make_context(
            fixture.config(vec![component("kitty")]),
            "arch",
            Arc::new(SystemExecutor),
            ConflictMode::Backup,
        );
        DeployConfig.run(&ctx, &component("kitty")).unwrap();

        let theme = fixture.home.join(".config/kitty/theme.conf");
        std::fs::remove_file(&theme).unwrap();
        std::fs::write(&theme, "local").unwrap();

        let (ctx, log) = make_context(
            fixture.config(vec![component("kitty")]),
            "arch",
            Arc::new(SystemExecutor),
            ConflictMode::Backup,
        );
        let result = RemoveConfig.run(&ctx, &component("kitty")).unwrap();
        assert!(matches!(result, TaskResult::Ok));
        assert!(!fixture.home.join(".config/kitty/kitty.conf").exists());
        assert_eq!(std::fs::read_to_string(&theme).unwrap(), "local");
        assert_eq!(log.messages("warn").len(), 1);
    }
}
