use anyhow::{Context as _, Result};

use super::{Context, Task, TaskResult};
use crate::config::catalog::Component;

/// Program managing user services.
const SYSTEMCTL: &str = "systemctl";

/// Run `systemctl --user <verb> --now` for every service of `component`.
fn change_services(ctx: &Context, component: &Component, verb: &str) -> Result<TaskResult> {
    if !ctx.executor.which(SYSTEMCTL) {
        return Ok(TaskResult::Skipped(format!("{SYSTEMCTL} not available")));
    }

    let mut failed = 0usize;
    for service in &component.services {
        let result = ctx
            .executor
            .run(SYSTEMCTL, &["--user", verb, "--now", service])
            .with_context(|| format!("{verb} {service}"));
        match result {
            Ok(_) => ctx.log.debug(&format!("ok: {verb} {service}")),
            Err(e) => {
                ctx.log.warn(&format!("failed to {verb} {service}: {e:#}"));
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!(
            "{failed} of {} service(s) could not be {verb}d",
            component.services.len()
        );
    }
    if ctx.dry_run {
        return Ok(TaskResult::DryRun);
    }
    Ok(TaskResult::Ok)
}

/// Enable and start a component's user services.
#[derive(Debug)]
pub struct EnableServices;

impl Task for EnableServices {
    fn name(&self) -> &'static str {
        "enable services"
    }

    fn should_run(&self, _ctx: &Context, component: &Component) -> bool {
        !component.services.is_empty()
    }

    fn run(&self, ctx: &Context, component: &Component) -> Result<TaskResult> {
        change_services(ctx, component, "enable")
    }
}

/// Stop and disable a component's user services.
#[derive(Debug)]
pub struct DisableServices;

impl Task for DisableServices {
    fn name(&self) -> &'static str {
        "disable services"
    }

    fn should_run(&self, _ctx: &Context, component: &Component) -> bool {
        !component.services.is_empty()
    }

    fn run(&self, ctx: &Context, component: &Component) -> Result<TaskResult> {
        change_services(ctx, component, "disable")
    }
}
