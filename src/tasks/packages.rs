use anyhow::{Context as _, Result};

use super::{Context, Task, TaskResult};
use crate::config::catalog::Component;
use crate::platform::DistroFamily;

/// Native package manager of a distro family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    /// Debian, Ubuntu and derivatives.
    Apt,
    /// Arch and derivatives.
    Pacman,
    /// Fedora.
    Dnf,
}

impl PackageManager {
    /// Manager for `family`, if one is known.
    #[must_use]
    pub const fn for_family(family: DistroFamily) -> Option<Self> {
        match family {
            DistroFamily::Debian => Some(Self::Apt),
            DistroFamily::Arch => Some(Self::Pacman),
            DistroFamily::Fedora => Some(Self::Dnf),
            DistroFamily::Unknown => None,
        }
    }

    /// Program and leading arguments of an install command.
    #[must_use]
    pub const fn install_command(self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::Apt => ("apt-get", &["install", "-y"]),
            Self::Pacman => ("pacman", &["-S", "--needed", "--noconfirm"]),
            Self::Dnf => ("dnf", &["install", "-y"]),
        }
    }
}

/// Full command line installing `packages`, optionally through `sudo`.
#[must_use]
pub fn install_invocation(
    manager: PackageManager,
    packages: &[String],
    use_sudo: bool,
) -> (String, Vec<String>) {
    let (program, fixed) = manager.install_command();
    let mut args: Vec<String> = fixed.iter().map(ToString::to_string).collect();
    args.extend(packages.iter().cloned());
    if use_sudo {
        args.insert(0, program.to_string());
        ("sudo".to_string(), args)
    } else {
        (program.to_string(), args)
    }
}

/// Whether the current user is root.
fn running_as_root() -> bool {
    std::env::var("USER").is_ok_and(|user| user == "root")
}

/// Install a component's native packages for the current distro.
#[derive(Debug)]
pub struct InstallPackages;

impl Task for InstallPackages {
    fn name(&self) -> &'static str {
        "install packages"
    }

    fn should_run(&self, _ctx: &Context, component: &Component) -> bool {
        component.packages.values().any(|list| !list.is_empty())
    }

    fn run(&self, ctx: &Context, component: &Component) -> Result<TaskResult> {
        let distro = &ctx.platform.distro;
        let packages = component.packages_for(distro);
        if packages.is_empty() {
            return Ok(TaskResult::Skipped(format!("no packages for {distro}")));
        }

        let Some(manager) = PackageManager::for_family(ctx.platform.family) else {
            ctx.log.warn(&format!(
                "no known package manager for {distro}; skipping {}",
                packages.join(", ")
            ));
            return Ok(TaskResult::Skipped(format!(
                "no package manager for {distro}"
            )));
        };

        let use_sudo = !running_as_root() && ctx.executor.which("sudo");
        let (program, args) = install_invocation(manager, packages, use_sudo);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        ctx.log
            .debug(&format!("installing {} package(s)", packages.len()));
        ctx.executor
            .run(&program, &args)
            .with_context(|| format!("installing {}", packages.join(" ")))?;

        if ctx.dry_run {
            return Ok(TaskResult::DryRun);
        }
        ctx.log.info(&format!("installed {}", packages.join(", ")));
        Ok(TaskResult::Ok)
    }
}
