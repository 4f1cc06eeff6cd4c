//! Command: show one component.
use anyhow::Result;
use std::path::Path;

use super::CommandSetup;
use crate::cli::{GlobalOpts, ShowOpts};
use crate::config::Config;
use crate::config::catalog::Component;
use crate::logging::{Log, Logger};

/// Comma-separated list, or `-` when empty.
fn joined(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

/// `~/...` form of paths under `home`.
fn display_target(target: &Path, home: &Path) -> String {
    target.strip_prefix(home).map_or_else(
        |_| target.display().to_string(),
        |rel| format!("~/{}", rel.display()),
    )
}

/// Detail lines for `component` on `distro`.
#[must_use]
pub fn render_show(config: &Config, component: &Component, distro: &str) -> Vec<String> {
    let category = component.category.as_deref().map_or_else(
        || "-".to_string(),
        |c| {
            if config.catalog.is_mutually_exclusive(c) {
                format!("{c} (mutually exclusive)")
            } else {
                c.to_string()
            }
        },
    );

    let mut lines = vec![
        format!("{}: {}", component.name, component.description),
        format!("  category:     {category}"),
        format!("  dependencies: {}", joined(&component.dependencies)),
        format!("  conflicts:    {}", joined(&component.conflicts)),
        format!("  options:      {}", joined(&component.options)),
        format!(
            "  packages:     {} ({distro})",
            joined(component.packages_for(distro))
        ),
        format!("  services:     {}", joined(&component.services)),
    ];

    match config.mappings(component) {
        Ok(mappings) if mappings.is_empty() => lines.push("  targets:      -".to_string()),
        Ok(mappings) => {
            lines.push("  targets:".to_string());
            lines.extend(
                mappings
                    .iter()
                    .map(|m| format!("    {}", display_target(&m.target, &config.home))),
            );
        }
        Err(e) => lines.push(format!("  targets:      ({e})")),
    }
    lines
}

/// Run the show command.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded or the component is
/// unknown.
pub fn run(global: &GlobalOpts, opts: &ShowOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let component = setup.config.catalog.require(&opts.component)?;
    for line in render_show(&setup.config, component, &setup.platform.distro) {
        log.info(&line);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::catalog::Catalog;

    #[test]
    fn show_lists_details_and_targets() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");
        let source = root.join("components/kitty/.config/kitty");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("kitty.conf"), "").unwrap();

        let catalog = Catalog::from_toml_str(
            r#"
[categories.terminal]
mutually_exclusive = true

[kitty]
description = "GPU terminal"
category = "terminal"
dependencies = ["fonts"]
conflicts = ["alacritty"]
packages = { arch = ["kitty"], debian = ["kitty", "kitty-terminfo"] }

[fonts]
[alacritty]
"#,
            "test",
        )
        .unwrap();
        let config = Config {
            root,
            home: "/home/u".into(),
            backup_root: dir.path().join("backups"),
            catalog,
        };
        let kitty = config.catalog.get("kitty").unwrap();

        insta::assert_snapshot!(render_show(&config, kitty, "debian").join("\n"), @r"
        kitty: GPU terminal
          category:     terminal (mutually exclusive)
          dependencies: fonts
          conflicts:    alacritty
          options:      -
          packages:     kitty, kitty-terminfo (debian)
          services:     -
          targets:
            ~/.config/kitty/kitty.conf
        ");
    }

    #[test]
    fn show_reports_missing_source_tree() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            root: dir.path().to_path_buf(),
            home: "/home/u".into(),
            backup_root: dir.path().join("backups"),
            catalog: Catalog::from_toml_str("[fonts]\n", "test").unwrap(),
        };
        let fonts = config.catalog.get("fonts").unwrap();
        let lines = render_show(&config, fonts, "arch");
        assert!(lines.last().unwrap().contains("fonts"));
        assert!(lines.first().unwrap().starts_with("fonts:"));
    }
}
