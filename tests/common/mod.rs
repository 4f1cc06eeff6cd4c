// Shared helpers for integration tests.
//
// Provides a temporary repository, home directory and backup root so each
// integration test runs against an isolated environment.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use workstation_cli::cli::GlobalOpts;
use workstation_cli::logging::Logger;

/// Catalog used by most tests.
///
/// `kitty` depends on `fonts`, conflicts with `alacritty`, and both
/// terminals share the mutually exclusive `terminal` category.
pub const CATALOG: &str = r#"
[categories.terminal]
mutually_exclusive = true
description = "Terminal emulators"

[fonts]
description = "Nerd fonts"

[kitty]
description = "GPU terminal"
category = "terminal"
dependencies = ["fonts"]
conflicts = ["alacritty"]

[alacritty]
description = "Fast terminal"
category = "terminal"

[zsh]
description = "Z shell"
"#;

/// An isolated repository, home and backup root.
pub struct TestEnv {
    /// Keeps every directory alive.
    pub dir: tempfile::TempDir,
}

impl TestEnv {
    /// Create an environment with [`CATALOG`] and no component files.
    pub fn new() -> Self {
        Self::with_catalog(CATALOG)
    }

    /// Create an environment with the given catalog.
    pub fn with_catalog(catalog: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let env = Self { dir };
        std::fs::create_dir_all(env.root().join("components")).expect("create components dir");
        std::fs::create_dir_all(env.home()).expect("create home dir");
        std::fs::write(env.root().join("components.toml"), catalog).expect("write catalog");
        env
    }

    /// Repository root.
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("repo")
    }

    /// Home directory.
    pub fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    /// Backup root.
    pub fn backups(&self) -> PathBuf {
        self.dir.path().join("backups")
    }

    /// Write a file into `components/<component>/<relative>`.
    pub fn component_file(&self, component: &str, relative: &str, contents: &str) -> &Self {
        let path = self.root().join("components").join(component).join(relative);
        write_file(&path, contents);
        self
    }

    /// Write a file at `<home>/<relative>`.
    pub fn home_file(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.home().join(relative);
        write_file(&path, contents);
        path
    }

    /// Global options pointing every path into this environment.
    pub fn global(&self) -> GlobalOpts {
        GlobalOpts {
            root: Some(self.root()),
            home: Some(self.home()),
            backup_root: Some(self.backups()),
            distro: Some("arch".to_string()),
            dry_run: false,
            yes: true,
        }
    }

    /// Same as [`global`](Self::global) with `--dry-run`.
    pub fn global_dry_run(&self) -> GlobalOpts {
        GlobalOpts {
            dry_run: true,
            ..self.global()
        }
    }

    /// Session directories under the backup root, sorted.
    pub fn sessions(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(self.backups()) else {
            return vec![];
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        dirs
    }
}

/// Logger without a log file.
pub fn logger() -> Arc<Logger> {
    Arc::new(Logger::with_log_file(None))
}

/// Write `contents` to `path`, creating parents.
pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent");
    }
    std::fs::write(path, contents).expect("write file");
}

/// Whether `path` is a symlink whose content reads as `expected`.
pub fn is_link_with(path: &Path, expected: &str) -> bool {
    path.symlink_metadata()
        .is_ok_and(|m| m.file_type().is_symlink())
        && std::fs::read_to_string(path).is_ok_and(|c| c == expected)
}
