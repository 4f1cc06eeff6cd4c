//! Restoring a backup session to its original locations.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

use super::session::{self, BackupEntry, EntryKind, Origin, Session};
use crate::error::BackupError;
use crate::exec::Executor;
use crate::resources::fs::{copy_preserving, exists_no_follow};

/// What to do when the original location is occupied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RestorePolicy {
    /// Remove whatever is there and put the backup back.
    #[default]
    Replace,
    /// Leave occupied locations untouched.
    Skip,
    /// Copy a directory backup into an existing directory, replacing only
    /// the files it contains.  Other entries behave like `replace`.
    Merge,
}

/// Subset of entries selected by origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginFilter {
    /// Paths under the home directory.
    User,
    /// Paths outside the home directory.
    System,
    /// Paths backed up while deploying one component.
    Component(String),
}

impl FromStr for OriginFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "system" => Ok(Self::System),
            other => other
                .strip_prefix("component:")
                .filter(|name| !name.is_empty())
                .map(|name| Self::Component(name.to_string()))
                .ok_or_else(|| {
                    format!("invalid filter '{other}': expected user, system or component:<name>")
                }),
        }
    }
}

impl OriginFilter {
    fn matches(&self, entry: &BackupEntry) -> bool {
        match self {
            Self::User => entry.origin == Origin::User,
            Self::System => entry.origin == Origin::System,
            Self::Component(name) => entry.component.as_deref() == Some(name.as_str()),
        }
    }
}

/// Which part of a session to restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreScope {
    /// Every entry.
    Entire,
    /// One path: an original location (absolute, `~/...` or relative to the
    /// home directory) or a session-relative `home/...`/`root/...` path.
    /// Entries below a requested directory and paths inside a backed-up
    /// directory are both accepted.
    Path(PathBuf),
    /// Entries matching a filter.
    Only(OriginFilter),
}

/// Outcome of a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Locations written back.
    pub restored: Vec<PathBuf>,
    /// Occupied locations left alone.
    pub skipped: Vec<PathBuf>,
    /// Locations that could not be restored, with the reason.
    pub failed: Vec<(PathBuf, String)>,
    /// Non-fatal notes (policy fallbacks).
    pub warnings: Vec<String>,
}

impl RestoreReport {
    /// Whether every selected entry was restored or skipped.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One copy-to-original pair.
struct RestoreItem {
    copy: PathBuf,
    target: PathBuf,
    kind: EntryKind,
}

/// Restore `scope` of `session` using `policy`.
///
/// Failures of individual entries are collected in the report.
///
/// # Errors
///
/// Returns [`BackupError::PathNotInSession`] if a requested path matches no
/// entry.
pub fn restore_session(
    session: &Session,
    scope: &RestoreScope,
    policy: RestorePolicy,
    exec: &dyn Executor,
    home: &Path,
) -> Result<RestoreReport, BackupError> {
    let items = select(session, scope, home)?;
    let mut report = RestoreReport::default();
    for item in items {
        restore_item(exec, &item, policy, &mut report);
    }
    Ok(report)
}

fn select(
    session: &Session,
    scope: &RestoreScope,
    home: &Path,
) -> Result<Vec<RestoreItem>, BackupError> {
    let whole = |e: &BackupEntry| RestoreItem {
        copy: session.copy_path(e),
        target: e.original.clone(),
        kind: e.kind,
    };

    match scope {
        RestoreScope::Entire => Ok(session.meta.entries.iter().map(whole).collect()),
        RestoreScope::Only(filter) => Ok(session
            .meta
            .entries
            .iter()
            .filter(|e| filter.matches(e))
            .map(whole)
            .collect()),
        RestoreScope::Path(requested) => {
            let wanted = requested_original(requested, home);
            let mut items: Vec<RestoreItem> = session
                .meta
                .entries
                .iter()
                .filter(|e| e.original.starts_with(&wanted))
                .map(whole)
                .collect();

            if items.is_empty()
                && let Some(entry) = session
                    .meta
                    .entries
                    .iter()
                    .find(|e| e.kind == EntryKind::Directory && wanted.starts_with(&e.original))
                && let Ok(inner) = wanted.strip_prefix(&entry.original)
            {
                let copy = session.copy_path(entry).join(inner);
                if let Ok(meta) = copy.symlink_metadata() {
                    items.push(RestoreItem {
                        copy,
                        target: wanted.clone(),
                        kind: EntryKind::of(&meta),
                    });
                }
            }

            if items.is_empty() {
                return Err(BackupError::PathNotInSession {
                    session: session.id.clone(),
                    path: requested.display().to_string(),
                });
            }
            Ok(items)
        }
    }
}

/// Absolute original location for a user-supplied path.
fn requested_original(requested: &Path, home: &Path) -> PathBuf {
    if let Ok(rest) = requested.strip_prefix("~") {
        return home.join(rest);
    }
    if requested.is_absolute() {
        return requested.to_path_buf();
    }
    session::original_for(requested, home).map_or_else(|| home.join(requested), |(p, _)| p)
}

fn restore_item(
    exec: &dyn Executor,
    item: &RestoreItem,
    policy: RestorePolicy,
    report: &mut RestoreReport,
) {
    if !exists_no_follow(&item.copy) {
        report.failed.push((
            item.target.clone(),
            format!("backup copy missing: {}", item.copy.display()),
        ));
        return;
    }

    let occupied = exists_no_follow(&item.target);
    let result = match policy {
        RestorePolicy::Skip if occupied => {
            report.skipped.push(item.target.clone());
            return;
        }
        RestorePolicy::Merge if occupied && item.kind == EntryKind::Directory => {
            if is_real_dir(&item.target) {
                merge_tree(exec, &item.copy, &item.target)
            } else {
                report.warnings.push(format!(
                    "cannot merge directory backup onto non-directory {}; replacing it",
                    item.target.display()
                ));
                replace(exec, item, occupied)
            }
        }
        _ => replace(exec, item, occupied),
    };

    match result {
        Ok(()) => report.restored.push(item.target.clone()),
        Err(e) => report.failed.push((item.target.clone(), format!("{e:#}"))),
    }
}

fn is_real_dir(path: &Path) -> bool {
    path.symlink_metadata().is_ok_and(|m| m.is_dir())
}

fn replace(exec: &dyn Executor, item: &RestoreItem, occupied: bool) -> Result<()> {
    if occupied {
        exec.remove(&item.target)?;
    }
    copy_preserving(exec, &item.copy, &item.target)
}

fn merge_tree(exec: &dyn Executor, copy: &Path, target: &Path) -> Result<()> {
    for entry in WalkDir::new(copy)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("walking {}", copy.display()))?;
        let rel = entry.path().strip_prefix(copy)?;
        let out = target.join(rel);
        if entry.file_type().is_dir() {
            if is_real_dir(&out) {
                continue;
            }
            if exists_no_follow(&out) {
                exec.remove(&out)?;
            }
            exec.create_dir_all(&out)?;
        } else {
            if exists_no_follow(&out) {
                exec.remove(&out)?;
            }
            copy_preserving(exec, entry.path(), &out)?;
        }
    }
    Ok(())
}
