//! Commands: list and restore backup sessions.
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use super::{resolve_backup_root, resolve_home, select_executor};
use crate::cli::{GlobalOpts, RestoreOpts};
use crate::exec::Executor;
use crate::logging::{Log, Logger};
use crate::resources::backup::{
    BackupManager, RestoreReport, RestoreScope, Session, restore_session,
};

/// One line describing `session`.
#[must_use]
pub fn describe_session(session: &Session) -> String {
    let created = if session.meta.created.is_empty() {
        "unknown time"
    } else {
        session.meta.created.as_str()
    };
    let suffix = if session.scanned { ", no metadata" } else { "" };
    format!(
        "{}  {created}  {} entr{}{suffix}",
        session.id,
        session.meta.entries.len(),
        if session.meta.entries.len() == 1 { "y" } else { "ies" }
    )
}

/// Scope selected by the restore options.
#[must_use]
pub fn scope_for(opts: &RestoreOpts) -> RestoreScope {
    match (&opts.path, &opts.only) {
        (Some(path), _) => RestoreScope::Path(path.clone()),
        (None, Some(filter)) => RestoreScope::Only(filter.clone()),
        (None, None) => RestoreScope::Entire,
    }
}

/// Log every path in `report`.
fn log_report(report: &RestoreReport, log: &dyn Log) {
    for path in &report.restored {
        log.info(&format!("restored {}", path.display()));
    }
    for path in &report.skipped {
        log.info(&format!("skipped {} (already exists)", path.display()));
    }
    for warning in &report.warnings {
        log.warn(warning);
    }
    for (path, reason) in &report.failed {
        log.error(&format!("failed to restore {}: {reason}", path.display()));
    }
    log.info(&format!(
        "{} restored, {} skipped, {} failed",
        report.restored.len(),
        report.skipped.len(),
        report.failed.len()
    ));
}

/// Backup manager, home directory and executor for this run.
fn manager(
    global: &GlobalOpts,
    log: &Arc<Logger>,
) -> Result<(BackupManager, PathBuf, Arc<dyn Executor>)> {
    let home = resolve_home(global)?;
    let root = resolve_backup_root(global, &home)?;
    log.debug(&format!("backups: {}", root.display()));
    let executor = select_executor(global.dry_run, Arc::clone(log) as Arc<dyn Log>);
    let backups = BackupManager::new(root, home.clone(), Arc::clone(&executor));
    Ok((backups, home, executor))
}

/// Run the backup-list command.
///
/// Sessions with unreadable metadata are reported as warnings; the rest are
/// still listed.
///
/// # Errors
///
/// Returns an error if the home or backup directory cannot be resolved.
pub fn list(global: &GlobalOpts, log: &Arc<Logger>) -> Result<()> {
    let (backups, _, _) = manager(global, log)?;
    let listing = backups.list_sessions();
    for err in &listing.unreadable {
        log.warn(&format!("skipping session: {err}"));
    }
    if listing.sessions.is_empty() {
        log.info(&format!("no backup sessions in {}", backups.root().display()));
        return Ok(());
    }
    for session in &listing.sessions {
        log.info(&describe_session(session));
    }
    Ok(())
}

/// Run the restore command.
///
/// # Errors
///
/// Returns an error if the session or path is unknown or any entry fails to
/// restore.
pub fn restore(global: &GlobalOpts, opts: &RestoreOpts, log: &Arc<Logger>) -> Result<()> {
    let (backups, home, executor) = manager(global, log)?;
    let session = backups.open_session(&opts.session)?;
    log.stage(&format!("Restoring {}", session.id));
    if session.scanned {
        log.warn("session has no metadata; restoring from its directory layout");
    }

    let report = restore_session(
        &session,
        &scope_for(opts),
        opts.policy,
        executor.as_ref(),
        &home,
    )?;
    log_report(&report, log.as_ref());

    if global.dry_run {
        log.info("dry run: no changes were made");
    }
    if !report.is_success() {
        anyhow::bail!("{} path(s) could not be restored", report.failed.len());
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resources::backup::{OriginFilter, RestorePolicy, SessionMeta};

    fn opts(path: Option<&str>, only: Option<OriginFilter>) -> RestoreOpts {
        RestoreOpts {
            session: "latest".to_string(),
            path: path.map(PathBuf::from),
            only,
            policy: RestorePolicy::Replace,
        }
    }

    #[test]
    fn scope_follows_options() {
        assert_eq!(scope_for(&opts(None, None)), RestoreScope::Entire);
        assert_eq!(
            scope_for(&opts(Some("~/.zshrc"), None)),
            RestoreScope::Path(PathBuf::from("~/.zshrc"))
        );
        assert_eq!(
            scope_for(&opts(None, Some(OriginFilter::System))),
            RestoreScope::Only(OriginFilter::System)
        );
    }

    #[test]
    fn session_description() {
        let session = Session {
            id: "20240101_120000".to_string(),
            dir: PathBuf::from("/b/20240101_120000"),
            meta: SessionMeta {
                id: "20240101_120000".to_string(),
                created: "2024-01-01T12:00:00+00:00".to_string(),
                ..SessionMeta::default()
            },
            scanned: false,
        };
        assert_eq!(
            describe_session(&session),
            "20240101_120000  2024-01-01T12:00:00+00:00  0 entries"
        );
    }
}
