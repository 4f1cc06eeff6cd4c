//! Timestamped backup sessions.
//!
//! A [`BackupManager`] creates at most one session per run, lazily, the first
//! time something is backed up.  Copies keep their type: files are copied,
//! directories are copied recursively and symlinks are recreated pointing at
//! their original destination.
pub mod restore;
pub mod session;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::toml_loader;
use crate::error::BackupError;
use crate::exec::Executor;
use crate::resources::fs::copy_preserving;

pub use restore::{OriginFilter, RestorePolicy, RestoreReport, RestoreScope, restore_session};
pub use session::{BackupEntry, EntryKind, METADATA_FILE, Origin, Session, SessionMeta};

/// Identifier accepted by [`BackupManager::open_session`] for the newest session.
pub const LATEST: &str = "latest";

/// Timestamp format of session identifiers.
const SESSION_ID_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Sort key of a session id: `<timestamp>` or `<timestamp>_<n>` for the
/// n-th session created within the same second.
fn session_order(id: &str) -> (&str, u32) {
    match id.rsplit_once('_') {
        Some((base, n)) if base.contains('_') => n.parse().map_or((id, 0), |n| (base, n)),
        _ => (id, 0),
    }
}

/// Result of scanning the backup root.
#[derive(Debug, Default)]
pub struct SessionListing {
    /// Readable sessions, newest first.
    pub sessions: Vec<Session>,
    /// Sessions whose metadata could not be read.
    pub unreadable: Vec<BackupError>,
}

/// Identity of the session created during this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// Session identifier.
    pub id: String,
    /// Session directory.
    pub dir: PathBuf,
}

/// Creates the run's backup session and copies paths into it.
#[derive(Debug)]
pub struct BackupManager {
    root: PathBuf,
    home: PathBuf,
    exec: Arc<dyn Executor>,
    active: Mutex<Option<SessionMeta>>,
}

impl BackupManager {
    /// Create a manager storing sessions under `root`.
    #[must_use]
    pub fn new(root: PathBuf, home: PathBuf, exec: Arc<dyn Executor>) -> Self {
        Self {
            root,
            home,
            exec,
            active: Mutex::new(None),
        }
    }

    /// Directory holding every session.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The session created during this run, if any.
    #[must_use]
    pub fn active_session(&self) -> Option<SessionHandle> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|meta| self.handle(meta))
    }

    /// Return this run's session, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::SessionUnavailable`] if the session directory or
    /// its metadata cannot be written.
    pub fn ensure_session(&self) -> Result<SessionHandle, BackupError> {
        let mut guard = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let meta = self.session_in(&mut guard)?;
        Ok(self.handle(meta))
    }

    /// Copy `path` into this run's session and record it.
    ///
    /// A path already backed up during this run is not copied again, so the
    /// first copy (the user's original) is kept.  Returns the location of the
    /// copy.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::SourceMissing`] if `path` does not exist,
    /// [`BackupError::SessionUnavailable`] if the session cannot be created
    /// and [`BackupError::CopyFailed`] if the copy or metadata update fails.
    pub fn backup_path(&self, path: &Path, component: Option<&str>) -> Result<PathBuf, BackupError> {
        let meta = path
            .symlink_metadata()
            .map_err(|_| BackupError::SourceMissing {
                path: path.display().to_string(),
            })?;

        let mut guard = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let session = self.session_in(&mut guard)?;
        let dir = self.root.join(&session.id);

        if let Some(existing) = session.entries.iter().find(|e| e.original == path) {
            return Ok(dir.join(&existing.relative));
        }

        let (relative, origin) = session::layout(path, &self.home);
        let dest = dir.join(&relative);
        copy_preserving(self.exec.as_ref(), path, &dest).map_err(|e| BackupError::CopyFailed {
            path: path.display().to_string(),
            reason: format!("{e:#}"),
        })?;

        session.entries.push(BackupEntry {
            relative,
            original: path.to_path_buf(),
            kind: EntryKind::of(&meta),
            origin,
            component: component.map(String::from),
        });
        self.write_metadata(session)?;

        Ok(dest)
    }

    /// Session directory names under the backup root, newest first.
    fn session_ids(&self) -> Vec<String> {
        let Ok(read_dir) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = read_dir
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        ids.sort_by(|a, b| session_order(b).cmp(&session_order(a)));
        ids
    }

    /// Every session under the backup root, newest first.
    ///
    /// Sessions whose metadata cannot be read are returned separately so the
    /// others stay usable.
    #[must_use]
    pub fn list_sessions(&self) -> SessionListing {
        let mut listing = SessionListing::default();
        for id in self.session_ids() {
            match Session::open(&self.root.join(&id), &self.home) {
                Ok(session) => listing.sessions.push(session),
                Err(e) => listing.unreadable.push(e),
            }
        }
        listing
    }

    /// Open a session by identifier; [`LATEST`] selects the newest one.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::SessionNotFound`] if no such session exists and
    /// [`BackupError::Metadata`] if its metadata is corrupt.
    pub fn open_session(&self, id: &str) -> Result<Session, BackupError> {
        if id == LATEST {
            let newest = self
                .session_ids()
                .into_iter()
                .next()
                .ok_or_else(|| BackupError::SessionNotFound(id.to_string()))?;
            return Session::open(&self.root.join(newest), &self.home);
        }
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(BackupError::SessionNotFound(id.to_string()));
        }
        Session::open(&self.root.join(id), &self.home)
    }

    fn handle(&self, meta: &SessionMeta) -> SessionHandle {
        SessionHandle {
            id: meta.id.clone(),
            dir: self.root.join(&meta.id),
        }
    }

    fn session_in<'a>(
        &self,
        slot: &'a mut Option<SessionMeta>,
    ) -> Result<&'a mut SessionMeta, BackupError> {
        if slot.is_none() {
            *slot = Some(self.create_session()?);
        }
        slot.as_mut()
            .ok_or_else(|| BackupError::SessionUnavailable {
                path: self.root.display().to_string(),
                reason: "session was not initialised".to_string(),
            })
    }

    fn create_session(&self) -> Result<SessionMeta, BackupError> {
        let now = chrono::Local::now();
        let base = now.format(SESSION_ID_FORMAT).to_string();
        let mut id = base.clone();
        let mut n = 1;
        while self.root.join(&id).symlink_metadata().is_ok() {
            id = format!("{base}_{n}");
            n += 1;
        }

        let dir = self.root.join(&id);
        let unavailable = |e: anyhow::Error| BackupError::SessionUnavailable {
            path: dir.display().to_string(),
            reason: format!("{e:#}"),
        };
        self.exec.create_dir_all(&dir).map_err(unavailable)?;

        let meta = SessionMeta {
            id,
            created: now.to_rfc3339(),
            creator: std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
            version: crate::VERSION.to_string(),
            entries: Vec::new(),
        };
        self.write_metadata(&meta).map_err(|e| BackupError::SessionUnavailable {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(meta)
    }

    fn write_metadata(&self, meta: &SessionMeta) -> Result<(), BackupError> {
        let path = self.root.join(&meta.id).join(METADATA_FILE);
        let metadata_error = |e: anyhow::Error| BackupError::Metadata {
            path: path.display().to_string(),
            reason: format!("{e:#}"),
        };
        let content = toml_loader::to_toml_string(meta).map_err(metadata_error)?;
        self.exec
            .write_file(&path, &content)
            .map_err(metadata_error)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::{DryRunExecutor, SystemExecutor};
    use crate::logging::CaptureLog;

    struct Fixture {
        _dir: tempfile::TempDir,
        home: PathBuf,
        backups: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        let backups = dir.path().join("backups");
        std::fs::create_dir_all(&home).unwrap();
        Fixture {
            _dir: dir,
            home,
            backups,
        }
    }

    fn manager(f: &Fixture) -> BackupManager {
        BackupManager::new(f.backups.clone(), f.home.clone(), Arc::new(SystemExecutor))
    }

    #[test]
    fn session_is_created_lazily_and_once() {
        let f = fixture();
        let mgr = manager(&f);
        assert!(mgr.active_session().is_none());
        assert!(!f.backups.exists());

        let first = mgr.ensure_session().unwrap();
        let second = mgr.ensure_session().unwrap();
        assert_eq!(first, second);
        assert!(first.dir.join(METADATA_FILE).is_file());
        assert_eq!(std::fs::read_dir(&f.backups).unwrap().count(), 1);
    }

    #[test]
    fn colliding_session_id_gets_suffix() {
        let f = fixture();
        let first = manager(&f).ensure_session().unwrap();
        let mut seen = vec![first.id.clone()];
        for _ in 0..2 {
            let handle = manager(&f).ensure_session().unwrap();
            assert!(!seen.contains(&handle.id));
            seen.push(handle.id);
        }
        assert!(seen.iter().all(|id| id.len() >= 15));
    }

    #[test]
    fn backup_file_preserves_content_under_home_tree() {
        let f = fixture();
        let mgr = manager(&f);
        let target = f.home.join(".zshrc");
        std::fs::write(&target, "export A=1").unwrap();

        let copy = mgr.backup_path(&target, Some("zsh")).unwrap();
        let session = mgr.active_session().unwrap();
        assert_eq!(copy, session.dir.join("home/.zshrc"));
        assert_eq!(std::fs::read_to_string(&copy).unwrap(), "export A=1");

        let opened = mgr.open_session(&session.id).unwrap();
        let entry = opened.entry_for(&target).unwrap();
        assert_eq!(entry.kind, EntryKind::File);
        assert_eq!(entry.origin, Origin::User);
        assert_eq!(entry.component.as_deref(), Some("zsh"));
    }

    #[test]
    fn backup_directory_copies_tree() {
        let f = fixture();
        let mgr = manager(&f);
        let target = f.home.join(".config/nvim");
        std::fs::create_dir_all(target.join("lua")).unwrap();
        std::fs::write(target.join("init.lua"), "x").unwrap();
        std::fs::write(target.join("lua/plugins.lua"), "y").unwrap();

        let copy = mgr.backup_path(&target, None).unwrap();
        assert_eq!(std::fs::read_to_string(copy.join("lua/plugins.lua")).unwrap(), "y");
        let opened = mgr.open_session(LATEST).unwrap();
        assert_eq!(opened.meta.entries[0].kind, EntryKind::Directory);
    }

    #[cfg(unix)]
    #[test]
    fn backup_symlink_keeps_link() {
        let f = fixture();
        let mgr = manager(&f);
        let target = f.home.join(".vimrc");
        std::os::unix::fs::symlink("/somewhere/else", &target).unwrap();

        let copy = mgr.backup_path(&target, None).unwrap();
        assert_eq!(
            std::fs::read_link(copy).unwrap(),
            PathBuf::from("/somewhere/else")
        );
    }

    #[test]
    fn backup_path_outside_home_goes_to_root_tree() {
        let f = fixture();
        let mgr = BackupManager::new(
            f.backups.clone(),
            f.home.join("elsewhere"),
            Arc::new(SystemExecutor),
        );
        let target = f.home.join("system.conf");
        std::fs::write(&target, "s").unwrap();

        let copy = mgr.backup_path(&target, None).unwrap();
        let session = mgr.active_session().unwrap();
        assert!(copy.starts_with(session.dir.join("root")));
        assert!(copy.ends_with("home/system.conf"));
    }

    #[test]
    fn second_backup_of_same_path_keeps_first_copy() {
        let f = fixture();
        let mgr = manager(&f);
        let target = f.home.join(".bashrc");
        std::fs::write(&target, "original").unwrap();
        let copy = mgr.backup_path(&target, None).unwrap();

        std::fs::write(&target, "changed").unwrap();
        let again = mgr.backup_path(&target, None).unwrap();
        assert_eq!(copy, again);
        assert_eq!(std::fs::read_to_string(copy).unwrap(), "original");
        assert_eq!(mgr.open_session(LATEST).unwrap().meta.entries.len(), 1);
    }

    #[test]
    fn missing_source_is_reported_without_creating_session() {
        let f = fixture();
        let mgr = manager(&f);
        let err = mgr.backup_path(&f.home.join("absent"), None).unwrap_err();
        assert!(matches!(err, BackupError::SourceMissing { .. }));
        assert!(mgr.active_session().is_none());
    }

    #[test]
    fn list_sessions_newest_first() {
        let f = fixture();
        for id in ["20240101_000000", "20240301_000000", "20240201_000000"] {
            std::fs::create_dir_all(f.backups.join(id).join("home")).unwrap();
        }
        let mgr = manager(&f);
        let ids: Vec<String> = mgr.list_sessions().sessions.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["20240301_000000", "20240201_000000", "20240101_000000"]);
        assert_eq!(mgr.open_session(LATEST).unwrap().id, "20240301_000000");
    }

    #[test]
    fn list_sessions_without_root_is_empty() {
        let f = fixture();
        assert!(manager(&f).list_sessions().sessions.is_empty());
        assert!(matches!(
            manager(&f).open_session(LATEST),
            Err(BackupError::SessionNotFound(_))
        ));
    }

    #[test]
    fn same_second_sessions_order_by_counter() {
        let f = fixture();
        for id in ["20240101_000000", "20240101_000000_2", "20240101_000000_10"] {
            std::fs::create_dir_all(f.backups.join(id).join("home")).unwrap();
        }
        let mgr = manager(&f);
        let ids: Vec<String> = mgr.list_sessions().sessions.into_iter().map(|s| s.id).collect();
        assert_eq!(
            ids,
            vec!["20240101_000000_10", "20240101_000000_2", "20240101_000000"]
        );
        assert_eq!(mgr.open_session(LATEST).unwrap().id, "20240101_000000_10");
    }

    #[test]
    fn corrupt_metadata_does_not_hide_other_sessions() {
        let f = fixture();
        for id in ["20240101_000000", "20240201_000000"] {
            std::fs::create_dir_all(f.backups.join(id).join("home")).unwrap();
        }
        std::fs::write(
            f.backups.join("20240201_000000").join(METADATA_FILE),
            "entries = [",
        )
        .unwrap();

        let mgr = manager(&f);
        let listing = mgr.list_sessions();
        assert_eq!(listing.sessions.len(), 1);
        assert_eq!(listing.sessions[0].id, "20240101_000000");
        assert_eq!(listing.unreadable.len(), 1);
        assert!(matches!(listing.unreadable[0], BackupError::Metadata { .. }));
        assert!(mgr.open_session("20240101_000000").is_ok());
        assert!(matches!(
            mgr.open_session(LATEST),
            Err(BackupError::Metadata { .. })
        ));
    }

    #[test]
    fn open_session_rejects_path_like_ids() {
        let f = fixture();
        assert!(manager(&f).open_session("../etc").is_err());
    }

    #[test]
    fn dry_run_backup_touches_nothing() {
        let f = fixture();
        let log = Arc::new(CaptureLog::default());
        let exec = Arc::new(DryRunExecutor::new(log.clone()));
        let mgr = BackupManager::new(f.backups.clone(), f.home.clone(), exec.clone());
        let target = f.home.join(".zshrc");
        std::fs::write(&target, "x").unwrap();

        mgr.backup_path(&target, None).unwrap();
        assert!(!f.backups.exists());
        assert!(!exec.actions().is_empty());
        assert!(
            log.messages("dry_run")
                .iter()
                .any(|m| m.starts_with("copy ") && m.contains(".zshrc"))
        );
    }
}
