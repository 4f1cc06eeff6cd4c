//! Managed symlink resource.
use anyhow::{Context as _, Result};
use std::fmt;
use std::path::{Path, PathBuf};

use super::backup::BackupManager;
use super::fs::{ensure_parent_dir, exists_no_follow, paths_equal};
use super::policy::ConflictPolicy;
use super::{Resource, ResourceState};
use crate::exec::Executor;

/// A symlink from a deployment target back into a component tree.
#[derive(Debug, Clone)]
pub struct SymlinkResource {
    /// The source file (what the symlink points to).
    pub source: PathBuf,
    /// The target path (where the symlink is created).
    pub target: PathBuf,
}

/// Result of deploying one mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Target was absent; the link was created.
    Created,
    /// Target already linked to the source; nothing changed.
    AlreadyCorrect,
    /// Target was occupied and left untouched.
    Skipped {
        /// What occupied the target.
        reason: String,
    },
    /// Occupant was copied into the backup session, then replaced.
    BackedUpAndReplaced {
        /// Location of the copy.
        backup: PathBuf,
    },
    /// Occupant was removed without a backup, then replaced.
    Overwritten,
    /// A filesystem operation failed.
    Failed {
        /// Formatted error chain.
        reason: String,
    },
}

impl DeployOutcome {
    /// Whether this outcome is a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for DeployOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::AlreadyCorrect => write!(f, "already correct"),
            Self::Skipped { reason } => write!(f, "skipped ({reason})"),
            Self::BackedUpAndReplaced { backup } => {
                write!(f, "backed up to {} and replaced", backup.display())
            }
            Self::Overwritten => write!(f, "overwritten"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Per-component outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeploySummary {
    /// Links created at empty targets.
    pub created: usize,
    /// Targets that were already correct.
    pub already_correct: usize,
    /// Occupied targets left untouched.
    pub skipped: usize,
    /// Occupied targets backed up and replaced.
    pub backed_up: usize,
    /// Occupied targets overwritten.
    pub overwritten: usize,
    /// Failed mappings.
    pub failed: usize,
}

impl DeploySummary {
    /// Count `outcome`.
    pub const fn record(&mut self, outcome: &DeployOutcome) {
        match outcome {
            DeployOutcome::Created => self.created += 1,
            DeployOutcome::AlreadyCorrect => self.already_correct += 1,
            DeployOutcome::Skipped { .. } => self.skipped += 1,
            DeployOutcome::BackedUpAndReplaced { .. } => self.backed_up += 1,
            DeployOutcome::Overwritten => self.overwritten += 1,
            DeployOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Mappings that now point at their source.
    #[must_use]
    pub const fn succeeded(&self) -> usize {
        self.created + self.already_correct + self.backed_up + self.overwritten
    }

    /// Mappings that changed the filesystem.
    #[must_use]
    pub const fn changed(&self) -> usize {
        self.created + self.backed_up + self.overwritten
    }
}

impl fmt::Display for DeploySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} already correct, {} backed up, {} overwritten, {} skipped, {} failed",
            self.created,
            self.already_correct,
            self.backed_up,
            self.overwritten,
            self.skipped,
            self.failed
        )
    }
}

/// Result of removing one managed link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The managed link was removed.
    Removed,
    /// Nothing exists at the target.
    Absent,
    /// Something not managed by this component occupies the target.
    NotManaged {
        /// What occupies the target.
        reason: String,
    },
    /// Removal failed.
    Failed {
        /// Formatted error chain.
        reason: String,
    },
}

impl SymlinkResource {
    /// Create a new symlink resource.
    #[must_use]
    pub const fn new(source: PathBuf, target: PathBuf) -> Self {
        Self { source, target }
    }

    /// Bring the target to the linked state.
    ///
    /// `decide` is consulted only when the target is occupied by something
    /// other than the correct link.  Only the target path is mutated.  Every
    /// failure is reported as [`DeployOutcome::Failed`].
    pub fn deploy(
        &self,
        exec: &dyn Executor,
        backups: &BackupManager,
        component: Option<&str>,
        decide: impl FnOnce(&str) -> Result<ConflictPolicy>,
    ) -> DeployOutcome {
        let failed = |e: &anyhow::Error| DeployOutcome::Failed {
            reason: format!("{e:#}"),
        };

        let current = match self.current_state() {
            Ok(ResourceState::Correct) => return DeployOutcome::AlreadyCorrect,
            Ok(ResourceState::Invalid { reason }) => return DeployOutcome::Failed { reason },
            Ok(ResourceState::Missing) => {
                return self
                    .link(exec)
                    .map_or_else(|e| failed(&e), |()| DeployOutcome::Created);
            }
            Ok(ResourceState::Incorrect { current }) => current,
            Err(e) => return failed(&e),
        };

        let policy = match decide(&current) {
            Ok(policy) => policy,
            Err(e) => return failed(&e),
        };

        match policy {
            ConflictPolicy::Skip => DeployOutcome::Skipped { reason: current },
            ConflictPolicy::Backup => {
                let backup = match backups.backup_path(&self.target, component) {
                    Ok(path) => path,
                    Err(e) => {
                        return DeployOutcome::Failed {
                            reason: format!("backup failed: {e}"),
                        };
                    }
                };
                self.replace(exec)
                    .map_or_else(|e| failed(&e), |()| DeployOutcome::BackedUpAndReplaced {
                        backup,
                    })
            }
            ConflictPolicy::Overwrite => self
                .replace(exec)
                .map_or_else(|e| failed(&e), |()| DeployOutcome::Overwritten),
        }
    }

    /// Remove the target if it is a symlink into `component_root`.
    pub fn remove_managed(&self, exec: &dyn Executor, component_root: &Path) -> RemoveOutcome {
        let Ok(meta) = self.target.symlink_metadata() else {
            return RemoveOutcome::Absent;
        };
        if !meta.file_type().is_symlink() {
            return RemoveOutcome::NotManaged {
                reason: "not a symlink".to_string(),
            };
        }
        let destination = match std::fs::read_link(&self.target) {
            Ok(d) => d,
            Err(e) => {
                return RemoveOutcome::Failed {
                    reason: format!("reading link {}: {e}", self.target.display()),
                };
            }
        };
        let absolute = self.resolve_link(&destination);
        if !absolute.starts_with(component_root) {
            return RemoveOutcome::NotManaged {
                reason: format!("points to {}", destination.display()),
            };
        }
        exec.remove(&self.target).map_or_else(
            |e| RemoveOutcome::Failed {
                reason: format!("{e:#}"),
            },
            |()| RemoveOutcome::Removed,
        )
    }

    fn link(&self, exec: &dyn Executor) -> Result<()> {
        ensure_parent_dir(exec, &self.target)?;
        exec.symlink(&self.source, &self.target)
            .with_context(|| format!("create link: {}", self.target.display()))
    }

    fn replace(&self, exec: &dyn Executor) -> Result<()> {
        exec.remove(&self.target)
            .with_context(|| format!("remove existing: {}", self.target.display()))?;
        self.link(exec)
    }

    /// Absolute form of a link destination read from the target.
    fn resolve_link(&self, destination: &Path) -> PathBuf {
        if destination.is_absolute() {
            destination.to_path_buf()
        } else {
            self.target
                .parent()
                .map_or_else(|| destination.to_path_buf(), |p| p.join(destination))
        }
    }

    /// Whether `destination` names the source, directly or after resolving
    /// relative components and symlinked ancestors.
    fn points_to_source(&self, destination: &Path) -> bool {
        if paths_equal(&self.resolve_link(destination), &self.source) {
            return true;
        }
        match (
            dunce::canonicalize(self.resolve_link(destination)),
            dunce::canonicalize(&self.source),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl Resource for SymlinkResource {
    fn description(&self) -> String {
        format!("{} -> {}", self.target.display(), self.source.display())
    }

    fn current_state(&self) -> Result<ResourceState> {
        if !self.source.exists() {
            return Ok(ResourceState::Invalid {
                reason: format!("source does not exist: {}", self.source.display()),
            });
        }

        let meta = match self.target.symlink_metadata() {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ResourceState::Missing);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.target.display()));
            }
        };

        if meta.file_type().is_symlink() {
            let existing = std::fs::read_link(&self.target)
                .with_context(|| format!("reading link {}", self.target.display()))?;
            return Ok(if self.points_to_source(&existing) {
                ResourceState::Correct
            } else {
                ResourceState::Incorrect {
                    current: format!("points to {}", existing.display()),
                }
            });
        }

        // A symlinked ancestor can make the target the source file itself.
        if exists_no_follow(&self.target)
            && let (Ok(a), Ok(b)) = (
                dunce::canonicalize(&self.target),
                dunce::canonicalize(&self.source),
            )
            && a == b
        {
            return Ok(ResourceState::Correct);
        }

        Ok(ResourceState::Incorrect {
            current: if meta.is_dir() {
                "target is a directory".to_string()
            } else {
                "target is a regular file".to_string()
            },
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::exec::{DryRunExecutor, SystemExecutor};
    use crate::logging::CaptureLog;
    use std::sync::Arc;

    struct Fixture {
        dir: tempfile::TempDir,
        source: PathBuf,
        target: PathBuf,
        backups: BackupManager,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        std::fs::create_dir_all(&home).unwrap();
        let source = dir.path().join("repo/components/zsh/.zshrc");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, "managed").unwrap();
        let target = home.join(".zshrc");
        let backups = BackupManager::new(dir.path().join("backups"), home, Arc::new(SystemExecutor));
        Fixture {
            dir,
            source,
            target,
            backups,
        }
    }

    fn resource(f: &Fixture) -> SymlinkResource {
        SymlinkResource::new(f.source.clone(), f.target.clone())
    }

    fn never(_: &str) -> Result<ConflictPolicy> {
        panic!("policy must not be consulted")
    }

    #[test]
    fn description_names_both_ends() {
        let r = SymlinkResource::new(PathBuf::from("/source"), PathBuf::from("/target"));
        assert_eq!(r.description(), "/target -> /source");
    }

    #[test]
    fn invalid_when_source_missing() {
        let f = fixture();
        let r = SymlinkResource::new(f.dir.path().join("nope"), f.target.clone());
        assert!(matches!(r.current_state().unwrap(), ResourceState::Invalid { .. }));
        assert!(r.deploy(&SystemExecutor, &f.backups, None, never).is_failure());
    }

    #[test]
    fn missing_target_is_created_then_already_correct() {
        let f = fixture();
        let r = resource(&f);
        assert_eq!(r.current_state().unwrap(), ResourceState::Missing);

        assert_eq!(
            r.deploy(&SystemExecutor, &f.backups, None, never),
            DeployOutcome::Created
        );
        assert_eq!(std::fs::read_link(&f.target).unwrap(), f.source);
        let before = f.target.symlink_metadata().unwrap().modified().unwrap();

        assert_eq!(
            r.deploy(&SystemExecutor, &f.backups, None, never),
            DeployOutcome::AlreadyCorrect
        );
        let after = f.target.symlink_metadata().unwrap().modified().unwrap();
        assert_eq!(before, after);
        assert!(f.backups.active_session().is_none());
    }

    #[test]
    fn creates_missing_parent_directories() {
        let f = fixture();
        let target = f.dir.path().join("home/.config/deep/nested/file");
        let r = SymlinkResource::new(f.source.clone(), target.clone());
        assert_eq!(
            r.deploy(&SystemExecutor, &f.backups, None, never),
            DeployOutcome::Created
        );
        assert!(target.symlink_metadata().unwrap().is_symlink());
    }

    #[test]
    fn skip_leaves_plain_file_untouched_without_backup() {
        let f = fixture();
        std::fs::write(&f.target, "user content").unwrap();
        let outcome = resource(&f).deploy(&SystemExecutor, &f.backups, None, |_| {
            Ok(ConflictPolicy::Skip)
        });
        assert!(matches!(outcome, DeployOutcome::Skipped { ref reason } if reason.contains("regular file")));
        assert_eq!(std::fs::read_to_string(&f.target).unwrap(), "user content");
        assert!(f.backups.active_session().is_none());
    }

    #[test]
    fn backup_copies_file_then_links() {
        let f = fixture();
        std::fs::write(&f.target, "user content").unwrap();
        let outcome = resource(&f).deploy(&SystemExecutor, &f.backups, Some("zsh"), |_| {
            Ok(ConflictPolicy::Backup)
        });
        let DeployOutcome::BackedUpAndReplaced { backup } = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        let session = f.backups.active_session().unwrap();
        assert_eq!(backup, session.dir.join("home/.zshrc"));
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "user content");
        assert_eq!(std::fs::read_link(&f.target).unwrap(), f.source);
    }

    #[test]
    fn overwrite_replaces_directory_without_backup() {
        let f = fixture();
        std::fs::create_dir_all(f.target.join("inner")).unwrap();
        let outcome = resource(&f).deploy(&SystemExecutor, &f.backups, None, |current| {
            assert_eq!(current, "target is a directory");
            Ok(ConflictPolicy::Overwrite)
        });
        assert_eq!(outcome, DeployOutcome::Overwritten);
        assert_eq!(std::fs::read_link(&f.target).unwrap(), f.source);
        assert!(f.backups.active_session().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn link_to_other_source_is_incorrect() {
        let f = fixture();
        let other = f.dir.path().join("other");
        std::fs::write(&other, "x").unwrap();
        std::os::unix::fs::symlink(&other, &f.target).unwrap();
        assert!(matches!(
            resource(&f).current_state().unwrap(),
            ResourceState::Incorrect { ref current } if current.starts_with("points to")
        ));
    }

    #[cfg(unix)]
    #[test]
    fn relative_link_to_source_is_correct() {
        let f = fixture();
        let rel = PathBuf::from("../repo/components/zsh/.zshrc");
        std::os::unix::fs::symlink(&rel, &f.target).unwrap();
        assert_eq!(resource(&f).current_state().unwrap(), ResourceState::Correct);
    }

    #[cfg(unix)]
    #[test]
    fn relative_source_text_does_not_match_dangling_link() {
        let f = fixture();
        let rel = PathBuf::from("repo/components/zsh/.zshrc");
        std::os::unix::fs::symlink(&rel, &f.target).unwrap();
        // The link resolves against home/, where nothing exists.
        let r = SymlinkResource::new(rel.clone(), f.target.clone());
        assert!(!r.points_to_source(&rel));
        assert!(resource(&f).points_to_source(&PathBuf::from("../repo/components/zsh/.zshrc")));
    }

    #[test]
    fn failed_backup_fails_only_that_mapping() {
        let f = fixture();
        let blocker = f.dir.path().join("backups-file");
        std::fs::write(&blocker, "not a directory").unwrap();
        let backups = BackupManager::new(
            blocker.join("sessions"),
            f.dir.path().join("home"),
            Arc::new(SystemExecutor),
        );
        std::fs::write(&f.target, "user content").unwrap();

        let outcome = resource(&f).deploy(&SystemExecutor, &backups, Some("zsh"), |_| {
            Ok(ConflictPolicy::Backup)
        });
        assert!(
            matches!(outcome, DeployOutcome::Failed { ref reason } if reason.starts_with("backup failed")),
            "{outcome:?}"
        );
        assert!(!f.target.symlink_metadata().unwrap().is_symlink());
        assert_eq!(std::fs::read_to_string(&f.target).unwrap(), "user content");

        let sibling = f.dir.path().join("home/.zprofile");
        let r = SymlinkResource::new(f.source.clone(), sibling.clone());
        assert_eq!(
            r.deploy(&SystemExecutor, &backups, Some("zsh"), |_| Ok(ConflictPolicy::Backup)),
            DeployOutcome::Created
        );
        assert!(sibling.symlink_metadata().unwrap().is_symlink());
    }

    #[cfg(unix)]
    #[test]
    fn target_reached_through_linked_parent_is_correct() {
        let f = fixture();
        let source = f.dir.path().join("repo/components/nvim/.config/nvim/init.lua");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, "x").unwrap();
        let home_config = f.dir.path().join("home/.config");
        std::fs::create_dir_all(&home_config).unwrap();
        std::os::unix::fs::symlink(source.parent().unwrap(), home_config.join("nvim")).unwrap();

        let r = SymlinkResource::new(source.clone(), home_config.join("nvim/init.lua"));
        assert_eq!(r.current_state().unwrap(), ResourceState::Correct);
        assert_eq!(
            r.deploy(&SystemExecutor, &f.backups, None, never),
            DeployOutcome::AlreadyCorrect
        );
        assert!(source.exists());
    }

    #[test]
    fn failing_decision_is_reported_as_failure() {
        let f = fixture();
        std::fs::write(&f.target, "x").unwrap();
        let outcome = resource(&f).deploy(&SystemExecutor, &f.backups, None, |_| {
            anyhow::bail!("prompt closed")
        });
        assert!(matches!(outcome, DeployOutcome::Failed { ref reason } if reason.contains("prompt closed")));
        assert_eq!(std::fs::read_to_string(&f.target).unwrap(), "x");
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_parent_fails_without_panicking() {
        use std::os::unix::fs::PermissionsExt as _;
        let f = fixture();
        let locked = f.dir.path().join("home/locked");
        std::fs::create_dir_all(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o500)).unwrap();
        let r = SymlinkResource::new(f.source.clone(), locked.join("file"));
        let outcome = r.deploy(&SystemExecutor, &f.backups, None, never);
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o700)).unwrap();
        // Root ignores directory permissions.
        if !matches!(outcome, DeployOutcome::Created) {
            assert!(outcome.is_failure());
        }
    }

    #[test]
    fn dry_run_reports_without_mutation() {
        let f = fixture();
        std::fs::write(&f.target, "user content").unwrap();
        let log = Arc::new(CaptureLog::default());
        let exec = DryRunExecutor::new(log.clone());
        let backups = BackupManager::new(
            f.dir.path().join("backups"),
            f.dir.path().join("home"),
            Arc::new(DryRunExecutor::new(log.clone())),
        );
        let outcome = resource(&f).deploy(&exec, &backups, None, |_| Ok(ConflictPolicy::Backup));
        assert!(matches!(outcome, DeployOutcome::BackedUpAndReplaced { .. }));
        assert_eq!(std::fs::read_to_string(&f.target).unwrap(), "user content");
        assert!(!f.dir.path().join("backups").exists());
        assert!(!log.messages("dry_run").is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn remove_managed_only_removes_links_into_component() {
        let f = fixture();
        let component_root = f.dir.path().join("repo/components/zsh");
        let r = resource(&f);
        assert_eq!(r.remove_managed(&SystemExecutor, &component_root), RemoveOutcome::Absent);

        std::fs::write(&f.target, "user").unwrap();
        assert!(matches!(
            r.remove_managed(&SystemExecutor, &component_root),
            RemoveOutcome::NotManaged { .. }
        ));
        std::fs::remove_file(&f.target).unwrap();

        std::os::unix::fs::symlink("/elsewhere", &f.target).unwrap();
        assert!(matches!(
            r.remove_managed(&SystemExecutor, &component_root),
            RemoveOutcome::NotManaged { .. }
        ));
        std::fs::remove_file(&f.target).unwrap();

        r.deploy(&SystemExecutor, &f.backups, None, never);
        assert_eq!(
            r.remove_managed(&SystemExecutor, &component_root),
            RemoveOutcome::Removed
        );
        assert!(f.target.symlink_metadata().is_err());
        assert!(f.source.exists());
    }
}
