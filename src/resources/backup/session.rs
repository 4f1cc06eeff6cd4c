//! Backup session layout and the `session.toml` sidecar.
//!
//! ```text
//! <backup-root>/<id>/
//!   session.toml      id, created, creator, version, entries
//!   home/...          copies of paths under $HOME
//!   root/...          copies of absolute paths outside $HOME
//! ```
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::config::toml_loader;
use crate::error::BackupError;

/// Name of the metadata file inside a session directory.
pub const METADATA_FILE: &str = "session.toml";
/// Subtree holding copies of paths under the home directory.
pub const HOME_TREE: &str = "home";
/// Subtree holding copies of other absolute paths.
pub const ROOT_TREE: &str = "root";

/// What was backed up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory tree.
    Directory,
    /// Symbolic link, restored pointing at its original destination.
    Symlink,
}

impl EntryKind {
    /// Classify `meta` without following symlinks.
    #[must_use]
    pub fn of(meta: &std::fs::Metadata) -> Self {
        let ft = meta.file_type();
        if ft.is_symlink() {
            Self::Symlink
        } else if ft.is_dir() {
            Self::Directory
        } else {
            Self::File
        }
    }
}

/// Where a backed-up path originally lived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Under the home directory.
    User,
    /// Anywhere else.
    System,
}

/// One backed-up path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    /// Location of the copy, relative to the session directory.
    pub relative: PathBuf,
    /// Absolute path the copy was taken from.
    pub original: PathBuf,
    /// Type of the original.
    pub kind: EntryKind,
    /// User or system path.
    pub origin: Origin,
    /// Component whose deployment triggered the backup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

/// Contents of `session.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    /// Session identifier (directory name).
    pub id: String,
    /// Creation time, RFC 3339.
    pub created: String,
    /// User that created the session.
    pub creator: String,
    /// Tool version that created the session.
    pub version: String,
    /// Backed-up paths in backup order.
    #[serde(default)]
    pub entries: Vec<BackupEntry>,
}

/// A backup session on disk.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session identifier.
    pub id: String,
    /// Session directory.
    pub dir: PathBuf,
    /// Loaded or reconstructed metadata.
    pub meta: SessionMeta,
    /// Whether `meta` was reconstructed by scanning instead of read from disk.
    pub scanned: bool,
}

impl Session {
    /// Load the session stored in `dir`.
    ///
    /// Without a `session.toml`, entries are reconstructed from the `home/`
    /// and `root/` subtrees.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::SessionNotFound`] if `dir` is not a directory
    /// and [`BackupError::Metadata`] if `session.toml` exists but is invalid.
    pub fn open(dir: &Path, home: &Path) -> Result<Self, BackupError> {
        let id = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if !dir.is_dir() {
            return Err(BackupError::SessionNotFound(id));
        }

        let meta_path = dir.join(METADATA_FILE);
        let loaded: Option<SessionMeta> =
            toml_loader::load_optional_toml(&meta_path).map_err(|e| BackupError::Metadata {
                path: meta_path.display().to_string(),
                reason: format!("{e:#}"),
            })?;

        Ok(match loaded {
            Some(meta) => Self {
                id,
                dir: dir.to_path_buf(),
                meta,
                scanned: false,
            },
            None => Self {
                meta: scan(dir, &id, home),
                id,
                dir: dir.to_path_buf(),
                scanned: true,
            },
        })
    }

    /// Path of `entry`'s copy inside this session.
    #[must_use]
    pub fn copy_path(&self, entry: &BackupEntry) -> PathBuf {
        self.dir.join(&entry.relative)
    }

    /// Entry recorded for `original`, if any.
    #[must_use]
    pub fn entry_for(&self, original: &Path) -> Option<&BackupEntry> {
        self.meta.entries.iter().find(|e| e.original == original)
    }
}

/// Where a copy of `path` is stored relative to the session directory.
#[must_use]
pub fn layout(path: &Path, home: &Path) -> (PathBuf, Origin) {
    if let Ok(rel) = path.strip_prefix(home) {
        return (Path::new(HOME_TREE).join(rel), Origin::User);
    }
    let rel: PathBuf = path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    (Path::new(ROOT_TREE).join(rel), Origin::System)
}

/// Original absolute path for a session-relative copy path.
#[must_use]
pub fn original_for(relative: &Path, home: &Path) -> Option<(PathBuf, Origin)> {
    if let Ok(rel) = relative.strip_prefix(HOME_TREE) {
        return Some((home.join(rel), Origin::User));
    }
    relative
        .strip_prefix(ROOT_TREE)
        .ok()
        .map(|rel| (Path::new("/").join(rel), Origin::System))
}

/// Rebuild entries from the copy subtrees: every file, symlink and empty
/// directory becomes an entry.
fn scan(dir: &Path, id: &str, home: &Path) -> SessionMeta {
    let mut entries = Vec::new();
    for tree in [HOME_TREE, ROOT_TREE] {
        let base = dir.join(tree);
        if !base.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&base)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            let is_empty_dir = entry.file_type().is_dir()
                && std::fs::read_dir(entry.path()).is_ok_and(|mut d| d.next().is_none());
            if entry.file_type().is_dir() && !is_empty_dir {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(dir) else {
                continue;
            };
            let Some((original, origin)) = original_for(relative, home) else {
                continue;
            };
            let kind = entry
                .path()
                .symlink_metadata()
                .map_or(EntryKind::File, |m| EntryKind::of(&m));
            entries.push(BackupEntry {
                relative: relative.to_path_buf(),
                original,
                kind,
                origin,
                component: None,
            });
        }
    }

    SessionMeta {
        id: id.to_string(),
        created: String::new(),
        creator: String::new(),
        version: String::new(),
        entries,
    }
}
