//! File-system helpers shared by the deployer and the backup manager.
//!
//! Every mutation goes through an [`Executor`]; reads touch the real
//! filesystem.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::exec::Executor;

/// Compare two paths for equality, handling UNC prefix normalization on Windows.
#[must_use]
pub fn paths_equal(a: &Path, b: &Path) -> bool {
    let normalize = |p: &Path| -> PathBuf {
        #[cfg(windows)]
        {
            let s = p.to_string_lossy();
            if let Some(stripped) = s.strip_prefix(r"\\?\") {
                return PathBuf::from(stripped);
            }
        }
        p.to_path_buf()
    };

    normalize(a) == normalize(b)
}

/// Whether anything (including a broken symlink) exists at `path`.
#[must_use]
pub fn exists_no_follow(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Ensure the parent directory of `path` exists.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(exec: &dyn Executor, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.is_dir()
    {
        exec.create_dir_all(parent)
            .with_context(|| format!("create parent: {}", parent.display()))?;
    }
    Ok(())
}

/// Copy `src` to `dst`, preserving its type.
///
/// Regular files are copied, directories are copied recursively, and
/// symlinks (at the top level or inside a tree) are recreated pointing at
/// the same destination instead of being followed.  `dst` must not exist.
///
/// # Errors
///
/// Returns an error if `src` cannot be read or any copy fails.
pub fn copy_preserving(exec: &dyn Executor, src: &Path, dst: &Path) -> Result<()> {
    let meta = src
        .symlink_metadata()
        .with_context(|| format!("reading metadata: {}", src.display()))?;

    if !meta.is_dir() {
        return copy_entry(exec, src, dst, &meta);
    }

    for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("relativizing {}", entry.path().display()))?;
        let out = dst.join(rel);
        let entry_meta = entry
            .path()
            .symlink_metadata()
            .with_context(|| format!("reading metadata: {}", entry.path().display()))?;
        if entry_meta.is_dir() {
            exec.create_dir_all(&out)?;
        } else {
            copy_entry(exec, entry.path(), &out, &entry_meta)?;
        }
    }
    Ok(())
}

fn copy_entry(
    exec: &dyn Executor,
    src: &Path,
    dst: &Path,
    meta: &std::fs::Metadata,
) -> Result<()> {
    ensure_parent_dir(exec, dst)?;
    if meta.file_type().is_symlink() {
        let link_target =
            std::fs::read_link(src).with_context(|| format!("reading link: {}", src.display()))?;
        exec.symlink(&link_target, dst)
    } else {
        exec.copy_file(src, dst)
    }
}
