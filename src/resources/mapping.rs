//! Source-to-target mapping for a component's configuration tree.
//!
//! Every regular file under `components/<name>/` is deployed under the home
//! directory:
//!
//! ```text
//! <comp>/.config/kitty/kitty.conf  ->  $HOME/.config/kitty/kitty.conf
//! <comp>/.zshrc                    ->  $HOME/.zshrc
//! <comp>/readme.txt                ->  $HOME/.config/readme.txt
//! ```
use std::path::{Component as PathComponent, Path, PathBuf};
use walkdir::WalkDir;

use super::error::ResourceError;

/// Directory under the home directory that non-dotfiles are placed in.
const CONFIG_DIR: &str = ".config";

/// A file in a component tree and where it is deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMapping {
    /// Absolute path inside the component's source tree.
    pub source: PathBuf,
    /// Absolute deployment path under the home directory.
    pub target: PathBuf,
}

/// Compute the deployment target for a path relative to a component root.
#[must_use]
pub fn target_for(relative: &Path, home: &Path) -> PathBuf {
    let first = relative.components().next();
    let is_dotfile = matches!(
        first,
        Some(PathComponent::Normal(name)) if name.to_string_lossy().starts_with('.')
    );
    if is_dotfile {
        home.join(relative)
    } else {
        home.join(CONFIG_DIR).join(relative)
    }
}

/// Enumerate every regular file under `root` with its deployment target.
///
/// Directories are not mapped themselves, symlinks inside the tree are not
/// followed, and `.git` directories are skipped.  An empty tree yields an
/// empty list.  Results are sorted by source path.
///
/// # Errors
///
/// Returns [`ResourceError::ComponentDirectoryMissing`] if `root` is not a
/// directory and [`ResourceError::Walk`] if part of the tree cannot be read.
pub fn discover(
    component: &str,
    root: &Path,
    home: &Path,
) -> Result<Vec<ConfigMapping>, ResourceError> {
    if !root.is_dir() {
        return Err(ResourceError::ComponentDirectoryMissing {
            component: component.to_string(),
            path: root.display().to_string(),
        });
    }

    let mut mappings = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && e.file_name() == ".git"));

    for entry in walker {
        let entry = entry.map_err(|e| ResourceError::Walk {
            path: e
                .path()
                .map_or_else(|| root.display().to_string(), |p| p.display().to_string()),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        mappings.push(ConfigMapping {
            target: target_for(relative, home),
            source: entry.path().to_path_buf(),
        });
    }

    mappings.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(mappings)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, rel).unwrap();
    }

    #[test]
    fn config_subtree_maps_to_home_config() {
        let home = Path::new("/home/u");
        assert_eq!(
            target_for(Path::new(".config/kitty/kitty.conf"), home),
            PathBuf::from("/home/u/.config/kitty/kitty.conf")
        );
    }

    #[test]
    fn dotfile_maps_to_home() {
        let home = Path::new("/home/u");
        assert_eq!(
            target_for(Path::new(".zshrc"), home),
            PathBuf::from("/home/u/.zshrc")
        );
        assert_eq!(
            target_for(Path::new(".local/bin/tool"), home),
            PathBuf::from("/home/u/.local/bin/tool")
        );
    }

    #[test]
    fn other_files_map_under_config() {
        let home = Path::new("/home/u");
        assert_eq!(
            target_for(Path::new("readme.txt"), home),
            PathBuf::from("/home/u/.config/readme.txt")
        );
        assert_eq!(
            target_for(Path::new("nvim/init.lua"), home),
            PathBuf::from("/home/u/.config/nvim/init.lua")
        );
    }

    #[test]
    fn discover_maps_every_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("term");
        write(&root, ".config/kitty/kitty.conf");
        write(&root, ".zshrc");
        write(&root, "readme.txt");
        let home = dir.path().join("home");

        let mappings = discover("term", &root, &home).unwrap();
        let targets: Vec<PathBuf> = mappings.iter().map(|m| m.target.clone()).collect();
        assert_eq!(
            targets,
            vec![
                home.join(".config/kitty/kitty.conf"),
                home.join(".zshrc"),
                home.join(".config/readme.txt"),
            ]
        );
        assert_eq!(mappings[1].source, root.join(".zshrc"));
    }

    #[test]
    fn discover_empty_component_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("empty");
        std::fs::create_dir_all(root.join("nested/dir")).unwrap();
        assert!(discover("empty", &root, dir.path()).unwrap().is_empty());
    }

    #[test]
    fn discover_missing_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover("ghost", &dir.path().join("ghost"), dir.path()).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::ComponentDirectoryMissing { ref component, .. } if component == "ghost"
        ));
    }

    #[test]
    fn discover_skips_git_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("c");
        write(&root, ".git/HEAD");
        write(&root, ".gitconfig");
        let mappings = discover("c", &root, dir.path()).unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].target, dir.path().join(".gitconfig"));
    }

    #[cfg(unix)]
    #[test]
    fn discover_ignores_symlinks_in_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("c");
        write(&root, "real.conf");
        std::os::unix::fs::symlink(root.join("real.conf"), root.join("alias.conf")).unwrap();
        let mappings = discover("c", &root, dir.path()).unwrap();
        assert_eq!(mappings.len(), 1);
    }
}
