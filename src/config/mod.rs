pub mod catalog;
pub mod toml_loader;
pub mod validation;

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

use crate::error::ResourceError;
use crate::resources::mapping::{self, ConfigMapping};
use catalog::{Catalog, Component};

/// Catalog file name at the repository root.
pub const CATALOG_FILE: &str = "components.toml";

/// Directory holding one source tree per component.
pub const COMPONENTS_DIR: &str = "components";

/// Everything a command needs to know about the repository and the user.
#[derive(Debug, Clone)]
pub struct Config {
    /// Repository root.
    pub root: PathBuf,
    /// Deployment home directory.
    pub home: PathBuf,
    /// Directory holding backup sessions.
    pub backup_root: PathBuf,
    /// Loaded component catalog.
    pub catalog: Catalog,
}

impl Config {
    /// Load the catalog from `root` and bundle it with the resolved paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or parsed.
    pub fn load(root: &Path, home: &Path, backup_root: &Path) -> Result<Self> {
        let catalog_path = root.join(CATALOG_FILE);
        let catalog = Catalog::load(&catalog_path)
            .with_context(|| format!("loading {CATALOG_FILE}"))?;

        Ok(Self {
            root: root.to_path_buf(),
            home: home.to_path_buf(),
            backup_root: backup_root.to_path_buf(),
            catalog,
        })
    }

    /// Source tree of `component`.
    #[must_use]
    pub fn component_dir(&self, component: &Component) -> PathBuf {
        self.root
            .join(COMPONENTS_DIR)
            .join(component.source_dir_name())
    }

    /// Config mappings of `component`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::ComponentDirectoryMissing`] if the component
    /// has no source tree.
    pub fn mappings(&self, component: &Component) -> Result<Vec<ConfigMapping>, ResourceError> {
        mapping::discover(&component.name, &self.component_dir(component), &self.home)
    }

    /// Run every catalog validator.
    #[must_use]
    pub fn validate(&self) -> Vec<validation::ValidationFinding> {
        validation::validate_all(self)
    }
}
