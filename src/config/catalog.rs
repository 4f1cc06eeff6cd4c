//! Component catalog: the read-only metadata every command works from.
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::CatalogError;

/// Key of the table that declares categories instead of a component.
const CATEGORIES_KEY: &str = "categories";

/// One installable component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Component {
    /// Unique key, taken from the table name.
    #[serde(skip)]
    pub name: String,
    /// Display string.
    #[serde(default)]
    pub description: String,
    /// Names of components that must be installed first.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Names of components that cannot coexist with this one.
    #[serde(default)]
    pub conflicts: Vec<String>,
    /// Optional category; see [`CategorySpec::mutually_exclusive`].
    #[serde(default)]
    pub category: Option<String>,
    /// Component-local variant choices.
    #[serde(default)]
    pub options: Vec<String>,
    /// Native package names keyed by distro identifier.
    #[serde(default)]
    pub packages: BTreeMap<String, Vec<String>>,
    /// User services enabled after deployment.
    #[serde(default)]
    pub services: Vec<String>,
    /// Source directory name under `components/`, when it differs from `name`.
    #[serde(default)]
    pub source: Option<String>,
}

impl Component {
    /// Packages to install on `distro` (empty when none are listed).
    #[must_use]
    pub fn packages_for(&self, distro: &str) -> &[String] {
        self.packages.get(distro).map_or(&[], Vec::as_slice)
    }

    /// Directory name of this component's source tree.
    #[must_use]
    pub fn source_dir_name(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.name)
    }
}

/// A declared category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategorySpec {
    /// At most one member of this category may be selected.
    #[serde(default)]
    pub mutually_exclusive: bool,
    /// Display string.
    #[serde(default)]
    pub description: String,
}

/// The loaded component catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    components: BTreeMap<String, Component>,
    categories: BTreeMap<String, CategorySpec>,
}

impl Catalog {
    /// Build a catalog from already-constructed parts.
    ///
    /// Each component's `name` is set from its map key.
    #[must_use]
    pub fn new(
        components: impl IntoIterator<Item = Component>,
        categories: BTreeMap<String, CategorySpec>,
    ) -> Self {
        Self {
            components: components
                .into_iter()
                .map(|c| (c.name.clone(), c))
                .collect(),
            categories,
        }
    }

    /// Load the catalog from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unreadable`] if the file cannot be read and
    /// [`CatalogError::Malformed`] if it does not parse.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Parse a catalog document. `origin` labels errors.
    ///
    /// References to unknown components are accepted here and rejected by
    /// resolution.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Malformed`] if the document is not valid TOML
    /// or a table does not match the component schema.
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, CatalogError> {
        let malformed = |message: String| CatalogError::Malformed {
            path: origin.to_string(),
            message,
        };

        let table: toml::Table = toml::from_str(content).map_err(|e| malformed(e.to_string()))?;

        let mut components = BTreeMap::new();
        let mut categories = BTreeMap::new();
        for (key, value) in table {
            if key == CATEGORIES_KEY {
                categories = value
                    .try_into::<BTreeMap<String, CategorySpec>>()
                    .map_err(|e| malformed(format!("[{CATEGORIES_KEY}]: {e}")))?;
                continue;
            }
            if !value.is_table() {
                return Err(malformed(format!(
                    "'{key}' must be a table describing a component"
                )));
            }
            let mut component: Component = value
                .try_into()
                .map_err(|e| malformed(format!("[{key}]: {e}")))?;
            component.name.clone_from(&key);
            components.insert(key, component);
        }

        Ok(Self {
            components,
            categories,
        })
    }

    /// Look up a component by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    /// Look up a component, failing with the list of known names.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownComponent`] if `name` is not in the catalog.
    pub fn require(&self, name: &str) -> Result<&Component, CatalogError> {
        self.get(name)
            .ok_or_else(|| CatalogError::UnknownComponent {
                name: name.to_string(),
                available: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    /// Whether `name` is a known component.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Component names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Components in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the catalog has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Declared categories.
    #[must_use]
    pub const fn categories(&self) -> &BTreeMap<String, CategorySpec> {
        &self.categories
    }

    /// Whether `category` is declared mutually exclusive.
    #[must_use]
    pub fn is_mutually_exclusive(&self, category: &str) -> bool {
        self.categories
            .get(category)
            .is_some_and(|c| c.mutually_exclusive)
    }
}
