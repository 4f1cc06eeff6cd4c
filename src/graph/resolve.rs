//! Dependency closure over the component catalog.

use std::collections::HashSet;

use crate::config::catalog::Catalog;
use crate::error::ResolveError;

/// Result of resolving a user selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Every component to install, dependencies before dependents.
    pub resolved: Vec<String>,
    /// Components pulled in as dependencies rather than selected directly.
    pub added: Vec<String>,
}

impl Resolution {
    /// Whether `name` is part of the installation set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.resolved.iter().any(|n| n == name)
    }

    /// Whether `name` was added as a dependency.
    #[must_use]
    pub fn is_added(&self, name: &str) -> bool {
        self.added.iter().any(|n| n == name)
    }
}

/// Compute the smallest superset of `selected` closed under dependencies.
///
/// Selections are walked in the order given and each component's
/// dependencies in declared order, so the result order is deterministic.
///
/// # Errors
///
/// Returns [`ResolveError::CircularDependency`] if a component transitively
/// depends on itself and [`ResolveError::UnknownComponent`] if a selected name
/// or a declared dependency is not in the catalog, and
/// [`ResolveError::UnknownConflict`] if a component of the closure declares a
/// conflict with an unknown name. No partial result is returned.
pub fn resolve(catalog: &Catalog, selected: &[String]) -> Result<Resolution, ResolveError> {
    let mut walk = Walk {
        catalog,
        resolved: Vec::new(),
        done: HashSet::new(),
        in_progress: Vec::new(),
    };
    for name in selected {
        walk.visit(name, None)?;
    }

    let requested: HashSet<&str> = selected.iter().map(String::as_str).collect();
    let added = walk
        .resolved
        .iter()
        .filter(|n| !requested.contains(n.as_str()))
        .cloned()
        .collect();

    Ok(Resolution {
        resolved: walk.resolved,
        added,
    })
}

/// Components in the catalog that directly depend on `name`.
#[must_use]
pub fn dependents_of<'a>(catalog: &'a Catalog, name: &str) -> Vec<&'a str> {
    catalog
        .iter()
        .filter(|c| c.dependencies.iter().any(|d| d == name))
        .map(|c| c.name.as_str())
        .collect()
}

/// Depth-first walk state: `done` is the closed set, `in_progress` the
/// active resolution path.
struct Walk<'a> {
    catalog: &'a Catalog,
    resolved: Vec<String>,
    done: HashSet<String>,
    in_progress: Vec<String>,
}

impl Walk<'_> {
    fn visit(&mut self, name: &str, parent: Option<&str>) -> Result<(), ResolveError> {
        if self.done.contains(name) {
            return Ok(());
        }

        if let Some(pos) = self.in_progress.iter().position(|n| n == name) {
            let mut path: Vec<String> = self.in_progress.iter().skip(pos).cloned().collect();
            path.push(name.to_string());
            return Err(ResolveError::CircularDependency {
                name: name.to_string(),
                path,
            });
        }

        let component = self
            .catalog
            .get(name)
            .ok_or_else(|| ResolveError::UnknownComponent {
                name: name.to_string(),
                required_by: parent.map(String::from),
            })?;

        self.in_progress.push(name.to_string());
        for dep in &component.dependencies {
            self.visit(dep, Some(name))?;
        }
        self.in_progress.pop();

        // A misspelt conflict would otherwise hide a real one from detection.
        if let Some(missing) = component
            .conflicts
            .iter()
            .find(|c| !self.catalog.contains(c.as_str()))
        {
            return Err(ResolveError::UnknownConflict {
                name: missing.clone(),
                declared_by: name.to_string(),
            });
        }

        self.done.insert(name.to_string());
        self.resolved.push(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::catalog::Component;
    use std::collections::BTreeMap;

    fn component(name: &str, deps: &[&str]) -> Component {
        Component {
            name: name.to_string(),
            dependencies: deps.iter().map(ToString::to_string).collect(),
            ..Component::default()
        }
    }

    fn catalog(components: Vec<Component>) -> Catalog {
        Catalog::new(components, BTreeMap::new())
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn chain_pulls_in_transitive_dependencies() {
        let cat = catalog(vec![
            component("A", &[]),
            component("B", &["A"]),
            component("C", &["B"]),
        ]);
        let res = resolve(&cat, &names(&["C"])).unwrap();
        assert_eq!(res.resolved, names(&["A", "B", "C"]));
        assert_eq!(res.added, names(&["A", "B"]));
        assert!(res.is_added("A"));
        assert!(!res.is_added("C"));
    }

    #[test]
    fn dependencies_precede_dependents() {
        let cat = catalog(vec![
            component("base", &[]),
            component("fonts", &["base"]),
            component("kitty", &["fonts", "base"]),
            component("zsh", &["base"]),
        ]);
        let res = resolve(&cat, &names(&["zsh", "kitty"])).unwrap();
        let pos = |n: &str| res.resolved.iter().position(|x| x == n).unwrap();
        assert!(pos("base") < pos("zsh"));
        assert!(pos("fonts") < pos("kitty"));
        assert!(pos("base") < pos("fonts"));
        assert_eq!(res.resolved.len(), 4);
    }

    #[test]
    fn selected_dependency_is_not_reported_as_added() {
        let cat = catalog(vec![component("A", &[]), component("B", &["A"])]);
        let res = resolve(&cat, &names(&["B", "A"])).unwrap();
        assert!(res.added.is_empty());
        assert_eq!(res.resolved, names(&["A", "B"]));
    }

    #[test]
    fn duplicate_selection_is_deduplicated() {
        let cat = catalog(vec![component("A", &[])]);
        let res = resolve(&cat, &names(&["A", "A"])).unwrap();
        assert_eq!(res.resolved, names(&["A"]));
    }

    #[test]
    fn mutual_cycle_fails() {
        let cat = catalog(vec![component("X", &["Y"]), component("Y", &["X"])]);
        let err = resolve(&cat, &names(&["X"])).unwrap_err();
        assert_eq!(
            err,
            ResolveError::CircularDependency {
                name: "X".to_string(),
                path: names(&["X", "Y", "X"]),
            }
        );
    }

    #[test]
    fn self_cycle_fails() {
        let cat = catalog(vec![component("X", &["X"])]);
        assert!(matches!(
            resolve(&cat, &names(&["X"])),
            Err(ResolveError::CircularDependency { .. })
        ));
    }

    #[test]
    fn cycle_below_selection_reports_inner_path() {
        let cat = catalog(vec![
            component("top", &["a"]),
            component("a", &["b"]),
            component("b", &["a"]),
        ]);
        let err = resolve(&cat, &names(&["top"])).unwrap_err();
        assert_eq!(err.to_string(), "circular dependency on 'a': a -> b -> a");
    }

    #[test]
    fn unknown_selection_fails() {
        let cat = catalog(vec![component("A", &[])]);
        let err = resolve(&cat, &names(&["nope"])).unwrap_err();
        assert_eq!(
            err,
            ResolveError::UnknownComponent {
                name: "nope".to_string(),
                required_by: None,
            }
        );
    }

    #[test]
    fn unknown_dependency_names_parent() {
        let cat = catalog(vec![component("kitty", &["fonts"])]);
        let err = resolve(&cat, &names(&["kitty"])).unwrap_err();
        assert_eq!(
            err,
            ResolveError::UnknownComponent {
                name: "fonts".to_string(),
                required_by: Some("kitty".to_string()),
            }
        );
    }

    #[test]
    fn unknown_conflict_is_rejected() {
        let cat = catalog(vec![Component {
            conflicts: names(&["ghost"]),
            ..component("a", &[])
        }]);
        let err = resolve(&cat, &names(&["a"])).unwrap_err();
        assert_eq!(
            err,
            ResolveError::UnknownConflict {
                name: "ghost".to_string(),
                declared_by: "a".to_string(),
            }
        );
        assert_eq!(
            err.to_string(),
            "unknown component 'ghost' in conflicts of 'a'"
        );
    }

    #[test]
    fn unknown_conflict_of_dependency_is_rejected() {
        let cat = catalog(vec![
            Component {
                conflicts: names(&["alacrity"]),
                ..component("fonts", &[])
            },
            component("kitty", &["fonts"]),
        ]);
        assert!(matches!(
            resolve(&cat, &names(&["kitty"])),
            Err(ResolveError::UnknownConflict { ref declared_by, .. }) if declared_by == "fonts"
        ));
    }

    #[test]
    fn resolve_is_idempotent() {
        let cat = catalog(vec![
            component("A", &[]),
            component("B", &["A"]),
            component("C", &["B", "A"]),
            component("D", &[]),
        ]);
        let first = resolve(&cat, &names(&["C", "D"])).unwrap();
        let second = resolve(&cat, &first.resolved).unwrap();
        assert_eq!(first.resolved, second.resolved);
        assert!(second.added.is_empty());
    }

    #[test]
    fn empty_selection_resolves_to_nothing() {
        let cat = catalog(vec![component("A", &[])]);
        assert_eq!(resolve(&cat, &[]).unwrap(), Resolution::default());
    }

    #[test]
    fn dependents_lists_direct_dependents() {
        let cat = catalog(vec![
            component("fonts", &[]),
            component("kitty", &["fonts"]),
            component("alacritty", &["fonts"]),
            component("zsh", &[]),
        ]);
        assert_eq!(dependents_of(&cat, "fonts"), vec!["alacritty", "kitty"]);
        assert!(dependents_of(&cat, "zsh").is_empty());
    }
}
