//! Static checks over the catalog and the component source trees.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use super::Config;
use crate::error::ResolveError;
use crate::graph::resolve;

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Worth knowing; never affects the exit status.
    Info,
    /// Probably a mistake, but every command still works.
    Warning,
    /// Some command will fail or misbehave.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A finding reported by a validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFinding {
    /// How serious the finding is.
    pub severity: Severity,
    /// The validator that produced it (e.g., "references", "cycles").
    pub source: String,
    /// The component or item that triggered it.
    pub item: String,
    /// Human-readable message.
    pub message: String,
}

impl ValidationFinding {
    #[must_use]
    pub fn new(
        severity: Severity,
        source: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            source: source.into(),
            item: item.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.source, self.item, self.message)
    }
}

/// A single check over the loaded configuration.
pub trait CatalogValidator {
    /// Validate the configuration and return any findings.
    fn validate(&self, config: &Config) -> Vec<ValidationFinding>;

    /// Short name used as the finding source.
    fn name(&self) -> &'static str;
}

/// Dependencies and conflicts must name catalog components.
#[derive(Debug)]
pub struct ReferenceValidator;

impl CatalogValidator for ReferenceValidator {
    fn validate(&self, config: &Config) -> Vec<ValidationFinding> {
        let catalog = &config.catalog;
        let mut findings = Vec::new();
        for component in catalog.iter() {
            for (kind, names) in [
                ("dependency", &component.dependencies),
                ("conflict", &component.conflicts),
            ] {
                for name in names.iter().filter(|n| !catalog.contains(n)) {
                    findings.push(ValidationFinding::new(
                        Severity::Error,
                        self.name(),
                        &component.name,
                        format!("{kind} '{name}' is not in the catalog"),
                    ));
                }
            }
        }
        findings
    }

    fn name(&self) -> &'static str {
        "references"
    }
}

/// Conflicts declared on one side only.
///
/// Detection already checks both directions, so these are informational.
#[derive(Debug)]
pub struct ConflictSymmetryValidator;

impl CatalogValidator for ConflictSymmetryValidator {
    fn validate(&self, config: &Config) -> Vec<ValidationFinding> {
        let catalog = &config.catalog;
        let mut findings = Vec::new();
        for component in catalog.iter() {
            for other in &component.conflicts {
                let Some(target) = catalog.get(other) else {
                    continue;
                };
                if !target.conflicts.contains(&component.name) {
                    findings.push(ValidationFinding::new(
                        Severity::Info,
                        self.name(),
                        &component.name,
                        format!("conflicts with '{other}' but '{other}' does not declare it back"),
                    ));
                }
            }
        }
        findings
    }

    fn name(&self) -> &'static str {
        "conflicts"
    }
}

/// Categories used by components but never declared.
#[derive(Debug)]
pub struct CategoryValidator;

impl CatalogValidator for CategoryValidator {
    fn validate(&self, config: &Config) -> Vec<ValidationFinding> {
        let declared = config.catalog.categories();
        config
            .catalog
            .iter()
            .filter_map(|c| c.category.as_ref().map(|cat| (c, cat)))
            .filter(|(_, cat)| !declared.contains_key(*cat))
            .map(|(c, cat)| {
                ValidationFinding::new(
                    Severity::Warning,
                    self.name(),
                    &c.name,
                    format!("category '{cat}' is not declared; it is not mutually exclusive"),
                )
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "categories"
    }
}

/// Dependency cycles anywhere in the catalog, each reported once.
#[derive(Debug)]
pub struct CycleValidator;

impl CatalogValidator for CycleValidator {
    fn validate(&self, config: &Config) -> Vec<ValidationFinding> {
        let mut seen: BTreeSet<BTreeSet<String>> = BTreeSet::new();
        let mut findings = Vec::new();
        for name in config.catalog.names() {
            let Err(err) = resolve(&config.catalog, &[name.to_string()]) else {
                continue;
            };
            let ResolveError::CircularDependency { name: closing, path } = &err else {
                continue;
            };
            let members: BTreeSet<String> = path
                .iter()
                .skip_while(|n| *n != closing)
                .cloned()
                .collect();
            if seen.insert(members) {
                findings.push(ValidationFinding::new(
                    Severity::Error,
                    self.name(),
                    closing,
                    err.to_string(),
                ));
            }
        }
        findings
    }

    fn name(&self) -> &'static str {
        "cycles"
    }
}

/// Components without a source tree deploy nothing.
#[derive(Debug)]
pub struct SourceDirValidator;

impl CatalogValidator for SourceDirValidator {
    fn validate(&self, config: &Config) -> Vec<ValidationFinding> {
        config
            .catalog
            .iter()
            .filter(|c| !config.component_dir(c).is_dir())
            .map(|c| {
                ValidationFinding::new(
                    Severity::Warning,
                    self.name(),
                    &c.name,
                    format!(
                        "source directory does not exist: {}",
                        config.component_dir(c).display()
                    ),
                )
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "sources"
    }
}

/// Two components mapping a file to the same target.
///
/// Components that conflict with each other are never installed together,
/// so their overlap is informational.
#[derive(Debug)]
pub struct TargetCollisionValidator;

impl CatalogValidator for TargetCollisionValidator {
    fn validate(&self, config: &Config) -> Vec<ValidationFinding> {
        let catalog = &config.catalog;
        let mut owners: BTreeMap<PathBuf, Vec<&str>> = BTreeMap::new();
        for component in catalog.iter() {
            let Ok(mappings) = config.mappings(component) else {
                continue;
            };
            for mapping in mappings {
                owners
                    .entry(mapping.target)
                    .or_default()
                    .push(component.name.as_str());
            }
        }

        let mut findings = Vec::new();
        for (target, names) in owners.iter().filter(|(_, n)| n.len() > 1) {
            for (i, first) in names.iter().enumerate() {
                for second in names.iter().skip(i + 1) {
                    let exclusive = crate::graph::detect_conflicts(
                        catalog,
                        &[(*first).to_string(), (*second).to_string()],
                    );
                    let severity = if exclusive.is_empty() {
                        Severity::Error
                    } else {
                        Severity::Info
                    };
                    findings.push(ValidationFinding::new(
                        severity,
                        self.name(),
                        *first,
                        format!("'{second}' also deploys {}", target.display()),
                    ));
                }
            }
        }
        findings
    }

    fn name(&self) -> &'static str {
        "targets"
    }
}

/// Run every validator over `config`.
#[must_use]
pub fn validate_all(config: &Config) -> Vec<ValidationFinding> {
    let validators: [&dyn CatalogValidator; 6] = [
        &ReferenceValidator,
        &ConflictSymmetryValidator,
        &CategoryValidator,
        &CycleValidator,
        &SourceDirValidator,
        &TargetCollisionValidator,
    ];
    validators
        .iter()
        .flat_map(|v| v.validate(config))
        .collect()
}

/// Whether any finding is an error.
#[must_use]
pub fn has_errors(findings: &[ValidationFinding]) -> bool {
    findings.iter().any(|f| f.severity == Severity::Error)
}
