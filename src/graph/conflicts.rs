//! Conflict detection over a resolved installation set.
//!
//! Findings are advisory; the caller decides whether to proceed.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::config::catalog::Catalog;

/// Why two components cannot be installed together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConflictReason {
    /// One of the two lists the other in `conflicts`.
    Declared,
    /// Both belong to the same mutually exclusive category.
    CategoryExclusion {
        /// The shared category.
        category: String,
    },
}

/// A pair of components that cannot coexist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Component encountered first in the installation set.
    pub first: String,
    /// The other component.
    pub second: String,
    /// Why they conflict.
    pub reason: ConflictReason,
}

impl Conflict {
    /// Whether `name` is one of the two components.
    #[must_use]
    pub fn involves(&self, name: &str) -> bool {
        self.first == name || self.second == name
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            ConflictReason::Declared => {
                write!(f, "{} conflicts with {}", self.first, self.second)
            }
            ConflictReason::CategoryExclusion { category } => write!(
                f,
                "{} and {} are both in mutually exclusive category '{category}'",
                self.first, self.second
            ),
        }
    }
}

/// Every conflict found in an installation set, each pair reported once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
    conflicts: Vec<Conflict>,
}

impl ConflictReport {
    /// Whether no conflicts were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Number of conflicts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    /// Iterate over the conflicts in detection order.
    pub fn iter(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter()
    }
}

/// Unordered pair plus reason, used to drop mirrored findings.
type PairKey = (String, String, ConflictReason);

fn pair_key(a: &str, b: &str, reason: &ConflictReason) -> PairKey {
    if a <= b {
        (a.to_string(), b.to_string(), reason.clone())
    } else {
        (b.to_string(), a.to_string(), reason.clone())
    }
}

/// Find declared conflicts and category exclusions within `set`.
///
/// Declared conflicts are checked in both directions, so a conflict listed
/// on only one side is still found. Names in `set` that are not in the
/// catalog are ignored.
#[must_use]
pub fn detect_conflicts(catalog: &Catalog, set: &[String]) -> ConflictReport {
    let members: HashSet<&str> = set.iter().map(String::as_str).collect();
    let mut seen: HashSet<PairKey> = HashSet::new();
    let mut conflicts = Vec::new();

    let mut record = |a: &str, b: &str, reason: ConflictReason| {
        if seen.insert(pair_key(a, b, &reason)) {
            conflicts.push(Conflict {
                first: a.to_string(),
                second: b.to_string(),
                reason,
            });
        }
    };

    for name in set {
        let Some(component) = catalog.get(name) else {
            continue;
        };
        for other in &component.conflicts {
            if other != name && members.contains(other.as_str()) {
                record(name.as_str(), other.as_str(), ConflictReason::Declared);
            }
        }
    }

    let mut by_category: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut grouped: HashSet<&str> = HashSet::new();
    for name in set {
        if !grouped.insert(name.as_str()) {
            continue;
        }
        if let Some(category) = catalog.get(name).and_then(|c| c.category.as_deref())
            && catalog.is_mutually_exclusive(category)
        {
            by_category.entry(category).or_default().push(name.as_str());
        }
    }
    for (category, names) in by_category {
        for (i, a) in names.iter().enumerate() {
            for b in names.iter().skip(i + 1) {
                record(
                    *a,
                    *b,
                    ConflictReason::CategoryExclusion {
                        category: category.to_string(),
                    },
                );
            }
        }
    }

    ConflictReport { conflicts }
}
