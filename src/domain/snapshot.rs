//! Constraint snapshot captured from a base image

use super::requirement::{normalize_name, PinnedPackage};
use std::collections::BTreeMap;

/// Exact versions of every package installed in one image at one point in time
///
/// Keyed by normalized name so iteration, rendering and lookups are
/// deterministic regardless of the order pip listed the packages in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSnapshot {
    packages: BTreeMap<String, PinnedPackage>,
}

impl ConstraintSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a package; a later entry for the same name replaces the earlier one
    pub fn insert(&mut self, package: PinnedPackage) {
        self.packages.insert(package.normalized_name(), package);
    }

    /// Look up the captured version of a package by any spelling of its name
    pub fn version_of(&self, name: &str) -> Option<&str> {
        self.packages
            .get(&normalize_name(name))
            .map(|package| package.version.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(&normalize_name(name))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Packages in normalized-name order
    pub fn iter(&self) -> impl Iterator<Item = &PinnedPackage> {
        self.packages.values()
    }

    /// Render as a constraints file, one `name==version` per line
    pub fn render(&self) -> String {
        self.iter().map(|package| format!("{}\n", package)).collect()
    }
}

impl FromIterator<PinnedPackage> for ConstraintSnapshot {
    fn from_iter<I: IntoIterator<Item = PinnedPackage>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for package in iter {
            snapshot.insert(package);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConstraintSnapshot {
        [
            PinnedPackage::new("requests", "2.31.0"),
            PinnedPackage::new("Jinja2", "3.1.4"),
            PinnedPackage::new("pandas", "2.2.1"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_lookup_by_any_spelling() {
        let snapshot = sample();
        assert_eq!(snapshot.version_of("jinja2"), Some("3.1.4"));
        assert_eq!(snapshot.version_of("JINJA2"), Some("3.1.4"));
        assert!(snapshot.contains("Pandas"));
        assert!(!snapshot.contains("numpy"));
    }

    #[test]
    fn test_render_is_sorted() {
        let snapshot = sample();
        assert_eq!(
            snapshot.render(),
            "Jinja2==3.1.4\npandas==2.2.1\nrequests==2.31.0\n"
        );
    }

    #[test]
    fn test_insert_replaces_same_package() {
        let mut snapshot = sample();
        snapshot.insert(PinnedPackage::new("Requests", "2.32.3"));
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.version_of("requests"), Some("2.32.3"));
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = ConstraintSnapshot::new();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.render(), "");
    }
}
