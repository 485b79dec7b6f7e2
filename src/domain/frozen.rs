//! Frozen (fully pinned) requirements manifest

use super::change::{ChangeKind, ManifestChange};
use super::requirement::normalize_name;
use super::snapshot::ConstraintSnapshot;
use super::version::{compare_versions, Pep440Version};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// How a manifest entry is pinned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pin {
    /// `name==version`
    Exact(String),
    /// `name @ url`
    DirectReference(String),
}

/// One requirement line of a frozen manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub pin: Pin,
    pub marker: Option<String>,
}

impl ManifestEntry {
    pub fn exact(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pin: Pin::Exact(version.into()),
            marker: None,
        }
    }

    /// Pinned version, None for direct references
    pub fn version(&self) -> Option<&str> {
        match &self.pin {
            Pin::Exact(version) => Some(version),
            Pin::DirectReference(_) => None,
        }
    }

    fn display_pin(&self) -> String {
        match &self.pin {
            Pin::Exact(version) => version.clone(),
            Pin::DirectReference(url) => format!("@ {}", url),
        }
    }
}

/// A pinned package whose manifest version is below the base image's version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorViolation {
    pub name: String,
    pub floor: String,
    pub pinned: String,
}

impl std::fmt::Display for FloorViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} pinned to {} but the base image ships {}",
            self.name, self.pinned, self.floor
        )
    }
}

/// Fully pinned, transitively complete dependency list
///
/// Keeps the compiler's output byte-for-byte in `raw`; `entries` is the
/// parsed view used for verification and reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrozenManifest {
    pub raw: String,
    pub entries: Vec<ManifestEntry>,
}

impl FrozenManifest {
    pub fn new(raw: impl Into<String>, entries: Vec<ManifestEntry>) -> Self {
        Self {
            raw: raw.into(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find an entry by any spelling of its name
    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        let wanted = normalize_name(name);
        self.entries
            .iter()
            .find(|entry| normalize_name(&entry.name) == wanted)
    }

    /// Entries pinned below the version the snapshot captured
    pub fn floor_violations(&self, snapshot: &ConstraintSnapshot) -> Vec<FloorViolation> {
        self.entries
            .iter()
            .filter_map(|entry| {
                let pinned = entry.version()?;
                let floor = snapshot.version_of(&entry.name)?;
                let below = match (Pep440Version::parse(pinned), Pep440Version::parse(floor)) {
                    (Some(pinned), Some(floor)) => pinned < floor,
                    // Unparseable versions only pass when identical
                    _ => pinned != floor,
                };
                below.then(|| FloorViolation {
                    name: entry.name.clone(),
                    floor: floor.to_string(),
                    pinned: pinned.to_string(),
                })
            })
            .collect()
    }

    /// Per-package differences going from `previous` to `self`, sorted by name
    pub fn changes_from(&self, previous: &FrozenManifest) -> Vec<ManifestChange> {
        let index = |manifest: &FrozenManifest| -> BTreeMap<String, ManifestEntry> {
            manifest
                .entries
                .iter()
                .map(|entry| (normalize_name(&entry.name), entry.clone()))
                .collect()
        };
        let before = index(previous);
        let after = index(self);

        let mut changes = Vec::new();
        for (key, old) in &before {
            match after.get(key) {
                None => changes.push(ManifestChange::new(
                    &old.name,
                    Some(old.display_pin()),
                    None,
                    ChangeKind::Removed,
                )),
                Some(new) if new.pin != old.pin => {
                    let kind = match (old.version(), new.version()) {
                        (Some(from), Some(to)) => match compare_versions(from, to) {
                            Ordering::Greater => ChangeKind::Downgraded,
                            _ => ChangeKind::Upgraded,
                        },
                        _ => ChangeKind::Repinned,
                    };
                    changes.push(ManifestChange::new(
                        &new.name,
                        Some(old.display_pin()),
                        Some(new.display_pin()),
                        kind,
                    ));
                }
                Some(_) => {}
            }
        }
        for (key, new) in &after {
            if !before.contains_key(key) {
                changes.push(ManifestChange::new(
                    &new.name,
                    None,
                    Some(new.display_pin()),
                    ChangeKind::Added,
                ));
            }
        }
        changes.sort_by_key(|change| normalize_name(&change.name));
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PinnedPackage;

    fn manifest(entries: &[(&str, &str)]) -> FrozenManifest {
        let entries: Vec<ManifestEntry> = entries
            .iter()
            .map(|(name, version)| ManifestEntry::exact(*name, *version))
            .collect();
        let raw: String = entries
            .iter()
            .map(|entry| format!("{}=={}\n", entry.name, entry.version().unwrap()))
            .collect();
        FrozenManifest::new(raw, entries)
    }

    #[test]
    fn test_get_by_normalized_name() {
        let m = manifest(&[("jupyter_server", "2.14.0")]);
        assert!(m.get("jupyter-server").is_some());
        assert!(m.get("notebook").is_none());
    }

    #[test]
    fn test_floor_violations_detects_downgrade() {
        let snapshot: ConstraintSnapshot = [
            PinnedPackage::new("pandas", "2.2.1"),
            PinnedPackage::new("numpy", "1.26.4"),
        ]
        .into_iter()
        .collect();

        let ok = manifest(&[("pandas", "2.2.1"), ("numpy", "1.26.4"), ("yarl", "1.9.4")]);
        assert!(ok.floor_violations(&snapshot).is_empty());

        let upgraded = manifest(&[("pandas", "2.2.2")]);
        assert!(upgraded.floor_violations(&snapshot).is_empty());

        let bad = manifest(&[("Pandas", "2.1.4")]);
        let violations = bad.floor_violations(&snapshot);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].floor, "2.2.1");
        assert_eq!(violations[0].pinned, "2.1.4");
        assert!(violations[0].to_string().contains("base image ships 2.2.1"));
    }

    #[test]
    fn test_changes_from_previous() {
        let before = manifest(&[("pandas", "2.2.1"), ("requests", "2.31.0"), ("six", "1.16.0")]);
        let after = manifest(&[("pandas", "2.2.2"), ("requests", "2.31.0"), ("yarl", "1.9.4")]);

        let changes = after.changes_from(&before);
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].name, "pandas");
        assert_eq!(changes[0].kind, ChangeKind::Upgraded);
        assert_eq!(changes[1].name, "six");
        assert_eq!(changes[1].kind, ChangeKind::Removed);
        assert_eq!(changes[2].name, "yarl");
        assert_eq!(changes[2].kind, ChangeKind::Added);
        assert_eq!(changes[2].to.as_deref(), Some("1.9.4"));
    }

    #[test]
    fn test_changes_from_identical_is_empty() {
        let m = manifest(&[("requests", "2.31.0")]);
        assert!(m.changes_from(&m.clone()).is_empty());
    }

    #[test]
    fn test_changes_downgrade() {
        let before = manifest(&[("urllib3", "2.2.1")]);
        let after = manifest(&[("urllib3", "1.26.18")]);
        let changes = after.changes_from(&before);
        assert_eq!(changes[0].kind, ChangeKind::Downgraded);
    }
}
