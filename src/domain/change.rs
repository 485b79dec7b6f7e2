//! Manifest change and run report types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of change a package went through between two manifests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Upgraded,
    Downgraded,
    /// Pin switched between a version and a direct reference
    Repinned,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Upgraded => "upgraded",
            ChangeKind::Downgraded => "downgraded",
            ChangeKind::Repinned => "repinned",
        }
    }
}

/// Difference for a single package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestChange {
    pub name: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub kind: ChangeKind,
}

impl ManifestChange {
    pub fn new(
        name: impl Into<String>,
        from: Option<String>,
        to: Option<String>,
        kind: ChangeKind,
    ) -> Self {
        Self {
            name: name.into(),
            from,
            to,
            kind,
        }
    }
}

/// Outcome of one re-freeze run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreezeReport {
    /// Base image the snapshot was taken from
    pub image: String,
    /// Target platform the environment ran on
    pub platform: String,
    /// Manifest path relative to the working tree
    pub manifest: PathBuf,
    /// Whether this was a dry-run
    pub dry_run: bool,
    /// Number of packages captured from the base image
    pub snapshot_packages: usize,
    /// Number of pinned entries in the new manifest
    pub pinned_packages: usize,
    /// Whether the manifest file content changed
    pub manifest_changed: bool,
    /// Per-package changes against the previous manifest
    pub changes: Vec<ManifestChange>,
    /// Engine commands that would run (dry-run only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub planned_commands: Vec<String>,
}

impl FreezeReport {
    /// Creates an empty report for the given image and manifest
    pub fn new(image: impl Into<String>, platform: impl Into<String>, manifest: PathBuf) -> Self {
        Self {
            image: image.into(),
            platform: platform.into(),
            manifest,
            dry_run: false,
            snapshot_packages: 0,
            pinned_packages: 0,
            manifest_changed: false,
            changes: Vec::new(),
            planned_commands: Vec::new(),
        }
    }

    /// Returns the number of changes of the given kind
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let mut report = FreezeReport::new("example/base:1.0", "linux/amd64", "requirements.txt".into());
        report.changes.push(ManifestChange::new(
            "pandas",
            Some("2.2.1".into()),
            Some("2.2.2".into()),
            ChangeKind::Upgraded,
        ));
        report.changes.push(ManifestChange::new(
            "yarl",
            None,
            Some("1.9.4".into()),
            ChangeKind::Added,
        ));
        assert!(report.has_changes());
        assert_eq!(report.count(ChangeKind::Upgraded), 1);
        assert_eq!(report.count(ChangeKind::Added), 1);
        assert_eq!(report.count(ChangeKind::Removed), 0);
    }

    #[test]
    fn test_change_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ChangeKind::Downgraded).unwrap();
        assert_eq!(json, "\"downgraded\"");
    }
}
