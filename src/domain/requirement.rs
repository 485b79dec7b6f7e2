//! Requirement declarations and package name normalization

use super::version::SpecifierSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalize a distribution name the way pip compares them:
/// lowercase, with runs of `-`, `_` and `.` collapsed to a single `-`
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut in_separator = false;
    for ch in name.trim().chars() {
        if matches!(ch, '-' | '_' | '.') {
            in_separator = true;
            continue;
        }
        if in_separator && !normalized.is_empty() {
            normalized.push('-');
        }
        in_separator = false;
        normalized.push(ch.to_ascii_lowercase());
    }
    normalized
}

/// One top-level requirement from an abstract dependency spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Name as written in the file
    pub name: String,
    /// Extras requested in brackets, e.g. `requests[socks]`
    pub extras: Vec<String>,
    /// Version clauses (empty for an unconstrained requirement)
    pub specifiers: SpecifierSet,
    /// Environment marker after `;`
    pub marker: Option<String>,
    /// URL for `name @ url` direct references
    pub url: Option<String>,
}

impl Requirement {
    /// Create an unconstrained requirement
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extras: Vec::new(),
            specifiers: SpecifierSet::default(),
            marker: None,
            url: None,
        }
    }

    /// Builder method to set version clauses
    pub fn with_specifiers(mut self, specifiers: SpecifierSet) -> Self {
        self.specifiers = specifiers;
        self
    }

    /// PEP 503 normalized name
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Returns true for `name @ url` requirements
    pub fn is_direct_reference(&self) -> bool {
        self.url.is_some()
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        if let Some(url) = &self.url {
            write!(f, " @ {}", url)?;
        } else if !self.specifiers.is_empty() {
            write!(f, "{}", self.specifiers)?;
        }
        if let Some(marker) = &self.marker {
            write!(f, " ; {}", marker)?;
        }
        Ok(())
    }
}

/// A single pinned package, as captured in a snapshot or a frozen manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedPackage {
    pub name: String,
    pub version: String,
}

impl PinnedPackage {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }
}

impl fmt::Display for PinnedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Requests"), "requests");
        assert_eq!(normalize_name("jupyter_server"), "jupyter-server");
        assert_eq!(normalize_name("zope.interface"), "zope-interface");
        assert_eq!(normalize_name("A__b-.C"), "a-b-c");
        assert_eq!(normalize_name("  ruamel.yaml.clib "), "ruamel-yaml-clib");
    }

    #[test]
    fn test_requirement_display() {
        let req = Requirement::new("pandas").with_specifiers(SpecifierSet::parse(">=2.2").unwrap());
        assert_eq!(req.to_string(), "pandas>=2.2");

        let mut req = Requirement::new("requests");
        req.extras = vec!["socks".to_string()];
        req.marker = Some("python_version >= \"3.9\"".to_string());
        assert_eq!(req.to_string(), "requests[socks] ; python_version >= \"3.9\"");
    }

    #[test]
    fn test_pinned_package_display() {
        let pin = PinnedPackage::new("Jinja2", "3.1.4");
        assert_eq!(pin.to_string(), "Jinja2==3.1.4");
        assert_eq!(pin.normalized_name(), "jinja2");
    }
}
