//! Requirements file parsing
//!
//! Handles the three plain-text formats the workflow moves around:
//! - Abstract dependency specs (`requirements.in`): `name[extras] specifiers ; marker`
//! - Package listings from `pip list --format=freeze`: strict `name==version`
//! - Compiled manifests (`requirements.txt`): pinned lines with `# via`
//!   annotations, option lines and `--hash` continuations

use crate::domain::{
    ConstraintSnapshot, FrozenManifest, ManifestEntry, Pin, PinnedPackage, Requirement,
    SpecifierSet,
};
use crate::error::{ManifestError, SnapshotError};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[([^\]]*)\])?\s*(.*)$")
        .unwrap()
});
static PINNED_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)==([A-Za-z0-9][A-Za-z0-9.+!_-]*)$")
        .unwrap()
});

/// Join `\` continuations and drop comments, keeping the starting line number
fn logical_lines(content: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw_line) in content.lines().enumerate() {
        let without_comment = strip_comment(raw_line);
        let (text, continues) = match without_comment.trim_end().strip_suffix('\\') {
            Some(rest) => (rest.trim(), true),
            None => (without_comment.trim(), false),
        };

        let (start, mut buffer) = pending.take().unwrap_or((idx + 1, String::new()));
        if !buffer.is_empty() && !text.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(text);

        if continues {
            pending = Some((start, buffer));
        } else if !buffer.is_empty() {
            lines.push((start, buffer));
        }
    }

    if let Some((start, buffer)) = pending {
        if !buffer.is_empty() {
            lines.push((start, buffer));
        }
    }
    lines
}

/// Remove a `#` comment that starts the line or follows whitespace
fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        return "";
    }
    let bytes = line.as_bytes();
    for (idx, ch) in line.char_indices() {
        if ch == '#' && idx > 0 && bytes[idx - 1].is_ascii_whitespace() {
            return &line[..idx];
        }
    }
    line
}

/// Parse a single requirement such as `pandas[performance]>=2.2 ; python_version>="3.10"`
pub fn parse_requirement(text: &str) -> Option<Requirement> {
    let (body, marker) = match text.split_once(';') {
        Some((body, marker)) => (body.trim(), Some(marker.trim().to_string())),
        None => (text.trim(), None),
    };

    let caps = NAME_RE.captures(body)?;
    let mut requirement = Requirement::new(caps.get(1)?.as_str());
    requirement.extras = caps
        .get(2)
        .map(|m| {
            m.as_str()
                .split(',')
                .map(str::trim)
                .filter(|extra| !extra.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    requirement.marker = marker.filter(|marker| !marker.is_empty());

    let rest = caps.get(3).map_or("", |m| m.as_str()).trim();
    if let Some(url) = rest.strip_prefix('@') {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        requirement.url = Some(url.to_string());
        return Some(requirement);
    }

    let rest = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .unwrap_or(rest);
    requirement.specifiers = SpecifierSet::parse(rest)?;
    Some(requirement)
}

/// Parse an abstract dependency spec; option lines (`-r`, `--index-url`, ...) are skipped
pub fn parse_spec(content: &str, path: &Path) -> Result<Vec<Requirement>, ManifestError> {
    logical_lines(content)
        .into_iter()
        .filter(|(_, line)| !line.starts_with('-'))
        .map(|(line_number, line)| {
            parse_requirement(&line)
                .ok_or_else(|| ManifestError::parse_error(path, line_number, line.clone()))
        })
        .collect()
}

/// Parse the output of `pip list --format=freeze` into a snapshot
///
/// Every non-blank line must be `name==version`; anything else makes the
/// snapshot unusable, since a partial constraint set would be accepted
/// silently by the compiler.
pub fn parse_snapshot(listing: &str) -> Result<ConstraintSnapshot, SnapshotError> {
    let mut snapshot = ConstraintSnapshot::new();
    for (idx, line) in listing.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let caps = PINNED_LINE_RE
            .captures(line)
            .ok_or_else(|| SnapshotError::InvalidLine {
                line_number: idx + 1,
                line: line.to_string(),
            })?;
        snapshot.insert(PinnedPackage::new(&caps[1], &caps[2]));
    }

    if snapshot.is_empty() {
        return Err(SnapshotError::Empty);
    }
    Ok(snapshot)
}

/// Parse a compiled manifest, keeping its raw text
pub fn parse_frozen_manifest(content: &str, path: &Path) -> Result<FrozenManifest, ManifestError> {
    let mut entries = Vec::new();

    for (line_number, line) in logical_lines(content) {
        if line.starts_with('-') {
            continue;
        }
        // `name==1.0 --hash=sha256:...`
        let requirement_text = line.split(" --").next().unwrap_or(&line);
        let requirement = parse_requirement(requirement_text)
            .ok_or_else(|| ManifestError::parse_error(path, line_number, line.clone()))?;

        let pin = match (&requirement.url, requirement.specifiers.exact_pin()) {
            (Some(url), _) => Pin::DirectReference(url.clone()),
            (None, Some(version)) => Pin::Exact(version.to_string()),
            (None, None) => return Err(ManifestError::parse_error(path, line_number, line)),
        };

        entries.push(ManifestEntry {
            name: requirement.name,
            pin,
            marker: requirement.marker,
        });
    }

    Ok(FrozenManifest::new(content, entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Operator;

    const COMPILED: &str = "#
# This file is autogenerated by pip-compile with Python 3.11
# by the following command:
#
#    ./refreeze
#
--index-url https://pypi.org/simple

certifi==2024.2.2
    # via requests
charset-normalizer==3.3.2
    # via requests
jupyter-health @ https://example.invalid/jupyter_health-0.1.tar.gz
    # via -r requirements.in
pywin32==306 ; sys_platform == \"win32\"
    # via jupyter-core
requests==2.31.0 \\
    --hash=sha256:58cd2187c01e70e6e26505bca751777aa9f2ee0b7f4300988b709f44e013003f
    # via -r requirements.in
";

    #[test]
    fn test_parse_requirement_bare_name() {
        let req = parse_requirement("requests").unwrap();
        assert_eq!(req.name, "requests");
        assert!(req.specifiers.is_empty());
        assert!(req.extras.is_empty());
    }

    #[test]
    fn test_parse_requirement_full() {
        let req =
            parse_requirement("pandas[performance, excel] >=2.2,<3 ; python_version >= \"3.10\"")
                .unwrap();
        assert_eq!(req.name, "pandas");
        assert_eq!(req.extras, vec!["performance", "excel"]);
        assert_eq!(req.specifiers.clauses.len(), 2);
        assert_eq!(req.specifiers.clauses[0].operator, Operator::GreaterOrEqual);
        assert_eq!(req.marker.as_deref(), Some("python_version >= \"3.10\""));
    }

    #[test]
    fn test_parse_requirement_parenthesized() {
        let req = parse_requirement("yarl (>=1.9)").unwrap();
        assert_eq!(req.specifiers.to_string(), ">=1.9");
    }

    #[test]
    fn test_parse_requirement_direct_reference() {
        let req = parse_requirement("jupyter-health @ git+https://example.invalid/jh.git").unwrap();
        assert!(req.is_direct_reference());
        assert_eq!(req.url.as_deref(), Some("git+https://example.invalid/jh.git"));
    }

    #[test]
    fn test_parse_requirement_invalid() {
        assert!(parse_requirement("pandas >>2").is_none());
        assert!(parse_requirement("@ nothing").is_none());
        assert!(parse_requirement("name @").is_none());
    }

    #[test]
    fn test_parse_spec_skips_comments_and_options() {
        let content = "# notebook extras\n-c constraints.txt\n--index-url https://pypi.org/simple\n\nrequests  # http client\npandas>=2.2\nyarl\n";
        let reqs = parse_spec(content, Path::new("requirements.in")).unwrap();
        let names: Vec<&str> = reqs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["requests", "pandas", "yarl"]);
    }

    #[test]
    fn test_parse_spec_reports_line_number() {
        let content = "requests\n\npandas >>2\n";
        let err = parse_spec(content, Path::new("requirements.in")).unwrap_err();
        match err {
            ManifestError::Parse { line_number, .. } => assert_eq!(line_number, 3),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_snapshot() {
        let listing = "anyio==4.3.0\nJinja2==3.1.4\npandas==2.2.1\n\nrequests==2.31.0\n";
        let snapshot = parse_snapshot(listing).unwrap();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.version_of("jinja2"), Some("3.1.4"));
        assert_eq!(snapshot.version_of("pandas"), Some("2.2.1"));
    }

    #[test]
    fn test_parse_snapshot_local_and_post_versions() {
        let listing = "torch==2.2.1+cpu\ntzdata==2024.1.post1\n";
        let snapshot = parse_snapshot(listing).unwrap();
        assert_eq!(snapshot.version_of("torch"), Some("2.2.1+cpu"));
        assert_eq!(snapshot.version_of("tzdata"), Some("2024.1.post1"));
    }

    #[test]
    fn test_parse_snapshot_rejects_partial_listing() {
        let listing = "pandas==2.2.1\nWARNING: something odd\n";
        let err = parse_snapshot(listing).unwrap_err();
        match err {
            SnapshotError::InvalidLine { line_number, .. } => assert_eq!(line_number, 2),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_snapshot_empty() {
        assert!(matches!(parse_snapshot("\n\n"), Err(SnapshotError::Empty)));
    }

    #[test]
    fn test_parse_frozen_manifest() {
        let manifest = parse_frozen_manifest(COMPILED, Path::new("requirements.txt")).unwrap();
        assert_eq!(manifest.raw, COMPILED);
        assert_eq!(manifest.len(), 5);

        let requests = manifest.get("requests").unwrap();
        assert_eq!(requests.version(), Some("2.31.0"));

        let pywin32 = manifest.get("pywin32").unwrap();
        assert_eq!(pywin32.marker.as_deref(), Some("sys_platform == \"win32\""));

        let direct = manifest.get("jupyter-health").unwrap();
        assert!(matches!(direct.pin, Pin::DirectReference(_)));
        assert!(direct.version().is_none());
    }

    #[test]
    fn test_parse_frozen_manifest_rejects_unpinned() {
        let err = parse_frozen_manifest("requests>=2\n", Path::new("requirements.txt")).unwrap_err();
        assert!(matches!(err, ManifestError::Parse { line_number: 1, .. }));
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("requests  # http"), "requests  ");
        assert_eq!(strip_comment("    # via requests"), "");
        assert_eq!(strip_comment("pkg @ https://host/x.whl#sha256=abc"), "pkg @ https://host/x.whl#sha256=abc");
    }
}
