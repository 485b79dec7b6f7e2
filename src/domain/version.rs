//! PEP 440 versions and version specifiers
//!
//! Provides:
//! - `Pep440Version` with the total ordering pip uses
//! - `Specifier` / `SpecifierSet` for `==`, `!=`, `>=`, `<=`, `>`, `<`, `~=`, `===`

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^\s*v?
        (?:(?P<epoch>\d+)!)?
        (?P<release>\d+(?:\.\d+)*)
        (?:[-_.]?(?P<pre_l>alpha|beta|preview|pre|rc|a|b|c)[-_.]?(?P<pre_n>\d+)?)?
        (?:-(?P<post_n1>\d+)|[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>\d+)?)?
        (?:(?P<dev_l>[-_.]?dev)[-_.]?(?P<dev_n>\d+)?)?
        (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?
        \s*$",
    )
    .unwrap()
});

static SPECIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(===|~=|==|!=|>=|<=|>|<)\s*([^\s,;]+)\s*$").unwrap());

/// Pre-release phase, ordered alpha < beta < release candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrePhase {
    Alpha,
    Beta,
    ReleaseCandidate,
}

impl PrePhase {
    fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "a" | "alpha" => PrePhase::Alpha,
            "b" | "beta" => PrePhase::Beta,
            _ => PrePhase::ReleaseCandidate,
        }
    }

    fn label(self) -> &'static str {
        match self {
            PrePhase::Alpha => "a",
            PrePhase::Beta => "b",
            PrePhase::ReleaseCandidate => "rc",
        }
    }
}

/// A parsed PEP 440 version
#[derive(Debug, Clone)]
pub struct Pep440Version {
    pub epoch: u64,
    pub release: Vec<u64>,
    pub pre: Option<(PrePhase, u64)>,
    pub post: Option<u64>,
    pub dev: Option<u64>,
    pub local: Option<String>,
}

impl Pep440Version {
    /// Parse a version string, accepting the normalizations pip accepts
    pub fn parse(input: &str) -> Option<Self> {
        let caps = VERSION_RE.captures(input)?;
        let number = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u64>().ok());

        let release = caps
            .name("release")?
            .as_str()
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;

        let pre = caps
            .name("pre_l")
            .map(|label| (PrePhase::from_label(label.as_str()), number("pre_n").unwrap_or(0)));

        let post = if caps.name("post_n1").is_some() {
            number("post_n1")
        } else if caps.name("post_l").is_some() {
            Some(number("post_n2").unwrap_or(0))
        } else {
            None
        };

        let dev = caps
            .name("dev_l")
            .map(|_| number("dev_n").unwrap_or(0));

        Some(Self {
            epoch: number("epoch").unwrap_or(0),
            release,
            pre,
            post,
            dev,
            local: caps
                .name("local")
                .map(|m| m.as_str().to_ascii_lowercase().replace(['-', '_'], ".")),
        })
    }

    /// Release segments with trailing zeros removed
    fn trimmed_release(&self) -> &[u64] {
        let end = self
            .release
            .iter()
            .rposition(|&part| part != 0)
            .map_or(0, |idx| idx + 1);
        &self.release[..end]
    }

    /// Returns true for alpha/beta/rc and dev releases
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    /// The same version without its local label
    pub fn public(&self) -> Self {
        Self {
            local: None,
            ..self.clone()
        }
    }

    /// Whether `self` starts with `prefix`'s release segments (zero padded)
    fn release_starts_with(&self, prefix: &[u64]) -> bool {
        (0..prefix.len()).all(|idx| self.release.get(idx).copied().unwrap_or(0) == prefix[idx])
    }
}

/// Comparison slots that implement the PEP 440 ordering rules
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    NegInf,
    Value(u64, u64),
    PosInf,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum LocalPart {
    Text(String),
    Number(u64),
}

impl Pep440Version {
    fn pre_slot(&self) -> Slot {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => Slot::NegInf,
            (None, _, _) => Slot::PosInf,
            (Some((phase, n)), _, _) => Slot::Value(phase as u64, n),
        }
    }

    fn post_slot(&self) -> Slot {
        self.post.map_or(Slot::NegInf, |n| Slot::Value(0, n))
    }

    fn dev_slot(&self) -> Slot {
        self.dev.map_or(Slot::PosInf, |n| Slot::Value(0, n))
    }

    fn local_parts(&self) -> Option<Vec<LocalPart>> {
        self.local.as_ref().map(|local| {
            local
                .split('.')
                .map(|part| match part.parse::<u64>() {
                    Ok(n) => LocalPart::Number(n),
                    Err(_) => LocalPart::Text(part.to_string()),
                })
                .collect()
        })
    }
}

impl Ord for Pep440Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.trimmed_release().cmp(other.trimmed_release()))
            .then_with(|| self.pre_slot().cmp(&other.pre_slot()))
            .then_with(|| self.post_slot().cmp(&other.post_slot()))
            .then_with(|| self.dev_slot().cmp(&other.dev_slot()))
            .then_with(|| self.local_parts().cmp(&other.local_parts()))
    }
}

impl PartialEq for Pep440Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pep440Version {}

impl PartialOrd for Pep440Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Pep440Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release: Vec<String> = self.release.iter().map(u64::to_string).collect();
        write!(f, "{}", release.join("."))?;
        if let Some((phase, n)) = self.pre {
            write!(f, "{}{}", phase.label(), n)?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{}", n)?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{}", n)?;
        }
        if let Some(local) = &self.local {
            write!(f, "+{}", local)?;
        }
        Ok(())
    }
}

/// Compare two version strings, falling back to a plain string comparison
/// when either side is not a valid PEP 440 version
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (Pep440Version::parse(a), Pep440Version::parse(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        _ => a.cmp(b),
    }
}

/// Specifier operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterOrEqual,
    LessOrEqual,
    Greater,
    Less,
    Compatible,
    Arbitrary,
}

impl Operator {
    fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "==" => Operator::Equal,
            "!=" => Operator::NotEqual,
            ">=" => Operator::GreaterOrEqual,
            "<=" => Operator::LessOrEqual,
            ">" => Operator::Greater,
            "<" => Operator::Less,
            "~=" => Operator::Compatible,
            "===" => Operator::Arbitrary,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::GreaterOrEqual => ">=",
            Operator::LessOrEqual => "<=",
            Operator::Greater => ">",
            Operator::Less => "<",
            Operator::Compatible => "~=",
            Operator::Arbitrary => "===",
        }
    }
}

/// A single version clause such as `>=2.0` or `==1.4.*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specifier {
    pub operator: Operator,
    /// Version text as written, including any `.*` suffix
    pub version: String,
}

impl Specifier {
    pub fn parse(input: &str) -> Option<Self> {
        let caps = SPECIFIER_RE.captures(input)?;
        let operator = Operator::from_symbol(caps.get(1)?.as_str())?;
        let version = caps.get(2)?.as_str().to_string();

        if operator != Operator::Arbitrary {
            let base = version.strip_suffix(".*").unwrap_or(&version);
            Pep440Version::parse(base)?;
        }
        Some(Self { operator, version })
    }

    /// Whether `candidate` satisfies this clause
    pub fn matches(&self, candidate: &Pep440Version) -> bool {
        if self.operator == Operator::Arbitrary {
            return candidate.to_string() == self.version;
        }

        if let Some(prefix) = self.version.strip_suffix(".*") {
            let Some(prefix) = Pep440Version::parse(prefix) else {
                return false;
            };
            let hit = candidate.epoch == prefix.epoch && candidate.release_starts_with(&prefix.release);
            return match self.operator {
                Operator::Equal => hit,
                Operator::NotEqual => !hit,
                _ => false,
            };
        }

        let Some(target) = Pep440Version::parse(&self.version) else {
            return false;
        };
        // A local label on the candidate is ignored unless the clause names one
        let candidate = if target.local.is_none() {
            candidate.public()
        } else {
            candidate.clone()
        };

        match self.operator {
            Operator::Equal => candidate == target,
            Operator::NotEqual => candidate != target,
            Operator::GreaterOrEqual => candidate >= target,
            Operator::LessOrEqual => candidate <= target,
            Operator::Greater => candidate > target,
            Operator::Less => candidate < target,
            Operator::Compatible => {
                if target.release.len() < 2 {
                    return false;
                }
                let prefix = &target.release[..target.release.len() - 1];
                candidate >= target
                    && candidate.epoch == target.epoch
                    && candidate.release_starts_with(prefix)
            }
            Operator::Arbitrary => unreachable!(),
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator.symbol(), self.version)
    }
}

/// Comma separated specifier clauses, all of which must match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecifierSet {
    pub clauses: Vec<Specifier>,
}

impl SpecifierSet {
    /// Parse `>=1.0, <2`; returns None if any clause is malformed
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Some(Self::default());
        }
        let clauses = trimmed
            .split(',')
            .map(Specifier::parse)
            .collect::<Option<Vec<_>>>()?;
        Some(Self { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The pinned version when the set is a single `==` clause without wildcard
    pub fn exact_pin(&self) -> Option<&str> {
        match self.clauses.as_slice() {
            [clause] if clause.operator == Operator::Equal && !clause.version.ends_with(".*") => {
                Some(&clause.version)
            }
            _ => None,
        }
    }

    pub fn matches(&self, candidate: &Pep440Version) -> bool {
        self.clauses.iter().all(|clause| clause.matches(candidate))
    }

    /// Merge another set's clauses into this one
    pub fn extend(&mut self, other: &SpecifierSet) {
        for clause in &other.clauses {
            if !self.clauses.contains(clause) {
                self.clauses.push(clause.clone());
            }
        }
    }
}

impl fmt::Display for SpecifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clauses: Vec<String> = self.clauses.iter().map(Specifier::to_string).collect();
        write!(f, "{}", clauses.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Pep440Version {
        Pep440Version::parse(s).unwrap()
    }

    fn spec(s: &str) -> SpecifierSet {
        SpecifierSet::parse(s).unwrap()
    }

    #[test]
    fn test_parse_simple_release() {
        let version = v("2.31.0");
        assert_eq!(version.release, vec![2, 31, 0]);
        assert_eq!(version.epoch, 0);
        assert!(version.pre.is_none());
        assert!(!version.is_prerelease());
    }

    #[test]
    fn test_parse_full_version() {
        let version = v("1!2.0rc1.post2.dev3+ubuntu-1");
        assert_eq!(version.epoch, 1);
        assert_eq!(version.pre, Some((PrePhase::ReleaseCandidate, 1)));
        assert_eq!(version.post, Some(2));
        assert_eq!(version.dev, Some(3));
        assert_eq!(version.local.as_deref(), Some("ubuntu.1"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Pep440Version::parse("").is_none());
        assert!(Pep440Version::parse("latest").is_none());
        assert!(Pep440Version::parse("1.0 beta two").is_none());
    }

    #[test]
    fn test_ordering_release_segments() {
        assert!(v("2.2.1") > v("2.2.0"));
        assert!(v("2.10") > v("2.9"));
        assert_eq!(v("1.0").cmp(&v("1.0.0")), Ordering::Equal);
    }

    #[test]
    fn test_ordering_pre_post_dev() {
        let mut versions = vec![
            v("1.0.post1"),
            v("1.0"),
            v("1.0rc1"),
            v("1.0.dev0"),
            v("1.0a1"),
            v("1.0b2"),
            v("1.0+local"),
        ];
        versions.sort();
        let rendered: Vec<String> = versions.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["1.0.dev0", "1.0a1", "1.0b2", "1.0rc1", "1.0", "1.0+local", "1.0.post1"]
        );
    }

    #[test]
    fn test_ordering_epoch_wins() {
        assert!(v("1!0.1") > v("2024.1"));
    }

    #[test]
    fn test_compare_versions_fallback() {
        assert_eq!(compare_versions("1.2", "1.10"), Ordering::Less);
        assert_eq!(compare_versions("abc", "abd"), Ordering::Less);
    }

    #[test]
    fn test_specifier_basic_operators() {
        assert!(spec(">=2.2.1").matches(&v("2.2.1")));
        assert!(!spec(">=2.2.1").matches(&v("2.2.0")));
        assert!(spec("<3").matches(&v("2.9")));
        assert!(spec("!=1.5").matches(&v("1.6")));
        assert!(!spec("!=1.5").matches(&v("1.5.0")));
        assert!(spec(">1.0,<2.0").matches(&v("1.5")));
        assert!(!spec(">1.0,<2.0").matches(&v("2.0")));
    }

    #[test]
    fn test_specifier_wildcard() {
        assert!(spec("==2.2.*").matches(&v("2.2.1")));
        assert!(!spec("==2.2.*").matches(&v("2.3.0")));
        assert!(spec("!=2.2.*").matches(&v("2.3.0")));
    }

    #[test]
    fn test_specifier_compatible_release() {
        assert!(spec("~=2.2").matches(&v("2.9")));
        assert!(!spec("~=2.2").matches(&v("3.0")));
        assert!(spec("~=2.2.1").matches(&v("2.2.5")));
        assert!(!spec("~=2.2.1").matches(&v("2.3.0")));
    }

    #[test]
    fn test_specifier_local_ignored() {
        assert!(spec("==2.1.0").matches(&v("2.1.0+cpu")));
        assert!(!spec("==2.1.0+cu121").matches(&v("2.1.0+cpu")));
    }

    #[test]
    fn test_specifier_set_exact_pin() {
        assert_eq!(spec("==2.31.0").exact_pin(), Some("2.31.0"));
        assert_eq!(spec("==2.*").exact_pin(), None);
        assert_eq!(spec(">=1").exact_pin(), None);
    }

    #[test]
    fn test_specifier_set_invalid() {
        assert!(SpecifierSet::parse(">>1.0").is_none());
        assert!(SpecifierSet::parse(">=1.0,").is_none());
    }

    #[test]
    fn test_specifier_set_display() {
        assert_eq!(spec(">= 1.0 , < 2").to_string(), ">=1.0,<2");
    }
}
