//! Build descriptor (Dockerfile) base image extraction
//!
//! Handles:
//! - Case-insensitive keywords, comments and blank lines
//! - Line continuations, including a custom `# escape=` parser directive
//! - `FROM [--platform=...] image [AS stage]`
//! - `ARG` defaults declared before the first `FROM` (`$VAR`, `${VAR}`,
//!   `${VAR:-default}`, `${VAR:+alternate}`)
//!
//! Only the first `FROM` is read. Later stages of a multi-stage build are
//! not inspected.

use crate::domain::ImageReference;
use crate::error::DescriptorError;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

static ESCAPE_DIRECTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^#\s*escape\s*=\s*([\\`])\s*$").unwrap());
static PARSER_DIRECTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s*[a-zA-Z]+\s*=").unwrap());
static VARIABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::?([-+])([^}]*))?\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .unwrap()
});

/// One logical directive of a build descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Uppercased keyword (`FROM`, `RUN`, ...)
    pub keyword: String,
    /// Everything after the keyword, continuations joined
    pub arguments: String,
    /// 1-based line number the directive starts on
    pub line: usize,
}

/// Split a descriptor into logical directives
pub fn parse_directives(content: &str) -> Vec<Directive> {
    let mut escape = '\\';
    let mut directives = Vec::new();
    let mut pending: Option<(usize, String)> = None;
    let mut in_header = true;

    for (idx, raw_line) in content.lines().enumerate() {
        let line_number = idx + 1;
        let trimmed = raw_line.trim();

        // Parser directives are only honored before anything else
        if in_header {
            if let Some(caps) = ESCAPE_DIRECTIVE_RE.captures(trimmed) {
                escape = caps[1].chars().next().unwrap_or('\\');
                continue;
            }
            if !PARSER_DIRECTIVE_RE.is_match(trimmed) {
                in_header = false;
            }
        }

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (text, continues) = match trimmed.strip_suffix(escape) {
            Some(rest) => (rest.trim_end(), true),
            None => (trimmed, false),
        };

        let (start, mut buffer) = pending.take().unwrap_or((line_number, String::new()));
        if !buffer.is_empty() && !text.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(text);

        if continues {
            pending = Some((start, buffer));
        } else {
            directives.extend(split_directive(&buffer, start));
        }
    }

    if let Some((start, buffer)) = pending {
        directives.extend(split_directive(&buffer, start));
    }

    directives
}

fn split_directive(text: &str, line: usize) -> Option<Directive> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let (keyword, arguments) = text
        .split_once(char::is_whitespace)
        .unwrap_or((text, ""));
    Some(Directive {
        keyword: keyword.to_ascii_uppercase(),
        arguments: arguments.trim().to_string(),
        line,
    })
}

/// Extract the base image from descriptor content
///
/// `path` is only used for error messages.
pub fn extract_base_image(content: &str, path: &Path) -> Result<ImageReference, DescriptorError> {
    let mut args: HashMap<String, Option<String>> = HashMap::new();

    for directive in parse_directives(content) {
        match directive.keyword.as_str() {
            "ARG" => record_args(&directive.arguments, &mut args),
            "FROM" => return resolve_from(&directive.arguments, &args, path),
            // Any build step before FROM means the descriptor has no usable base
            _ => return Err(DescriptorError::missing_base_image(path)),
        }
    }

    Err(DescriptorError::missing_base_image(path))
}

/// Read a descriptor file and extract its base image
pub fn extract_base_image_from_file(path: &Path) -> Result<ImageReference, DescriptorError> {
    let content = std::fs::read_to_string(path).map_err(|source| DescriptorError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    extract_base_image(&content, path)
}

fn record_args(arguments: &str, args: &mut HashMap<String, Option<String>>) {
    for declaration in arguments.split_whitespace() {
        match declaration.split_once('=') {
            Some((name, value)) => {
                let value = value.trim_matches('"').trim_matches('\'');
                args.insert(name.to_string(), Some(value.to_string()));
            }
            None => {
                args.entry(declaration.to_string()).or_insert(None);
            }
        }
    }
}

fn resolve_from(
    arguments: &str,
    args: &HashMap<String, Option<String>>,
    path: &Path,
) -> Result<ImageReference, DescriptorError> {
    let Some(raw) = arguments
        .split_whitespace()
        .find(|token| !token.starts_with("--"))
    else {
        return Err(DescriptorError::InvalidImageReference {
            path: path.to_path_buf(),
            reference: arguments.to_string(),
        });
    };

    let mut unresolved: Option<String> = None;
    let substituted = VARIABLE_RE.replace_all(raw, |caps: &Captures<'_>| {
        let name = caps.get(1).or_else(|| caps.get(4)).map_or("", |m| m.as_str());
        let value = args
            .get(name)
            .and_then(|value| value.as_deref())
            .filter(|value| !value.is_empty());

        match (caps.get(2).map(|m| m.as_str()), value) {
            (Some("-"), Some(value)) => value.to_string(),
            (Some("-"), None) => caps.get(3).map_or("", |m| m.as_str()).to_string(),
            (Some(_), Some(_)) => caps.get(3).map_or("", |m| m.as_str()).to_string(),
            (Some(_), None) => String::new(),
            (None, Some(value)) => value.to_string(),
            (None, None) => {
                unresolved.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    if let Some(variable) = unresolved {
        return Err(DescriptorError::UnresolvedImageVariable {
            path: path.to_path_buf(),
            reference: raw.to_string(),
            variable,
        });
    }

    ImageReference::new(substituted.into_owned()).ok_or_else(|| {
        DescriptorError::InvalidImageReference {
            path: path.to_path_buf(),
            reference: raw.to_string(),
        }
    })
}
