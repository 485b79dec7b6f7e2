//! Output formatting for freeze reports
//!
//! This module provides:
//! - Text output for human-readable display
//! - JSON output for machine processing
//! - Diff output for showing manifest changes

mod diff;
mod json;
mod text;

pub use diff::DiffFormatter;
pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::domain::{FreezeReport, ManifestChange};
use crate::error::AppError;
use std::io::Write;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output for machine processing
    Json,
    /// Unified diff format
    Diff,
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Minimal output
    Quiet,
    /// Normal output
    #[default]
    Normal,
    /// Detailed output with additional information
    Verbose,
}

/// Configuration for output formatting
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Output format (text, json, diff)
    pub format: OutputFormat,
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Whether to use colors (when supported)
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            verbosity: Verbosity::default(),
            color: true,
        }
    }
}

impl OutputConfig {
    /// Create a new output configuration
    pub fn new(format: OutputFormat, verbosity: Verbosity) -> Self {
        Self {
            format,
            verbosity,
            color: true,
        }
    }

    /// Create configuration from CLI arguments
    pub fn from_cli(json: bool, diff: bool, verbose: bool, quiet: bool) -> Self {
        let format = if json {
            OutputFormat::Json
        } else if diff {
            OutputFormat::Diff
        } else {
            OutputFormat::Text
        };

        let verbosity = if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };

        Self::new(format, verbosity)
    }

    /// Whether stage spinners may draw on stderr
    pub fn shows_progress(&self) -> bool {
        self.format != OutputFormat::Json && self.verbosity != Verbosity::Quiet
    }
}

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format and write a run report
    fn format(&self, report: &FreezeReport, writer: &mut dyn Write) -> std::io::Result<()>;

    /// Format and write the per-package changes only
    fn format_changes(
        &self,
        manifest: &std::path::Path,
        changes: &[ManifestChange],
        writer: &mut dyn Write,
    ) -> std::io::Result<()>;

    /// Format and write a fatal error
    fn format_error(&self, error: &AppError, writer: &mut dyn Write) -> std::io::Result<()>;
}

/// Create an output formatter based on configuration
pub fn create_formatter(config: &OutputConfig) -> Box<dyn OutputFormatter> {
    match config.format {
        OutputFormat::Text => Box::new(TextFormatter::with_color(config.verbosity, config.color)),
        OutputFormat::Json => Box::new(JsonFormatter::new()),
        OutputFormat::Diff => Box::new(DiffFormatter::new()),
    }
}

/// Render a pin as a requirement line: `name==version` or `name @ url`
pub(crate) fn requirement_line(name: &str, pin: &str) -> String {
    if pin.starts_with('@') {
        format!("{} {}", name, pin)
    } else {
        format!("{}=={}", name, pin)
    }
}
