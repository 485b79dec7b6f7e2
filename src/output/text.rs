//! Text output formatter for human-readable display
//!
//! This module provides:
//! - Per-package change lines with colors, aligned by name
//! - A one-line summary of the run
//! - The planned engine commands in dry-run mode

use crate::domain::{ChangeKind, FreezeReport, ManifestChange};
use crate::error::AppError;
use crate::output::{OutputFormatter, Verbosity};
use colored::Colorize;
use std::io::Write;
use std::path::Path;

/// Text formatter for human-readable output
pub struct TextFormatter {
    /// Verbosity level
    verbosity: Verbosity,
    /// Whether to use colors
    color: bool,
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            color: true,
        }
    }

    /// Create a new text formatter with color option
    pub fn with_color(verbosity: Verbosity, color: bool) -> Self {
        Self { verbosity, color }
    }

    fn kind_label(&self, kind: ChangeKind) -> String {
        let label = format!("[{}]", kind.label());
        if !self.color {
            return label;
        }
        match kind {
            ChangeKind::Added => label.green().to_string(),
            ChangeKind::Removed => label.red().to_string(),
            ChangeKind::Upgraded => label.cyan().to_string(),
            ChangeKind::Downgraded => label.yellow().bold().to_string(),
            ChangeKind::Repinned => label.magenta().to_string(),
        }
    }

    /// Format a single change line
    fn format_change_line(
        &self,
        change: &ManifestChange,
        max_name_len: usize,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let from = change.from.as_deref().unwrap_or("-");
        let to = change.to.as_deref().unwrap_or("-");
        let label = self.kind_label(change.kind);

        if self.color {
            let name_display = format!("{:width$}", change.name, width = max_name_len);
            writeln!(
                writer,
                "  {} {} {} {} {}",
                name_display,
                from.dimmed(),
                "→".dimmed(),
                to.bright_white().bold(),
                label
            )
        } else {
            writeln!(
                writer,
                "  {:width$} {} -> {} {}",
                change.name,
                from,
                to,
                label,
                width = max_name_len
            )
        }
    }

    /// Summary line such as `42 pinned, 120 from base image; 2 upgraded, 1 added`
    fn summary_line(&self, report: &FreezeReport) -> String {
        let counts: Vec<String> = [
            ChangeKind::Upgraded,
            ChangeKind::Downgraded,
            ChangeKind::Added,
            ChangeKind::Removed,
            ChangeKind::Repinned,
        ]
        .into_iter()
        .filter_map(|kind| {
            let count = report.count(kind);
            (count > 0).then(|| format!("{} {}", count, kind.label()))
        })
        .collect();

        let changes = if counts.is_empty() {
            "no changes".to_string()
        } else {
            counts.join(", ")
        };
        format!(
            "{} pinned, {} from base image; {}",
            report.pinned_packages, report.snapshot_packages, changes
        )
    }

    fn format_plan(&self, report: &FreezeReport, writer: &mut dyn Write) -> std::io::Result<()> {
        let header = format!(
            "(dry-run) {} from {} ({})",
            report.manifest.display(),
            report.image,
            report.platform
        );
        if self.color {
            writeln!(writer, "{}", header.cyan())?;
        } else {
            writeln!(writer, "{}", header)?;
        }
        if self.verbosity == Verbosity::Quiet {
            return Ok(());
        }
        writeln!(writer, "Would run:")?;
        for command in &report.planned_commands {
            writeln!(writer, "  {}", command)?;
        }
        Ok(())
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, report: &FreezeReport, writer: &mut dyn Write) -> std::io::Result<()> {
        if report.dry_run {
            return self.format_plan(report, writer);
        }

        if self.verbosity == Verbosity::Quiet {
            if report.manifest_changed {
                writeln!(writer, "{}: {}", report.manifest.display(), self.summary_line(report))?;
            }
            return Ok(());
        }

        let status = if report.manifest_changed {
            "updated"
        } else {
            "up to date"
        };
        let header = format!("{} {}", report.manifest.display(), status);
        let source = format!("({} on {})", report.image, report.platform);
        if self.color {
            writeln!(writer, "{} {}", header.bold(), source.dimmed())?;
        } else {
            writeln!(writer, "{} {}", header, source)?;
        }

        self.format_changes(&report.manifest, &report.changes, writer)?;
        writeln!(writer, "{}", self.summary_line(report))?;
        Ok(())
    }

    fn format_changes(
        &self,
        _manifest: &Path,
        changes: &[ManifestChange],
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let max_name_len = changes
            .iter()
            .map(|change| change.name.len())
            .max()
            .unwrap_or(0)
            .max(20);
        for change in changes {
            self.format_change_line(change, max_name_len, writer)?;
        }
        Ok(())
    }

    fn format_error(&self, error: &AppError, writer: &mut dyn Write) -> std::io::Result<()> {
        if self.color {
            writeln!(writer, "{} {}", "Error:".red().bold(), error)
        } else {
            writeln!(writer, "Error: {}", error)
        }
    }
}
