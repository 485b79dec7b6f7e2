//! Diff output formatter for showing manifest changes
//!
//! Renders one `-`/`+` line pair per changed package rather than a textual
//! diff of the whole file, so `# via` annotation churn stays out of view.

use crate::domain::{FreezeReport, ManifestChange};
use crate::error::AppError;
use crate::output::{requirement_line, OutputFormatter};
use std::io::Write;
use std::path::Path;

/// Diff formatter for showing pin changes
#[derive(Debug, Default)]
pub struct DiffFormatter;

impl DiffFormatter {
    /// Create a new diff formatter
    pub fn new() -> Self {
        Self
    }
}

impl OutputFormatter for DiffFormatter {
    fn format(&self, report: &FreezeReport, writer: &mut dyn Write) -> std::io::Result<()> {
        if report.dry_run {
            writeln!(writer, "(dry-run) # no changes computed; planned commands:")?;
            for command in &report.planned_commands {
                writeln!(writer, "(dry-run) # {}", command)?;
            }
            return Ok(());
        }

        self.format_changes(&report.manifest, &report.changes, writer)?;
        writeln!(writer, "# {} package(s) changed", report.changes.len())?;
        Ok(())
    }

    fn format_changes(
        &self,
        manifest: &Path,
        changes: &[ManifestChange],
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        writeln!(writer, "--- a/{}", manifest.display())?;
        writeln!(writer, "+++ b/{}", manifest.display())?;
        for change in changes {
            writeln!(writer, "@@ {} @@", change.name)?;
            if let Some(from) = &change.from {
                writeln!(writer, "-{}", requirement_line(&change.name, from))?;
            }
            if let Some(to) = &change.to {
                writeln!(writer, "+{}", requirement_line(&change.name, to))?;
            }
        }
        writeln!(writer)?;
        Ok(())
    }

    fn format_error(&self, error: &AppError, writer: &mut dyn Write) -> std::io::Result<()> {
        writeln!(writer, "Error: {}", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChangeKind;

    fn render(report: &FreezeReport) -> String {
        let mut out = Vec::new();
        DiffFormatter::new().format(report, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_diff_output() {
        let mut report = FreezeReport::new("example/base:1.0", "linux/amd64", "requirements.txt".into());
        report.changes = vec![
            ManifestChange::new("pandas", Some("2.2.1".into()), Some("2.2.2".into()), ChangeKind::Upgraded),
            ManifestChange::new("six", Some("1.16.0".into()), None, ChangeKind::Removed),
        ];

        assert_eq!(
            render(&report),
            "--- a/requirements.txt\n\
             +++ b/requirements.txt\n\
             @@ pandas @@\n\
             -pandas==2.2.1\n\
             +pandas==2.2.2\n\
             @@ six @@\n\
             -six==1.16.0\n\
             \n\
             # 2 package(s) changed\n"
        );
    }

    #[test]
    fn test_diff_no_changes() {
        let report = FreezeReport::new("example/base:1.0", "linux/amd64", "requirements.txt".into());
        assert_eq!(render(&report), "# 0 package(s) changed\n");
    }

    #[test]
    fn test_diff_dry_run() {
        let mut report = FreezeReport::new("example/base:1.0", "linux/amd64", "requirements.txt".into());
        report.dry_run = true;
        report.planned_commands = vec!["docker run x".to_string()];
        assert_eq!(
            render(&report),
            "(dry-run) # no changes computed; planned commands:\n(dry-run) # docker run x\n"
        );
    }
}
