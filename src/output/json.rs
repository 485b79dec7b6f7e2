//! JSON output formatter for machine processing

use crate::domain::{ChangeKind, FreezeReport, ManifestChange};
use crate::error::AppError;
use crate::output::OutputFormatter;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// JSON formatter for machine-readable output
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self
    }
}

/// JSON representation of a run
#[derive(Serialize)]
struct JsonOutput<'a> {
    #[serde(flatten)]
    report: &'a FreezeReport,
    /// Change counts by kind
    summary: JsonSummary,
}

/// JSON representation of summary statistics
#[derive(Serialize)]
struct JsonSummary {
    added: usize,
    removed: usize,
    upgraded: usize,
    downgraded: usize,
    repinned: usize,
}

impl JsonSummary {
    fn from_report(report: &FreezeReport) -> Self {
        Self {
            added: report.count(ChangeKind::Added),
            removed: report.count(ChangeKind::Removed),
            upgraded: report.count(ChangeKind::Upgraded),
            downgraded: report.count(ChangeKind::Downgraded),
            repinned: report.count(ChangeKind::Repinned),
        }
    }
}

/// JSON representation of a change list on its own
#[derive(Serialize)]
struct JsonChanges<'a> {
    manifest: &'a Path,
    changes: &'a [ManifestChange],
}

/// JSON representation of a fatal error
#[derive(Serialize)]
struct JsonError {
    error: String,
    exit_code: u8,
}

fn write_json<T: Serialize>(value: &T, writer: &mut dyn Write) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    writeln!(writer, "{}", json)
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &FreezeReport, writer: &mut dyn Write) -> std::io::Result<()> {
        write_json(
            &JsonOutput {
                report,
                summary: JsonSummary::from_report(report),
            },
            writer,
        )
    }

    fn format_changes(
        &self,
        manifest: &Path,
        changes: &[ManifestChange],
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        write_json(&JsonChanges { manifest, changes }, writer)
    }

    fn format_error(&self, error: &AppError, writer: &mut dyn Write) -> std::io::Result<()> {
        write_json(
            &JsonError {
                error: error.to_string(),
                exit_code: error.exit_code(),
            },
            writer,
        )
    }
}
