/*!
 * Reporting functionality for ctxpack
 *
 * Renders the statistics of a run as console tables (via tabled) or JSON.
 */

use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::error::Result;
use crate::pipeline::PipelineOutput;
use crate::types::{ContextStats, FileKind, ScanStats, SectionState, SkippedEntry, SoftError};
use crate::utils::format_file_size;

/// Information about an accepted file in the report
#[derive(Debug, Clone, Serialize)]
pub struct FileReportInfo {
    pub path: String,
    pub size: u64,
    pub kind: FileKind,
    /// Whether the file's content made it into the document
    pub included: bool,
}

/// Statistics of one run
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Where the document was written
    pub output: String,
    pub duration_ms: u128,
    pub scan: ScanStats,
    pub context: ContextStats,
    pub files: Vec<FileReportInfo>,
    pub skipped: Vec<SkippedEntry>,
    pub errors: Vec<SoftError>,
    pub truncated: bool,
    pub cancelled: bool,
}

impl ScanReport {
    pub fn from_output(output: &PipelineOutput, destination: impl Into<String>) -> Self {
        let omitted = &output.artifact.stats.files_omitted;
        let files = output
            .scan
            .files
            .iter()
            .map(|f| FileReportInfo {
                path: f.relative_path.clone(),
                size: f.size,
                kind: f.kind,
                included: !omitted.contains(&f.relative_path)
                    && !output
                        .artifact
                        .stats
                        .files_unreadable
                        .iter()
                        .any(|(p, _)| p == &f.relative_path),
            })
            .collect();

        Self {
            output: destination.into(),
            duration_ms: output.duration.as_millis(),
            scan: output.scan.stats.clone(),
            context: output.artifact.stats.clone(),
            files,
            skipped: output.scan.skipped.clone(),
            errors: output.scan.errors.clone(),
            truncated: output.scan.truncated,
            cancelled: output.cancelled(),
        }
    }
}

/// Format of the report output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Console table output
    ConsoleTable,
    /// Pretty-printed JSON
    Json,
}

/// Report generator for run statistics
pub struct Reporter {
    format: ReportFormat,
}

impl Reporter {
    /// Create a new reporter
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    /// Format a number with human-readable units
    fn format_number(&self, num: usize) -> String {
        if num >= 1_000_000 {
            format!("{:.1}M", num as f64 / 1_000_000.0)
        } else if num >= 1_000 {
            format!("{:.1}K", num as f64 / 1_000.0)
        } else {
            num.to_string()
        }
    }

    /// Generate a report string
    pub fn generate_report(&self, report: &ScanReport) -> Result<String> {
        match self.format {
            ReportFormat::ConsoleTable => Ok(self.generate_console_report(report)),
            ReportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        }
    }

    /// Print the report to stderr, keeping stdout free for the document
    pub fn print_report(&self, report: &ScanReport) -> Result<()> {
        eprintln!("\n{}", self.generate_report(report)?);
        Ok(())
    }

    fn section_state(state: SectionState) -> &'static str {
        match state {
            SectionState::Disabled => "off",
            SectionState::Complete => "complete",
            SectionState::Partial => "partial (budget)",
            SectionState::Omitted => "omitted (budget)",
        }
    }

    // Create a summary table using the tabled crate
    fn create_summary_table(&self, report: &ScanReport) -> String {
        #[derive(Tabled)]
        struct SummaryRow {
            #[tabled(rename = "Metric")]
            key: String,

            #[tabled(rename = "Value")]
            value: String,
        }

        let row = |key: &str, value: String| SummaryRow {
            key: key.to_string(),
            value,
        };
        let scan = &report.scan;
        let context = &report.context;

        let mut rows = vec![
            row("📂 Output", report.output.clone()),
            row("⏱️ Process Time", format!("{} ms", report.duration_ms)),
            row("🔍 Files Scanned", self.format_number(scan.files_scanned)),
            row("📄 Files Included", self.format_number(context.files_included)),
            row(
                "✂️ Omitted (budget)",
                self.format_number(context.files_omitted.len()),
            ),
            row("🚫 Skipped (rules)", self.format_number(scan.skipped_by_rule)),
            row("📏 Skipped (size)", self.format_number(scan.skipped_by_size)),
            row("🧱 Skipped (binary)", self.format_number(scan.skipped_binary)),
            row("🔢 Skipped (limit)", self.format_number(scan.skipped_by_limit)),
            row("🔗 Skipped (symlinks)", self.format_number(scan.skipped_symlinks)),
            row("💾 Bytes Scanned", format_file_size(scan.bytes_scanned)),
            row(
                "📦 Output Size",
                format_file_size(context.final_bytes as u64),
            ),
            row("🌳 Tree", Self::section_state(context.tree).to_string()),
            row("📋 Summary", Self::section_state(context.summary).to_string()),
            row("⚠️ Soft Errors", self.format_number(report.errors.len())),
        ];

        if report.truncated {
            rows.push(row("🛑 Scan", "stopped at memory limit".to_string()));
        }
        if report.cancelled {
            rows.push(row("🛑 Run", "cancelled".to_string()));
        }

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    // Create a files table using the tabled crate
    fn create_files_table(&self, report: &ScanReport) -> String {
        #[derive(Tabled)]
        struct FileRow {
            #[tabled(rename = "File Path")]
            path: String,

            #[tabled(rename = "Size")]
            size: String,

            #[tabled(rename = "Kind")]
            kind: String,

            #[tabled(rename = "In Output")]
            included: String,
        }

        // Largest files first
        let mut files: Vec<_> = report.files.iter().collect();
        files.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));

        let files_to_show = if files.len() > 15 {
            &files[0..10]
        } else {
            &files[..]
        };

        let rows: Vec<FileRow> = files_to_show
            .iter()
            .map(|info| FileRow {
                path: truncate_path(&info.path, 60),
                size: format_file_size(info.size),
                kind: info.kind.to_string(),
                included: if info.included { "yes" } else { "no" }.to_string(),
            })
            .collect();

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    // Generate a console table report
    fn generate_console_report(&self, report: &ScanReport) -> String {
        let summary_table = self.create_summary_table(report);
        let files_table = self.create_files_table(report);

        let summary_title = "✅  CONTEXT PACKED";
        let files_title = if report.files.len() > 15 {
            "📋  TOP 10 LARGEST FILES  📋"
        } else {
            "📋  ACCEPTED FILES"
        };

        let mut out = format!(
            "{}\n{}\n\n{}\n{}",
            files_title, files_table, summary_title, summary_table
        );
        if !report.errors.is_empty() {
            out.push_str("\n\n⚠️  SOFT ERRORS\n");
            for error in &report.errors {
                out.push_str(&format!("  {}\n", error));
            }
        }
        out
    }
}

/// Keep the last path segments that fit in `max_len`
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.len() <= max_len {
        return path.to_string();
    }

    let mut segments = Vec::new();
    let mut current_len = 3; // "..."
    for part in path.split('/').rev() {
        let part_len = part.len() + 1;
        if current_len + part_len > max_len {
            break;
        }
        segments.push(part);
        current_len += part_len;
    }

    if segments.is_empty() {
        let tail: String = path
            .chars()
            .rev()
            .take(max_len.saturating_sub(3))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        return format!("...{}", tail);
    }

    let mut result = String::from("...");
    for part in segments.iter().rev() {
        result.push('/');
        result.push_str(part);
    }
    result
}
