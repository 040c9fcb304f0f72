/*!
 * Budgeted assembly of the context document
 *
 * Sections claim the byte budget in the configured priority order. Tree and
 * summary sections keep as many leading rows as fit. File blocks are taken
 * greedily in scan order and the first block that does not fit ends the
 * content section: it and every later file are omitted whole, so a file is
 * never cut in the middle and an earlier file is never dropped in favour of
 * a later one.
 */

use std::fs;

use log::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::config::ContextConfig;
use crate::error::{PackError, Result};
use crate::tree::render_tree;
use crate::types::{
    ContextArtifact, ContextStats, FileDescriptor, FileKind, ScanResult, Section, SectionState,
};
use crate::writer::{FileBody, XmlWriter};

/// Output buffer that never grows past its budget
struct Budgeted {
    buffer: String,
    /// Bytes written plus bytes reserved for closing tags
    committed: usize,
    budget: usize,
    /// Rows and blocks appended, excluding framing
    units: usize,
}

impl Budgeted {
    fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.committed)
    }

    fn fits(&self, len: usize) -> bool {
        len <= self.remaining()
    }

    fn push_unit(&mut self, unit: &str) {
        self.buffer.push_str(unit);
        self.committed += unit.len();
        self.units += 1;
    }

    /// Write an opening tag and reserve room for its closing tag
    fn open(&mut self, open: &str, close: &str) {
        self.buffer.push_str(open);
        self.committed += open.len() + close.len();
    }

    /// Write a closing tag whose room was reserved by [`Budgeted::open`]
    fn close(&mut self, close: &str) {
        self.buffer.push_str(close);
    }
}

/// Assembles a [`ScanResult`] into a [`ContextArtifact`]
pub struct ContextAssembler {
    config: ContextConfig,
    writer: XmlWriter,
    cancel: CancellationToken,
}

impl ContextAssembler {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            writer: XmlWriter::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Assemble the document for `scan` within the configured budget.
    ///
    /// Fails only when the configuration is invalid or the budget cannot
    /// hold the document frame plus the first row of an enabled tree or
    /// summary section.
    pub fn assemble(&self, scan: &ScanResult) -> Result<ContextArtifact> {
        self.config.validate()?;
        let budget = self.config.max_output_bytes;

        let (open, close) = self.writer.envelope(&scan.root_name())?;
        let envelope = open.len() + close.len();
        if envelope > budget {
            return Err(PackError::BudgetTooSmall {
                budget,
                required: envelope,
            });
        }

        let mut out = Budgeted {
            buffer: String::with_capacity(budget.min(1 << 20)),
            committed: 0,
            budget,
            units: 0,
        };
        out.open(&open, &close);

        let mut stats = ContextStats {
            files_included: 0,
            files_omitted: Vec::new(),
            files_unreadable: Vec::new(),
            tree: SectionState::Disabled,
            summary: SectionState::Disabled,
            budget_exceeded: false,
            cancelled: false,
            final_bytes: 0,
        };
        let mut bodies: Vec<Option<FileBody>> = vec![None; scan.files.len()];
        // Smallest budget that would have let a tree or summary row through
        let mut required: Option<usize> = None;
        let mut budget_cut = false;

        for section in &self.config.section_order {
            match section {
                Section::Tree if self.config.include_tree => {
                    let lines = render_tree(&scan.root_name(), scan.paths());
                    let rows = lines
                        .iter()
                        .map(|line| self.writer.tree_line(line))
                        .collect::<Result<Vec<_>>>()?;
                    stats.tree = self.append_rows(&mut out, "tree", &rows, &mut required)?;
                    budget_cut |= stats.tree != SectionState::Complete;
                }
                Section::Summary if self.config.include_summary => {
                    let mut rows = Vec::with_capacity(scan.files.len());
                    for (index, file) in scan.files.iter().enumerate() {
                        if self.cancel.is_cancelled() {
                            stats.cancelled = true;
                            break;
                        }
                        let body = self.body(&mut bodies, index, file);
                        rows.push(self.writer.summary_row(file, body)?);
                    }
                    let state = self.append_rows(&mut out, "summary", &rows, &mut required)?;
                    budget_cut |= state != SectionState::Complete;
                    stats.summary = if rows.len() == scan.files.len() {
                        state
                    } else if rows.is_empty() {
                        SectionState::Omitted
                    } else if state == SectionState::Complete {
                        SectionState::Partial
                    } else {
                        state
                    };
                }
                Section::Contents => {
                    self.append_contents(&mut out, scan, &mut bodies, &mut stats)?;
                }
                _ => {}
            }
        }

        stats.budget_exceeded = budget_cut || !stats.files_omitted.is_empty();

        if out.units == 0 {
            if let Some(required) = required {
                return Err(PackError::BudgetTooSmall { budget, required });
            }
        }

        out.close(&close);
        for (index, body) in bodies.iter().enumerate() {
            if let Some(FileBody::Unreadable(reason)) = body {
                stats
                    .files_unreadable
                    .push((scan.files[index].relative_path.clone(), reason.clone()));
            }
        }
        stats.final_bytes = out.buffer.len();
        debug_assert!(stats.final_bytes <= budget);

        info!(
            "Assembled {} of {} files into {} bytes (budget {}){}",
            stats.files_included,
            scan.files.len(),
            stats.final_bytes,
            budget,
            if stats.budget_exceeded {
                ", budget exceeded"
            } else {
                ""
            }
        );

        Ok(ContextArtifact {
            content: out.buffer,
            stats,
        })
    }

    /// Load a file body once; later calls reuse it
    fn body<'b>(
        &self,
        bodies: &'b mut [Option<FileBody>],
        index: usize,
        file: &FileDescriptor,
    ) -> &'b FileBody {
        bodies[index].get_or_insert_with(|| load_body(file))
    }

    /// Append a row-oriented section, keeping the longest prefix that fits
    fn append_rows(
        &self,
        out: &mut Budgeted,
        name: &str,
        rows: &[String],
        required: &mut Option<usize>,
    ) -> Result<SectionState> {
        let Some(first) = rows.first() else {
            return Ok(SectionState::Complete);
        };
        let (open, close) = self.writer.section(name)?;

        let needed = open.len() + close.len() + first.len();
        if !out.fits(needed) {
            let minimum = out.committed + needed;
            *required = Some(required.map_or(minimum, |r: usize| r.min(minimum)));
            debug!("No room for the {} section ({} bytes needed)", name, needed);
            return Ok(SectionState::Omitted);
        }

        out.open(&open, &close);
        let mut state = SectionState::Complete;
        for row in rows {
            if !out.fits(row.len()) {
                state = SectionState::Partial;
                break;
            }
            out.push_unit(row);
        }
        out.close(&close);

        if state == SectionState::Partial {
            warn!("The {} section was cut to fit the output budget", name);
        }
        Ok(state)
    }

    /// Append file blocks in scan order until the first one that does not fit
    fn append_contents(
        &self,
        out: &mut Budgeted,
        scan: &ScanResult,
        bodies: &mut [Option<FileBody>],
        stats: &mut ContextStats,
    ) -> Result<()> {
        let (open, close) = self.writer.section("files")?;
        let mut opened = false;

        for (index, file) in scan.files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }

            let body = self.body(bodies, index, file);
            let block = self.writer.file_block(file, body)?;
            let framing = if opened { 0 } else { open.len() + close.len() };

            if !out.fits(block.len() + framing) {
                stats.files_omitted = scan.files[index..]
                    .iter()
                    .map(|f| f.relative_path.clone())
                    .collect();
                warn!(
                    "Output budget reached at {}; omitting {} files",
                    file.relative_path,
                    stats.files_omitted.len()
                );
                break;
            }

            if !opened {
                out.open(&open, &close);
                opened = true;
            }
            if !matches!(body, FileBody::Unreadable(_)) {
                stats.files_included += 1;
            }
            out.push_unit(&block);
        }

        if opened {
            out.close(&close);
        }
        Ok(())
    }
}

/// Read a file's content for the document
fn load_body(file: &FileDescriptor) -> FileBody {
    if file.kind == FileKind::Binary {
        return FileBody::Binary;
    }
    match fs::read(&file.absolute_path) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(content) => FileBody::Text(content),
            Err(_) => {
                warn!("{} is not valid UTF-8; omitting", file.relative_path);
                FileBody::Unreadable("invalid UTF-8".to_string())
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}", file.relative_path, e);
            FileBody::Unreadable(e.to_string())
        }
    }
}
