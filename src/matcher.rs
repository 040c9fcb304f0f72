/*!
 * Ignore-rule matching and content classification
 *
 * All rule sources are compiled once per scan into an immutable
 * [`IgnoreMatcher`] that is shared read-only by every traversal worker.
 */

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use log::{debug, warn};

use crate::config::ScanConfig;
use crate::error::{PackError, Result};
use crate::types::{ExclusionReason, FileKind, SoftError, SoftErrorKind};
use crate::utils::{is_hidden_name, DEFAULT_IGNORE};

/// Number of leading bytes inspected by [`detect_kind`]
pub const BINARY_SAMPLE_SIZE: usize = 8192;

/// Fraction of control bytes above which a sample counts as binary
const BINARY_RATIO_THRESHOLD: f32 = 0.1;

/// Outcome of evaluating one path against every rule source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Included,
    Excluded(ExclusionReason),
}

impl Verdict {
    pub fn is_excluded(&self) -> bool {
        matches!(self, Verdict::Excluded(_))
    }
}

/// Compiled include/exclude/ignore-file rules for one scan root
#[derive(Debug)]
pub struct IgnoreMatcher {
    excludes: Gitignore,
    ignore_rules: Gitignore,
    /// `None` selects every file
    includes: Option<Gitignore>,
    include_hidden: bool,
}

impl IgnoreMatcher {
    /// Compile the rules for `config`, reading ignore files under `root`.
    ///
    /// Invalid CLI globs fail the build. Problems with ignore files are
    /// returned as soft errors next to the matcher.
    pub fn build(config: &ScanConfig, root: &Path) -> Result<(Self, Vec<SoftError>)> {
        let excludes = compile_globs(root, &config.exclude_patterns)?;
        let includes = if config.include_patterns.is_empty() {
            None
        } else {
            Some(compile_globs(root, &config.include_patterns)?)
        };

        let mut warnings = Vec::new();
        let mut builder = GitignoreBuilder::new(root);

        if config.use_default_ignores {
            for line in DEFAULT_IGNORE.iter() {
                if let Err(e) = builder.add_line(None, line) {
                    warnings.push(SoftError::new(
                        *line,
                        SoftErrorKind::IgnoreFile,
                        e.to_string(),
                    ));
                }
            }
        }

        let mut sources: Vec<PathBuf> = Vec::new();
        if config.respect_primary_ignore {
            sources.push(config.primary_ignore_file(root));
        }
        if config.respect_secondary_ignore {
            sources.push(root.join(crate::config::SECONDARY_IGNORE_FILE));
        }
        for source in sources {
            add_ignore_file(&mut builder, &source, &mut warnings);
        }

        let ignore_rules = builder.build().map_err(|e| PackError::InvalidPattern {
            pattern: "<ignore rules>".to_string(),
            source: e,
        })?;

        for warning in &warnings {
            warn!("{}", warning);
        }

        Ok((
            Self {
                excludes,
                ignore_rules,
                includes,
                include_hidden: config.include_hidden,
            },
            warnings,
        ))
    }

    /// Evaluate a `/`-separated path relative to the scan root
    pub fn evaluate(&self, relative_path: &str, is_dir: bool) -> Verdict {
        if self.excludes.matched(relative_path, is_dir).is_ignore() {
            return Verdict::Excluded(ExclusionReason::CliExclude);
        }

        // Last matching rule wins; a whitelist match (`!pattern`) falls through.
        if self.ignore_rules.matched(relative_path, is_dir).is_ignore() {
            return Verdict::Excluded(ExclusionReason::IgnoreFile);
        }

        // Include globs select files; they never prune directories. A glob
        // naming a directory selects everything below it.
        if let Some(includes) = self.includes.as_ref().filter(|_| !is_dir) {
            if !includes
                .matched_path_or_any_parents(relative_path, false)
                .is_ignore()
            {
                return Verdict::Excluded(ExclusionReason::NotIncluded);
            }
        }

        if !self.include_hidden {
            let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
            if is_hidden_name(name) {
                return Verdict::Excluded(ExclusionReason::Hidden);
            }
        }

        Verdict::Included
    }

    /// Whether the path is excluded by any rule
    pub fn is_excluded(&self, relative_path: &str, is_dir: bool) -> bool {
        self.evaluate(relative_path, is_dir).is_excluded()
    }
}

/// Compile CLI globs, rejecting malformed ones
fn compile_globs(root: &Path, patterns: &[String]) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        builder
            .add_line(None, pattern)
            .map_err(|e| PackError::InvalidPattern {
                pattern: pattern.clone(),
                source: e,
            })?;
    }
    builder.build().map_err(|e| PackError::InvalidPattern {
        pattern: patterns.join(","),
        source: e,
    })
}

/// Append the rules of one ignore file; a missing file is not an error
fn add_ignore_file(builder: &mut GitignoreBuilder, path: &Path, warnings: &mut Vec<SoftError>) {
    let display = path.display().to_string();
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No ignore file at {}", display);
            return;
        }
        Err(e) => {
            warnings.push(SoftError::new(
                display,
                SoftErrorKind::IgnoreFile,
                format!("unreadable ignore file: {}", e),
            ));
            return;
        }
    };

    let mut rules = 0;
    for (number, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match builder.add_line(Some(path.to_path_buf()), line) {
            Ok(_) => rules += 1,
            Err(e) => warnings.push(SoftError::new(
                display.clone(),
                SoftErrorKind::IgnoreFile,
                format!("line {}: {}", number + 1, e),
            )),
        }
    }
    debug!("Loaded {} rules from {}", rules, display);
}

/// Classify a byte sample as text or binary
pub fn classify_bytes(sample: &[u8]) -> FileKind {
    if sample.is_empty() {
        return FileKind::Text;
    }
    if sample.contains(&0) {
        return FileKind::Binary;
    }

    // Control characters other than tab, newline, vertical tab, form feed, CR
    let binary_count = sample
        .iter()
        .filter(|&&b| b < 9 || (b > 13 && b < 32))
        .count();
    let binary_ratio = binary_count as f32 / sample.len() as f32;

    if binary_ratio > BINARY_RATIO_THRESHOLD {
        FileKind::Binary
    } else {
        FileKind::Text
    }
}

/// Read the leading sample of a file and classify it
pub fn sample_kind(path: &Path) -> io::Result<FileKind> {
    let mut file = File::open(path)?;
    let mut buffer = vec![0; BINARY_SAMPLE_SIZE];
    let mut filled = 0;
    while filled < buffer.len() {
        let read = file.read(&mut buffer[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    buffer.truncate(filled);
    Ok(classify_bytes(&buffer))
}

/// Classify a file on disk; I/O failures yield [`FileKind::Unreadable`]
pub fn detect_kind(path: &Path) -> FileKind {
    sample_kind(path).unwrap_or(FileKind::Unreadable)
}
