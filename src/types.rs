/*!
 * Core types and data structures for ctxpack
 */

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::Serialize;

/// Content classification of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Text file with readable content
    Text,
    /// Binary file (non-text)
    Binary,
    /// The file could not be sampled
    Unreadable,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Text => "text",
            FileKind::Binary => "binary",
            FileKind::Unreadable => "unreadable",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    /// `/`-separated path relative to the scan root
    pub relative_path: String,
    /// Absolute path on disk
    pub absolute_path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Detected kind
    pub kind: FileKind,
    /// Last modification time
    pub modified: SystemTime,
}

/// Which rule removed an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Matched an explicit exclude glob
    CliExclude,
    /// Matched a rule from a default or on-disk ignore list
    IgnoreFile,
    /// Did not match any include glob
    NotIncluded,
    /// Hidden name and hidden files are not wanted
    Hidden,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExclusionReason::CliExclude => "excluded by pattern",
            ExclusionReason::IgnoreFile => "excluded by ignore file",
            ExclusionReason::NotIncluded => "not matched by include patterns",
            ExclusionReason::Hidden => "hidden",
        })
    }
}

/// Why an entry did not make it into the scan result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Excluded by the matcher; directories are pruned whole
    Rule { rule: ExclusionReason },
    /// Larger than the per-file ceiling
    TooLarge { size: u64, limit: u64 },
    /// Binary content while binaries are skipped
    Binary,
    /// File count ceiling already reached
    LimitReached,
    /// Accepting the file would exceed the memory ceiling
    MemoryLimit,
    /// Symbolic link that was not followed
    Symlink { detail: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Rule { rule } => write!(f, "{}", rule),
            SkipReason::TooLarge { size, limit } => {
                write!(f, "too large ({} > {} bytes)", size, limit)
            }
            SkipReason::Binary => f.write_str("binary"),
            SkipReason::LimitReached => f.write_str("skipped: limit reached"),
            SkipReason::MemoryLimit => f.write_str("memory limit exceeded"),
            SkipReason::Symlink { detail } => write!(f, "symlink: {}", detail),
        }
    }
}

/// A skipped entry with its reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub path: String,
    pub is_dir: bool,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Category of a per-item failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftErrorKind {
    PermissionDenied,
    NotFound,
    IgnoreFile,
    Symlink,
    Unreadable,
    Other,
}

/// A per-item failure recorded without aborting the operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftError {
    pub path: String,
    pub kind: SoftErrorKind,
    pub message: String,
}

impl SoftError {
    pub fn new(path: impl Into<String>, kind: SoftErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }

    /// Build a soft error from an I/O error, picking the kind from the error kind
    pub fn from_io(path: impl Into<String>, err: &io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::PermissionDenied => SoftErrorKind::PermissionDenied,
            io::ErrorKind::NotFound => SoftErrorKind::NotFound,
            _ => SoftErrorKind::Other,
        };
        Self::new(path, kind, err.to_string())
    }
}

impl fmt::Display for SoftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Aggregate scan counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// File entries examined (entries under pruned directories are never seen)
    pub files_scanned: usize,
    /// Directories listed
    pub directories_visited: usize,
    /// Files or whole directories excluded by a rule
    pub skipped_by_rule: usize,
    pub skipped_by_size: usize,
    pub skipped_binary: usize,
    pub skipped_by_limit: usize,
    pub skipped_symlinks: usize,
    /// Sum of the sizes of accepted files
    pub bytes_scanned: u64,
}

/// Output of a scan: accepted descriptors in deterministic order plus bookkeeping
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    /// Canonical scan root
    pub root: PathBuf,
    pub files: Vec<FileDescriptor>,
    pub stats: ScanStats,
    pub skipped: Vec<SkippedEntry>,
    pub errors: Vec<SoftError>,
    /// The memory ceiling stopped the scan early
    pub truncated: bool,
    pub cancelled: bool,
}

impl ScanResult {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            files: Vec::new(),
            stats: ScanStats::default(),
            skipped: Vec::new(),
            errors: Vec::new(),
            truncated: false,
            cancelled: false,
        }
    }

    /// Display name of the root directory
    pub fn root_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.root.to_string_lossy().to_string())
    }

    /// Relative paths of the accepted files, in scan order
    pub fn paths(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.relative_path.as_str()).collect()
    }
}

/// Output sections of the assembled artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Tree,
    Summary,
    Contents,
}

/// How much of a section made it into the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionState {
    /// Turned off in the configuration
    Disabled,
    Complete,
    /// Only a prefix of the rows fit the budget
    Partial,
    /// Not a single row fit the budget
    Omitted,
}

/// Assembly statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextStats {
    /// Files with a content block in the artifact
    pub files_included: usize,
    /// Files dropped because the budget ran out, in scan order
    pub files_omitted: Vec<String>,
    /// Files replaced by an unreadable marker, with the reason
    pub files_unreadable: Vec<(String, String)>,
    pub tree: SectionState,
    pub summary: SectionState,
    /// Some output had to be dropped to respect the budget
    pub budget_exceeded: bool,
    pub cancelled: bool,
    pub final_bytes: usize,
}

/// The assembled document and its statistics
#[derive(Debug, Clone, Serialize)]
pub struct ContextArtifact {
    pub content: String,
    pub stats: ContextStats,
}
