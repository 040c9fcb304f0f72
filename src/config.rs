/*!
 * Configuration handling for ctxpack
 */

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::ensure;
use crate::error::{PackError, Result};
use crate::types::Section;

pub const DEFAULT_MAX_FILES: usize = 10_000;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1_048_576;
pub const DEFAULT_MAX_MEMORY: u64 = 100 * 1_048_576;
pub const DEFAULT_MAX_OUTPUT: usize = 1_048_576;

/// Project-level ignore file
pub const PRIMARY_IGNORE_FILE: &str = ".gitignore";
/// Tool-specific ignore file
pub const SECONDARY_IGNORE_FILE: &str = ".ctxpackignore";

/// Scanner configuration
#[derive(Clone, Debug)]
pub struct ScanConfig {
    /// Directory to scan
    pub root: PathBuf,
    /// Files must match at least one of these globs (or sit below a
    /// matching directory); empty selects every file
    pub include_patterns: Vec<String>,
    /// Files and directories matching any of these globs are excluded
    pub exclude_patterns: Vec<String>,
    pub max_files: usize,
    /// Per-file size ceiling in bytes
    pub max_file_size: u64,
    /// Ceiling on the cumulative size of accepted files
    pub max_memory: u64,
    /// Number of traversal workers; 1 means single-threaded
    pub workers: usize,
    pub respect_primary_ignore: bool,
    pub respect_secondary_ignore: bool,
    /// Replaces `<root>/.gitignore` as the primary ignore file
    pub primary_ignore_path: Option<PathBuf>,
    /// Apply the built-in VCS and dependency directory rules
    pub use_default_ignores: bool,
    pub include_hidden: bool,
    pub skip_binary: bool,
    /// Follow symlinks that resolve to regular files inside the root
    pub follow_symlinks: bool,
}

impl ScanConfig {
    /// Configuration with default limits for `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_patterns: vec!["*".to_string()],
            exclude_patterns: Vec::new(),
            max_files: DEFAULT_MAX_FILES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_memory: DEFAULT_MAX_MEMORY,
            workers: 1,
            respect_primary_ignore: true,
            respect_secondary_ignore: true,
            primary_ignore_path: None,
            use_default_ignores: true,
            include_hidden: false,
            skip_binary: true,
            follow_symlinks: false,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.root.exists() {
            return Err(PackError::RootNotFound(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(PackError::NotADirectory(self.root.clone()));
        }
        ensure!(self.max_files > 0, Config, "max files must be positive");
        ensure!(self.max_file_size > 0, Config, "max file size must be positive");
        ensure!(self.max_memory > 0, Config, "max memory must be positive");
        ensure!(
            self.workers >= 1,
            Config,
            "worker count must be at least 1, got {}",
            self.workers
        );
        Ok(())
    }

    /// Absolute, symlink-free root path
    pub fn canonical_root(&self) -> Result<PathBuf> {
        Ok(fs::canonicalize(&self.root)?)
    }

    /// Location of the primary ignore file for `root`
    pub fn primary_ignore_file(&self, root: &std::path::Path) -> PathBuf {
        self.primary_ignore_path
            .clone()
            .unwrap_or_else(|| root.join(PRIMARY_IGNORE_FILE))
    }
}

/// Assembler configuration
#[derive(Clone, Debug)]
pub struct ContextConfig {
    pub include_tree: bool,
    pub include_summary: bool,
    /// Hard ceiling on the artifact size in bytes
    pub max_output_bytes: usize,
    /// Priority in which sections claim the budget; also their output order
    pub section_order: Vec<Section>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            include_tree: true,
            include_summary: false,
            max_output_bytes: DEFAULT_MAX_OUTPUT,
            section_order: vec![Section::Tree, Section::Summary, Section::Contents],
        }
    }
}

impl ContextConfig {
    pub fn new(max_output_bytes: usize) -> Self {
        Self {
            max_output_bytes,
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_output_bytes > 0,
            Config,
            "max output bytes must be positive"
        );
        let unique: HashSet<_> = self.section_order.iter().collect();
        ensure!(
            unique.len() == 3 && self.section_order.len() == 3,
            Config,
            "section order must list tree, summary and contents exactly once"
        );
        Ok(())
    }
}

/// Statistics output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// Console tables
    Table,
    /// Machine-readable JSON
    Json,
    /// No report
    None,
}

/// Command-line arguments for ctxpack
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "ctxpack",
    version = env!("CARGO_PKG_VERSION"),
    about = "Pack a directory into a size-bounded context document for LLMs",
    long_about = "Scans a directory under ignore rules and resource limits, then writes a single XML document with a tree, optional per-file summaries and file contents that never exceeds the output budget."
)]
pub struct Args {
    /// Directory to scan
    #[clap(default_value = ".")]
    pub directory_path: String,

    /// Output file; stdout when omitted
    #[clap(short, long)]
    pub output: Option<String>,

    /// Comma-separated globs files must match
    #[clap(long, value_delimiter = ',', default_value = "*")]
    pub include: Vec<String>,

    /// Comma-separated globs to exclude
    #[clap(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Maximum number of files to accept
    #[clap(long, default_value_t = DEFAULT_MAX_FILES)]
    pub max_files: usize,

    /// Skip files larger than this many bytes
    #[clap(long, default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: u64,

    /// Stop scanning once accepted files total this many bytes
    #[clap(long, default_value_t = DEFAULT_MAX_MEMORY)]
    pub max_memory: u64,

    /// Maximum size of the generated document in bytes
    #[clap(long, default_value_t = DEFAULT_MAX_OUTPUT)]
    pub max_output: usize,

    /// Number of traversal workers
    #[clap(long, default_value = "1")]
    pub workers: usize,

    /// Do not read .gitignore
    #[clap(long)]
    pub no_gitignore: bool,

    /// Do not read .ctxpackignore
    #[clap(long)]
    pub no_ctxpackignore: bool,

    /// Path to a custom primary ignore file
    #[clap(long)]
    pub gitignore_path: Option<String>,

    /// Do not apply the built-in ignore rules
    #[clap(long)]
    pub no_default_ignores: bool,

    /// Include hidden files and directories
    #[clap(long)]
    pub hidden: bool,

    /// Keep binary files (listed without content)
    #[clap(long)]
    pub keep_binary: bool,

    /// Follow symlinks to files inside the root
    #[clap(long)]
    pub follow_symlinks: bool,

    /// Leave out the directory tree
    #[clap(long)]
    pub no_tree: bool,

    /// Add a per-file summary section
    #[clap(long)]
    pub summary: bool,

    /// Report format
    #[clap(long, value_enum, default_value = "table")]
    pub report: ReportKind,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Scanner configuration from command-line arguments
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            include_patterns: self.include.clone(),
            exclude_patterns: self.exclude.clone(),
            max_files: self.max_files,
            max_file_size: self.max_file_size,
            max_memory: self.max_memory,
            workers: self.workers,
            respect_primary_ignore: !self.no_gitignore,
            respect_secondary_ignore: !self.no_ctxpackignore,
            primary_ignore_path: self.gitignore_path.as_ref().map(PathBuf::from),
            use_default_ignores: !self.no_default_ignores,
            include_hidden: self.hidden,
            skip_binary: !self.keep_binary,
            follow_symlinks: self.follow_symlinks,
            ..ScanConfig::new(&self.directory_path)
        }
    }

    /// Assembler configuration from command-line arguments
    pub fn context_config(&self) -> ContextConfig {
        ContextConfig {
            include_tree: !self.no_tree,
            include_summary: self.summary,
            max_output_bytes: self.max_output,
            ..ContextConfig::default()
        }
    }
}
