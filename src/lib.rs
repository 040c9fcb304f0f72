/*!
 * ctxpack - Pack a directory into a size-bounded context document for LLMs
 *
 * The library scans a directory under ignore rules and resource ceilings,
 * then assembles the accepted files into one XML document (tree, optional
 * summaries, contents) that never exceeds a byte budget.
 */

pub mod assembler;
pub mod cancel;
pub mod config;
pub mod error;
pub mod matcher;
pub mod pipeline;
pub mod report;
pub mod scanner;
pub mod tree;
pub mod types;
pub mod utils;
pub mod writer;

#[cfg(test)]
mod tests;

// Re-export main components for easier access
pub use assembler::ContextAssembler;
pub use cancel::CancellationToken;
pub use config::{ContextConfig, ScanConfig};
pub use error::{PackError, Result};
pub use matcher::{detect_kind, IgnoreMatcher, Verdict};
pub use pipeline::{Pipeline, PipelineOutput};
pub use report::{ReportFormat, Reporter, ScanReport};
pub use scanner::Scanner;
pub use types::{
    ContextArtifact, ContextStats, ExclusionReason, FileDescriptor, FileKind, ScanResult,
    ScanStats, Section, SectionState, SkipReason, SkippedEntry, SoftError, SoftErrorKind,
};
pub use utils::format_file_size;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
