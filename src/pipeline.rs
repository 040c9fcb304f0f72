/*!
 * Scan-then-assemble driver
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;

use crate::assembler::ContextAssembler;
use crate::cancel::CancellationToken;
use crate::config::{ContextConfig, ScanConfig};
use crate::error::Result;
use crate::scanner::Scanner;
use crate::types::{ContextArtifact, ScanResult};

/// Everything one run produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub scan: ScanResult,
    pub artifact: ContextArtifact,
    /// Wall time of scan plus assembly
    pub duration: Duration,
}

impl PipelineOutput {
    /// Whether either stage stopped early on cancellation
    pub fn cancelled(&self) -> bool {
        self.scan.cancelled || self.artifact.stats.cancelled
    }
}

/// Sequences scanner and assembler for one root
pub struct Pipeline {
    scan_config: ScanConfig,
    context_config: ContextConfig,
    cancel: CancellationToken,
    progress: Arc<ProgressBar>,
}

impl Pipeline {
    pub fn new(scan_config: ScanConfig, context_config: ContextConfig) -> Self {
        Self {
            scan_config,
            context_config,
            cancel: CancellationToken::new(),
            progress: Arc::new(ProgressBar::hidden()),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Arc<ProgressBar>) -> Self {
        self.progress = progress;
        self
    }

    /// Run both stages. Both configurations are validated before any I/O.
    pub fn run(&self) -> Result<PipelineOutput> {
        self.scan_config.validate()?;
        self.context_config.validate()?;

        let start = Instant::now();
        let scan = Scanner::new(self.scan_config.clone())
            .with_cancellation(self.cancel.clone())
            .with_progress(Arc::clone(&self.progress))
            .scan()?;

        let artifact = ContextAssembler::new(self.context_config.clone())
            .with_cancellation(self.cancel.clone())
            .assemble(&scan)?;

        Ok(PipelineOutput {
            scan,
            artifact,
            duration: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_context_config_checked_before_scan() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a\n").unwrap();

        let pipeline = Pipeline::new(ScanConfig::new(dir.path()), ContextConfig::new(0));
        assert!(pipeline.run().unwrap_err().is_config());
    }

    #[test]
    fn test_run_produces_both_results() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "alpha\n").unwrap();

        let output = Pipeline::new(ScanConfig::new(dir.path()), ContextConfig::new(4096))
            .run()
            .unwrap();
        assert_eq!(output.scan.paths(), vec!["a.txt"]);
        assert_eq!(output.artifact.stats.files_included, 1);
        assert!(output.artifact.content.contains("alpha"));
        assert!(!output.cancelled());
    }
}
