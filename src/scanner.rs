/*!
 * Directory and file scanning functionality
 *
 * Traversal produces one listing per directory. Listings are consumed in
 * depth-first order (subdirectories before files, names sorted byte-wise)
 * by a single admission routine that applies the resource ceilings, so the
 * result is the same whether directories were listed by one thread or
 * by a pool of workers.
 */

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use indicatif::ProgressBar;
use log::{debug, info, warn};
use rayon::{Scope, ThreadPoolBuilder};
use walkdir::{DirEntry, WalkDir};

use crate::cancel::CancellationToken;
use crate::config::{ScanConfig, PRIMARY_IGNORE_FILE, SECONDARY_IGNORE_FILE};
use crate::error::Result;
use crate::matcher::{sample_kind, IgnoreMatcher, Verdict};
use crate::types::{
    ExclusionReason, FileDescriptor, FileKind, ScanResult, SkipReason, SkippedEntry, SoftError,
    SoftErrorKind,
};
use crate::utils::{compare_relative_paths, format_file_size, join_relative};

/// A directory waiting to be listed
#[derive(Debug, Clone, PartialEq, Eq)]
struct DirTask {
    /// `/`-separated path relative to the scan root; empty for the root
    rel: String,
    abs: PathBuf,
}

/// Directory listings buffered by absolute path until replay
type Listings = HashMap<PathBuf, Vec<Listed>>;

/// A file that survived the rules and awaits admission
#[derive(Debug)]
struct Candidate {
    rel: String,
    abs: PathBuf,
    size: u64,
    modified: SystemTime,
    /// Classification done ahead of admission by a pool worker
    kind: Option<std::result::Result<FileKind, String>>,
}

/// One entry of a directory listing, in traversal order
#[derive(Debug)]
enum Listed {
    Dir(DirTask),
    File(Candidate),
    Excluded {
        rel: String,
        is_dir: bool,
        rule: ExclusionReason,
    },
    Symlink {
        rel: String,
        detail: &'static str,
    },
    Error(SoftError),
}

/// Read-only state shared by every worker of one scan
struct ScanContext<'a> {
    root: &'a Path,
    matcher: &'a IgnoreMatcher,
    /// Ignore files consumed as rule sources at the root
    control_files: Vec<&'static str>,
    /// Whether workers classify candidates while listing
    classify_early: bool,
}

/// Applies the resource ceilings to candidates in scan order
struct Admission<'a> {
    config: &'a ScanConfig,
    progress: &'a ProgressBar,
    result: ScanResult,
}

impl<'a> Admission<'a> {
    fn new(config: &'a ScanConfig, progress: &'a ProgressBar, root: PathBuf) -> Self {
        Self {
            config,
            progress,
            result: ScanResult::new(root),
        }
    }

    fn skip(&mut self, path: String, is_dir: bool, reason: SkipReason) {
        debug!("Skipping {}: {}", path, reason);
        self.result.skipped.push(SkippedEntry {
            path,
            is_dir,
            reason,
        });
    }

    fn admit(&mut self, entry: Listed) -> ControlFlow<()> {
        match entry {
            Listed::Dir(_) => {}
            Listed::Excluded { rel, is_dir, rule } => {
                if !is_dir {
                    self.result.stats.files_scanned += 1;
                }
                self.result.stats.skipped_by_rule += 1;
                self.skip(rel, is_dir, SkipReason::Rule { rule });
            }
            Listed::Symlink { rel, detail } => {
                self.result.stats.files_scanned += 1;
                self.result.stats.skipped_symlinks += 1;
                self.skip(
                    rel,
                    false,
                    SkipReason::Symlink {
                        detail: detail.to_string(),
                    },
                );
            }
            Listed::Error(error) => {
                warn!("{}", error);
                self.result.errors.push(error);
            }
            Listed::File(candidate) => return self.admit_file(candidate),
        }
        ControlFlow::Continue(())
    }

    fn admit_file(&mut self, candidate: Candidate) -> ControlFlow<()> {
        self.result.stats.files_scanned += 1;

        if self.result.files.len() >= self.config.max_files {
            self.result.stats.skipped_by_limit += 1;
            self.skip(candidate.rel, false, SkipReason::LimitReached);
            return ControlFlow::Continue(());
        }

        if candidate.size > self.config.max_file_size {
            self.result.stats.skipped_by_size += 1;
            self.skip(
                candidate.rel,
                false,
                SkipReason::TooLarge {
                    size: candidate.size,
                    limit: self.config.max_file_size,
                },
            );
            return ControlFlow::Continue(());
        }

        let kind = match candidate.kind {
            Some(kind) => kind,
            None => sample_kind(&candidate.abs).map_err(|e| e.to_string()),
        };
        let kind = match kind {
            Ok(kind) => kind,
            Err(message) => {
                let error = SoftError::new(candidate.rel, SoftErrorKind::Unreadable, message);
                warn!("{}", error);
                self.result.errors.push(error);
                return ControlFlow::Continue(());
            }
        };

        if kind == FileKind::Binary && self.config.skip_binary {
            self.result.stats.skipped_binary += 1;
            self.skip(candidate.rel, false, SkipReason::Binary);
            return ControlFlow::Continue(());
        }

        if self.result.stats.bytes_scanned + candidate.size > self.config.max_memory {
            info!(
                "Memory ceiling of {} reached at {}; stopping scan",
                format_file_size(self.config.max_memory),
                candidate.rel
            );
            self.result.truncated = true;
            self.skip(candidate.rel, false, SkipReason::MemoryLimit);
            return ControlFlow::Break(());
        }

        self.result.stats.bytes_scanned += candidate.size;
        self.progress.inc(1);
        self.result.files.push(FileDescriptor {
            relative_path: candidate.rel,
            absolute_path: candidate.abs,
            size: candidate.size,
            kind,
            modified: candidate.modified,
        });
        ControlFlow::Continue(())
    }

    fn finish(mut self) -> ScanResult {
        self.result
            .files
            .sort_by(|a, b| compare_relative_paths(&a.relative_path, &b.relative_path));
        self.result
    }
}

/// Subdirectories first, then files; names byte-wise
fn listing_order(a: &DirEntry, b: &DirEntry) -> Ordering {
    b.file_type()
        .is_dir()
        .cmp(&a.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

/// Scanner for directory contents
pub struct Scanner {
    /// Scanner configuration
    config: ScanConfig,
    /// Progress bar, advanced once per accepted file
    pub progress: Arc<ProgressBar>,
    cancel: CancellationToken,
}

impl Scanner {
    /// Create a new scanner
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            progress: Arc::new(ProgressBar::hidden()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<ProgressBar>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan the configured root.
    ///
    /// Fails only on configuration problems, before anything is traversed.
    /// Every other problem ends up on the returned [`ScanResult`].
    pub fn scan(&self) -> Result<ScanResult> {
        self.config.validate()?;
        let root = self.config.canonical_root()?;
        let (matcher, warnings) = IgnoreMatcher::build(&self.config, &root)?;

        let ctx = ScanContext {
            root: &root,
            matcher: &matcher,
            control_files: self.control_files(&root),
            classify_early: self.config.workers > 1,
        };

        let mut admission = Admission::new(&self.config, &self.progress, root.clone());
        admission.result.errors.extend(warnings);

        let root_task = DirTask {
            rel: String::new(),
            abs: root.clone(),
        };
        if self.config.workers > 1 {
            let mut listings = self.list_parallel(&ctx, root_task)?;
            let _ = self.replay(&root, &mut listings, &mut admission);
        } else {
            let _ = self.walk_sequential(&ctx, &root_task, &mut admission);
        }

        let mut result = admission.finish();
        if self.cancel.is_cancelled() {
            result.cancelled = true;
        }

        info!(
            "Scanned {}: {} files accepted ({}), {} skipped, {} soft errors{}{}",
            root.display(),
            result.files.len(),
            format_file_size(result.stats.bytes_scanned),
            result.skipped.len(),
            result.errors.len(),
            if result.truncated { ", truncated" } else { "" },
            if result.cancelled { ", cancelled" } else { "" },
        );
        Ok(result)
    }

    /// Names of the root-level ignore files that feed the matcher
    fn control_files(&self, root: &Path) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.config.respect_primary_ignore
            && self.config.primary_ignore_file(root) == root.join(PRIMARY_IGNORE_FILE)
        {
            names.push(PRIMARY_IGNORE_FILE);
        }
        if self.config.respect_secondary_ignore {
            names.push(SECONDARY_IGNORE_FILE);
        }
        names
    }

    /// Depth-first traversal on the calling thread
    fn walk_sequential(
        &self,
        ctx: &ScanContext<'_>,
        task: &DirTask,
        admission: &mut Admission<'_>,
    ) -> ControlFlow<()> {
        if self.cancel.is_cancelled() {
            admission.result.cancelled = true;
            return ControlFlow::Break(());
        }

        let listing = self.list_directory(ctx, task);
        admission.result.stats.directories_visited += 1;

        for entry in listing {
            if self.cancel.is_cancelled() {
                admission.result.cancelled = true;
                return ControlFlow::Break(());
            }
            match entry {
                Listed::Dir(child) => self.walk_sequential(ctx, &child, admission)?,
                other => admission.admit(other)?,
            }
        }
        ControlFlow::Continue(())
    }

    /// List every directory on a pool of `workers` threads
    fn list_parallel(&self, ctx: &ScanContext<'_>, root_task: DirTask) -> Result<Listings> {
        let workers = self.config.workers;
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ctxpack-scan-{}", i))
            .build()?;

        let listings = Mutex::new(Listings::new());
        pool.scope(|s| self.spawn_listing(s, ctx, root_task, &listings));

        debug!("Listed directories with {} workers", workers);
        Ok(listings.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    /// Queue one directory on the pool; its subdirectories queue themselves
    fn spawn_listing<'s>(
        &'s self,
        scope: &Scope<'s>,
        ctx: &'s ScanContext<'s>,
        task: DirTask,
        listings: &'s Mutex<Listings>,
    ) {
        scope.spawn(move |s| {
            if self.cancel.is_cancelled() {
                return;
            }

            let listing = self.list_directory(ctx, &task);
            for entry in &listing {
                if let Listed::Dir(child) = entry {
                    self.spawn_listing(s, ctx, child.clone(), listings);
                }
            }

            listings
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(task.abs, listing);
        });
    }

    /// Feed buffered listings to admission in depth-first order
    fn replay(
        &self,
        dir: &Path,
        listings: &mut Listings,
        admission: &mut Admission<'_>,
    ) -> ControlFlow<()> {
        // Missing only when the scan was cancelled before this directory was listed
        let Some(listing) = listings.remove(dir) else {
            admission.result.cancelled = true;
            return ControlFlow::Break(());
        };
        admission.result.stats.directories_visited += 1;

        for entry in listing {
            if self.cancel.is_cancelled() {
                admission.result.cancelled = true;
                return ControlFlow::Break(());
            }
            match entry {
                Listed::Dir(child) => self.replay(&child.abs, listings, admission)?,
                other => admission.admit(other)?,
            }
        }
        ControlFlow::Continue(())
    }

    /// List one directory and evaluate the rules for each entry
    fn list_directory(&self, ctx: &ScanContext<'_>, task: &DirTask) -> Vec<Listed> {
        let mut listing = Vec::new();
        let walker = WalkDir::new(&task.abs)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by(listing_order);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| self.relative_display(ctx.root, p))
                        .unwrap_or_else(|| task.rel.clone());
                    let error = match e.io_error() {
                        Some(io) => SoftError::from_io(path, io),
                        None => SoftError::new(path, SoftErrorKind::Other, e.to_string()),
                    };
                    listing.push(Listed::Error(error));
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy().to_string();
            let rel = join_relative(&task.rel, &name);
            let file_type = entry.file_type();
            let is_dir = file_type.is_dir();

            if let Verdict::Excluded(rule) = ctx.matcher.evaluate(&rel, is_dir) {
                if task.rel.is_empty() && ctx.control_files.iter().any(|f| *f == name) {
                    debug!("Not reporting ignore file {}", rel);
                    continue;
                }
                listing.push(Listed::Excluded { rel, is_dir, rule });
                continue;
            }

            if is_dir {
                listing.push(Listed::Dir(DirTask {
                    rel,
                    abs: entry.path().to_path_buf(),
                }));
            } else if file_type.is_symlink() {
                listing.push(self.resolve_symlink(ctx, rel, entry.path()));
            } else if file_type.is_file() {
                listing.push(match entry.metadata() {
                    Ok(metadata) => Listed::File(self.candidate(
                        ctx,
                        rel,
                        entry.path().to_path_buf(),
                        &metadata,
                    )),
                    Err(e) => {
                        let error = match e.io_error() {
                            Some(io) => SoftError::from_io(rel, io),
                            None => SoftError::new(rel, SoftErrorKind::Other, e.to_string()),
                        };
                        Listed::Error(error)
                    }
                });
            } else {
                debug!("Ignoring special file {}", rel);
            }
        }

        listing
    }

    fn candidate(
        &self,
        ctx: &ScanContext<'_>,
        rel: String,
        abs: PathBuf,
        metadata: &fs::Metadata,
    ) -> Candidate {
        let size = metadata.len();
        let kind = if ctx.classify_early && size <= self.config.max_file_size {
            Some(sample_kind(&abs).map_err(|e| e.to_string()))
        } else {
            None
        };
        Candidate {
            rel,
            abs,
            size,
            modified: metadata.modified().unwrap_or(UNIX_EPOCH),
            kind,
        }
    }

    /// Decide what to do with a symlink that passed the rules
    fn resolve_symlink(&self, ctx: &ScanContext<'_>, rel: String, path: &Path) -> Listed {
        if !self.config.follow_symlinks {
            return Listed::Symlink {
                rel,
                detail: "not followed",
            };
        }

        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                return Listed::Error(SoftError::new(
                    rel,
                    SoftErrorKind::Symlink,
                    format!("broken symlink: {}", e),
                ))
            }
        };
        let target = match fs::canonicalize(path) {
            Ok(target) => target,
            Err(e) => {
                return Listed::Error(SoftError::new(
                    rel,
                    SoftErrorKind::Symlink,
                    format!("unresolvable symlink: {}", e),
                ))
            }
        };

        if !target.starts_with(ctx.root) {
            Listed::Symlink {
                rel,
                detail: "target outside root",
            }
        } else if metadata.is_dir() {
            Listed::Symlink {
                rel,
                detail: "directory links are not traversed",
            }
        } else if metadata.is_file() {
            Listed::File(self.candidate(ctx, rel, path.to_path_buf(), &metadata))
        } else {
            Listed::Symlink {
                rel,
                detail: "target is not a regular file",
            }
        }
    }

    fn relative_display(&self, root: &Path, path: &Path) -> String {
        match path.strip_prefix(root) {
            Ok(rel) => crate::utils::to_posix(rel),
            Err(_) => path.display().to_string(),
        }
    }
}
