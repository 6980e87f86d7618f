//! Parallel batch execution of the rewrite engine over many files.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::codemod::{Diagnostic, transform_source};
use crate::{ModernizeError, Result};

/// Options for one batch run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Worker threads; 0 lets rayon decide.
    pub jobs: usize,
    /// Compute results without writing any file.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Changed,
    Unchanged,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, FileStatus::Failed { .. })
    }
}

/// Outcome of a whole run, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    pub dry_run: bool,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.files.len()
    }

    /// Files that were processed without a hard failure.
    pub fn successes(&self) -> usize {
        self.files.iter().filter(|file| !file.is_failure()).count()
    }

    pub fn failures(&self) -> usize {
        self.total() - self.successes()
    }

    pub fn changed(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|file| file.status == FileStatus::Changed)
    }

    pub fn diagnostics(&self) -> usize {
        self.files.iter().map(|file| file.diagnostics.len()).sum()
    }
}

/// Transform one file, writing it back when it changed and this is not a dry run.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn process_file(path: &Path, dry_run: bool) -> FileReport {
    match transform_file(path, dry_run) {
        Ok((changed, diagnostics)) => {
            debug!(changed, diagnostics = diagnostics.len(), "file processed");
            FileReport {
                path: path.to_path_buf(),
                status: if changed {
                    FileStatus::Changed
                } else {
                    FileStatus::Unchanged
                },
                diagnostics,
            }
        }
        Err(e) => {
            warn!("Failed to process {}: {}", path.display(), e);
            FileReport {
                path: path.to_path_buf(),
                status: FileStatus::Failed {
                    reason: e.to_string(),
                },
                diagnostics: Vec::new(),
            }
        }
    }
}

fn transform_file(path: &Path, dry_run: bool) -> Result<(bool, Vec<Diagnostic>)> {
    let source = fs::read_to_string(path)?;
    let outcome = transform_source(&source)?;
    if outcome.changed && !dry_run {
        fs::write(path, outcome.source())?;
    }
    Ok((outcome.changed, outcome.diagnostics))
}

/// Process `paths` on a dedicated thread pool. A failing file never stops
/// the batch; it shows up as a failed entry in the report.
#[instrument(skip(paths), fields(files = paths.len()))]
pub fn run_batch(paths: &[PathBuf], options: RunOptions) -> Result<BatchReport> {
    let started = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs)
        .thread_name(|index| format!("modernize-worker-{}", index))
        .build()
        .map_err(|e| ModernizeError::Internal(format!("Failed to build worker pool: {}", e)))?;

    let files: Vec<FileReport> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| process_file(path, options.dry_run))
            .collect()
    });

    let report = BatchReport {
        files,
        dry_run: options.dry_run,
    };
    info!(
        total = report.total(),
        changed = report.changed().count(),
        failed = report.failures(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "batch complete"
    );
    Ok(report)
}
