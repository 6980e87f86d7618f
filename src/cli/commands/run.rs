use anyhow::Result;
use clap::ArgMatches;
use std::time::Instant;

use modernize_attrs::{FileStatus, RunOptions, run_batch};

use super::print_diagnostics;
use crate::cli::Session;
use crate::cli::utils::{format_duration, pluralize};

/// Rewrite files in place. Returns whether every file was processed.
pub fn handle_run(matches: &ArgMatches) -> Result<bool> {
    let session = Session::start(matches, matches.get_flag("dry-run"))?;
    let runtime = &session.config.runtime;
    let started = Instant::now();

    let report = run_batch(
        &session.files,
        RunOptions {
            jobs: runtime.jobs,
            dry_run: runtime.dry_run,
        },
    )?;

    for file in &report.files {
        match &file.status {
            FileStatus::Changed => {
                let verb = if report.dry_run { "would rewrite" } else { "rewrote" };
                println!("{} {}", verb, file.path.display());
            }
            FileStatus::Unchanged if runtime.verbose => {
                println!("unchanged {}", file.path.display());
            }
            FileStatus::Unchanged => {}
            FileStatus::Failed { reason } => {
                eprintln!("failed {}: {}", file.path.display(), reason);
            }
        }
        if runtime.verbose {
            print_diagnostics(file);
        }
    }

    println!(
        "{} processed, {} {}, {} failed in {}",
        pluralize("file", report.total()),
        report.changed().count(),
        if report.dry_run { "would change" } else { "changed" },
        report.failures(),
        format_duration(started.elapsed())
    );

    Ok(report.failures() == 0)
}
