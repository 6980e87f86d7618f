use anyhow::{Context, Result};
use clap::ArgMatches;

use modernize_attrs::{BatchReport, FileStatus, RunOptions, run_batch};

use super::print_diagnostics;
use crate::cli::Session;
use crate::cli::utils::pluralize;

/// List files that would change. Succeeds only when nothing would change and
/// every file could be processed.
pub fn handle_check(matches: &ArgMatches) -> Result<bool> {
    let session = Session::start(matches, true)?;
    let verbose = session.config.runtime.verbose;
    let format = matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");

    let report = run_batch(
        &session.files,
        RunOptions {
            jobs: session.config.runtime.jobs,
            dry_run: true,
        },
    )?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{}", json);
        }
        _ => display_check_results(&report, verbose),
    }

    Ok(is_clean(&report))
}

fn is_clean(report: &BatchReport) -> bool {
    report.failures() == 0 && report.changed().next().is_none()
}

fn display_check_results(report: &BatchReport, verbose: bool) {
    for file in &report.files {
        match &file.status {
            FileStatus::Changed => println!("would rewrite {}", file.path.display()),
            FileStatus::Failed { reason } => eprintln!("failed {}: {}", file.path.display(), reason),
            FileStatus::Unchanged => {}
        }
        if verbose {
            print_diagnostics(file);
        }
    }

    let changed = report.changed().count();
    if is_clean(report) {
        println!("{} already up to date", pluralize("file", report.total()));
    } else {
        println!(
            "{} would be rewritten, {} failed",
            pluralize("file", changed),
            report.failures()
        );
    }
}
