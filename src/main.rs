use clap::{Arg, Command};
use dotenv::dotenv;
use std::path::PathBuf;
use std::process;

mod cli;

fn main() {
    // Load environment variables from .env file
    dotenv().ok();

    let matches = build_cli().get_matches();

    match run_command(matches) {
        Ok(success) => process::exit(if success { 0 } else { 1 }),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn paths_arg() -> Arg {
    Arg::new("paths")
        .help("Python files or directories to process")
        .required(true)
        .num_args(1..)
        .value_parser(clap::value_parser!(PathBuf))
}

fn jobs_arg() -> Arg {
    Arg::new("jobs")
        .short('j')
        .long("jobs")
        .help("Number of parallel workers (defaults to one per core)")
        .value_parser(clap::value_parser!(usize))
}

fn verbose_arg(help: &'static str) -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .help(help)
        .action(clap::ArgAction::SetTrue)
}

fn build_cli() -> Command {
    Command::new("modernize-attrs")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Migrate legacy attr classes to the modern attrs API")
        .long_about(
            "Rewrites @attr.s / attr.ib declarations into @define / field, \
             leaving classes that cannot be migrated safely untouched.",
        )
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Rewrite files in place")
                .arg(paths_arg())
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("Report what would change without writing anything")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(jobs_arg())
                .arg(verbose_arg("List every processed file and each diagnostic")),
        )
        .subcommand(
            Command::new("check")
                .about("List files that would change (never writes)")
                .long_about("Exits with status 1 when any file would change or could not be processed.")
                .arg(paths_arg())
                .arg(
                    Arg::new("format")
                        .short('f')
                        .long("format")
                        .help("Output format")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(jobs_arg())
                .arg(verbose_arg("Also print diagnostics for skipped classes")),
        )
}

fn run_command(matches: clap::ArgMatches) -> anyhow::Result<bool> {
    match matches.subcommand() {
        Some(("run", sub_matches)) => cli::commands::run::handle_run(sub_matches),
        Some(("check", sub_matches)) => cli::commands::check::handle_check(sub_matches),
        _ => {
            unreachable!("Command parsing should ensure we never reach this");
        }
    }
}
