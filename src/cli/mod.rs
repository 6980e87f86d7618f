pub mod commands;
pub mod utils;

use anyhow::{Context, Result};
use clap::ArgMatches;
use std::path::PathBuf;

use modernize_attrs::config::Config;
use modernize_attrs::logging::init_logging;
use modernize_attrs::FileDiscovery;

/// Configuration, logging and the file list shared by every subcommand.
pub struct Session {
    pub config: Config,
    pub files: Vec<PathBuf>,
}

impl Session {
    pub fn start(matches: &ArgMatches, dry_run: bool) -> Result<Self> {
        let mut config = Config::load().context("Failed to load configuration")?;
        config.apply_overrides(
            matches.get_one::<usize>("jobs").copied(),
            dry_run,
            matches.get_flag("verbose"),
        );
        init_logging(&config.logging);

        let paths: Vec<PathBuf> = matches
            .get_many::<PathBuf>("paths")
            .map(|v| v.cloned().collect())
            .unwrap_or_default();
        let files = FileDiscovery::new(&config.discovery)?
            .discover(&paths)
            .context("Failed to collect input files")?;

        Ok(Self { config, files })
    }
}
