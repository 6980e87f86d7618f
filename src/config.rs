use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the optional configuration file looked up in the working directory
pub const CONFIG_FILE: &str = "modernize-attrs.toml";

/// Prefix of the environment variables overriding file values
pub const ENV_PREFIX: &str = "MODERNIZE_ATTRS";

/// Main configuration structure for modernize-attrs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
}

/// Which files a run picks up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// File extensions treated as Python sources, without the dot
    pub extensions: Vec<String>,
    /// Directory names never descended into
    pub exclude_dirs: Vec<String>,
    /// Regular expressions matched against the full path of every candidate file
    pub exclude_patterns: Vec<String>,
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads; 0 lets rayon pick one per core
    pub jobs: usize,
    pub dry_run: bool,
    pub verbose: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub target: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["py".to_string(), "pyi".to_string()],
            exclude_dirs: [
                ".git",
                ".hg",
                ".tox",
                ".nox",
                ".venv",
                "venv",
                "__pycache__",
                "node_modules",
                "build",
                "dist",
            ]
            .iter()
            .map(|dir| dir.to_string())
            .collect(),
            exclude_patterns: Vec::new(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            dry_run: false,
            verbose: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(), // pretty, json, compact
            target: "stderr".to_string(),  // stdout, stderr
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (MODERNIZE_ATTRS_*)
    /// 2. modernize-attrs.toml file (if exists)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_dir(&std::env::current_dir()?)
    }

    /// Load configuration from a specific directory
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        let config_file = dir.join(CONFIG_FILE);
        if config_file.exists() {
            builder = builder.add_source(File::from(config_file.clone()));
        }

        // MODERNIZE_ATTRS_RUNTIME__DRY_RUN=true, MODERNIZE_ATTRS_DISCOVERY__EXCLUDE_DIRS=a,b
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("discovery.extensions")
                .with_list_parse_key("discovery.exclude_dirs")
                .with_list_parse_key("discovery.exclude_patterns")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize::<Config>()
            .with_context(|| format!("Invalid configuration (file: {})", config_file.display()))
    }

    /// Create a new Config for testing
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            runtime: RuntimeConfig {
                jobs: 1,
                dry_run: true,
                verbose: true,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
                target: "stdout".to_string(),
            },
        }
    }

    /// Apply command-line overrides on top of the loaded values.
    pub fn apply_overrides(&mut self, jobs: Option<usize>, dry_run: bool, verbose: bool) {
        if let Some(jobs) = jobs {
            self.runtime.jobs = jobs;
        }
        self.runtime.dry_run |= dry_run;
        self.runtime.verbose |= verbose;
        if self.runtime.verbose && self.logging.level != "trace" {
            self.logging.level = "debug".to_string();
        }
    }

    /// Where the configuration file would be read from
    pub fn file_in(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILE)
    }
}
