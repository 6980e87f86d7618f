//! Process-wide `tracing` subscriber setup.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    /// Unknown names fall back to `compact`.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Install the global subscriber. Only the first call has any effect;
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) {
    static INITIALISED: OnceLock<()> = OnceLock::new();

    INITIALISED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
        let to_stdout = config.target.eq_ignore_ascii_case("stdout");

        let builder = fmt().with_env_filter(filter).with_target(true);
        let result = match (LogFormat::parse(&config.format), to_stdout) {
            (LogFormat::Json, true) => builder.json().with_writer(std::io::stdout).try_init(),
            (LogFormat::Json, false) => builder.json().with_writer(std::io::stderr).try_init(),
            (LogFormat::Pretty, true) => builder.pretty().with_writer(std::io::stdout).try_init(),
            (LogFormat::Pretty, false) => builder.pretty().with_writer(std::io::stderr).try_init(),
            (LogFormat::Compact, true) => builder.compact().with_writer(std::io::stdout).try_init(),
            (LogFormat::Compact, false) => builder.compact().with_writer(std::io::stderr).try_init(),
        };
        // Another subscriber (a test harness, an embedding application) wins.
        let _ = result;
    });
}
