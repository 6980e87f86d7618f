pub mod codemod;
pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod runner;

pub use codemod::{
    CodemodError, Diagnostic, DiagnosticKind, ImportResolver, ParsedModule, SymbolResolver,
    TransformOutcome, transform_module, transform_source, transform_with_resolver,
};
pub use config::Config;
pub use discovery::FileDiscovery;
pub use error::{ModernizeError, Result};
pub use runner::{BatchReport, FileReport, FileStatus, RunOptions, process_file, run_batch};
