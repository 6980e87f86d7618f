//! Rewrite engine migrating legacy `attr` classes to the modern `attrs` API.
//!
//! The engine works on one parsed module at a time. The [`transformer`] walks
//! the tree, asks the [`classifier`] for a verdict once per class, rewrites
//! marker decorators ([`decorators`]) and field declarations ([`fields`]) and
//! finally lets the [`imports`] reconciler fix the import block. Every change is
//! a byte-span [`edits::Replacement`] over the original text, so code that is
//! not rewritten stays byte-for-byte identical.

pub mod classifier;
pub mod decorators;
pub mod edits;
pub mod fields;
pub mod imports;
pub mod resolver;
pub mod syntax;
pub mod transformer;

use std::fmt;
use std::ops::Range;

use serde::Serialize;

pub use classifier::{ClassVerdict, Safety};
pub use imports::{ImportTable, TargetNames, TargetSymbol};
pub use resolver::{ImportResolver, QualifiedNames, SymbolResolver};
pub use syntax::ParsedModule;
pub use transformer::{TransformOutcome, transform_module, transform_source, transform_with_resolver};

/// Hard failures for one file. Class- and field-level problems never end up
/// here; they are reported as [`Diagnostic`]s instead.
#[derive(Debug, thiserror::Error)]
pub enum CodemodError {
    #[error("Failed to parse Python source: {0}")]
    Parse(String),

    #[error("Failed to load the Python grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("Unexpected syntax tree shape: {0}")]
    MalformedTree(String),

    #[error("Overlapping edits at bytes {first:?} and {second:?}")]
    OverlappingEdits {
        first: Range<usize>,
        second: Range<usize>,
    },
}

/// Result type for rewrite engine operations
pub type CodemodResult<T> = Result<T, CodemodError>;

/// Why a class or field was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A legacy field whose target is not a plain name.
    UnsupportedTarget,
    /// A legacy field without any type information.
    UnsafeClass,
    /// A decorator that may or may not be the legacy marker.
    AmbiguousDecorator,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticKind::UnsupportedTarget => "unsupported-target",
            DiagnosticKind::UnsafeClass => "unsafe-class",
            DiagnosticKind::AmbiguousDecorator => "ambiguous-decorator",
        };
        f.write_str(label)
    }
}

/// Advisory message attached to a transformation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub class_name: String,
    pub line: usize,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: [{}] {}: {}",
            self.line, self.kind, self.class_name, self.message
        )
    }
}
