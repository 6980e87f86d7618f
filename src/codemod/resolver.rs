//! Symbol resolution: which fully-qualified names an expression may denote.
//!
//! Rewrite rules never match literal spellings such as `attr.ib`; they ask a
//! [`SymbolResolver`] and compare the answer against the fixed alias table
//! below, which keeps them indifferent to `import attr as a` style aliasing.

use std::collections::{BTreeSet, HashMap};

use tree_sitter::Node;

use super::syntax::{ParsedModule, collect_imports};

pub type QualifiedNames = BTreeSet<String>;

/// Namespaces whose plain imports the reconciler may retire.
pub const LEGACY_NAMESPACES: &[&str] = &["attr", "attrs"];

/// Module the target symbols are imported from.
pub const TARGET_MODULE: &str = "attrs";

const LEGACY_MARKERS: &[&str] = &[
    "attr.s",
    "attr.attrs",
    "attr.attributes",
    "attrs.s",
    "attrs.attrs",
    "attrs.attributes",
];

const LEGACY_BUILDERS: &[&str] = &[
    "attr.ib",
    "attr.attr",
    "attr.attrib",
    "attrs.ib",
    "attrs.attr",
    "attrs.attrib",
];

const FACTORIES: &[&str] = &["attr.Factory", "attrs.Factory"];

/// The attrs symbols the rewrite rules care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrsSymbol {
    LegacyMarker,
    LegacyBuilder,
    Factory,
}

/// Look a fully-qualified name up in the alias table.
pub fn symbol_for(qualified: &str) -> Option<AttrsSymbol> {
    if LEGACY_MARKERS.contains(&qualified) {
        Some(AttrsSymbol::LegacyMarker)
    } else if LEGACY_BUILDERS.contains(&qualified) {
        Some(AttrsSymbol::LegacyBuilder)
    } else if FACTORIES.contains(&qualified) {
        Some(AttrsSymbol::Factory)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolMatch {
    NoMatch,
    /// Every candidate is the symbol.
    Match,
    /// Some candidates are the symbol, others are not.
    Ambiguous,
}

pub fn match_symbol(names: &QualifiedNames, symbol: AttrsSymbol) -> SymbolMatch {
    let hits = names
        .iter()
        .filter(|name| symbol_for(name) == Some(symbol))
        .count();
    if hits == 0 {
        SymbolMatch::NoMatch
    } else if hits == names.len() {
        SymbolMatch::Match
    } else {
        SymbolMatch::Ambiguous
    }
}

/// Oracle answering "what could this expression refer to".
///
/// Implementations must be free of side effects and stable for the duration
/// of one transformation.
pub trait SymbolResolver {
    /// Candidate fully-qualified names for `node`; empty when unknown.
    fn qualified_names(&self, node: Node<'_>, source: &str) -> QualifiedNames;

    fn resolves_to(&self, node: Node<'_>, source: &str, symbol: AttrsSymbol) -> SymbolMatch {
        match_symbol(&self.qualified_names(node, source), symbol)
    }

    fn is(&self, node: Node<'_>, source: &str, symbol: AttrsSymbol) -> bool {
        self.resolves_to(node, source, symbol) == SymbolMatch::Match
    }
}

/// Resolver driven by the module's own import statements.
#[derive(Debug, Clone, Default)]
pub struct ImportResolver {
    bindings: HashMap<String, QualifiedNames>,
}

impl ImportResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_module(module: &ParsedModule) -> Self {
        let mut resolver = Self::new();
        for statement in collect_imports(module) {
            if statement.module.as_deref().is_some_and(|m| m.starts_with('.')) {
                continue;
            }
            for name in statement.names {
                resolver.bind(name.binding, name.qualified);
            }
        }
        resolver
    }

    /// Record that `binding` may refer to `qualified`. Repeated bindings
    /// (e.g. `try`/`except ImportError` fallbacks) accumulate candidates.
    pub fn bind(&mut self, binding: impl Into<String>, qualified: impl Into<String>) {
        self.bindings
            .entry(binding.into())
            .or_default()
            .insert(qualified.into());
    }
}

impl SymbolResolver for ImportResolver {
    fn qualified_names(&self, node: Node<'_>, source: &str) -> QualifiedNames {
        match node.kind() {
            "identifier" => self
                .bindings
                .get(&source[node.byte_range()])
                .cloned()
                .unwrap_or_default(),
            "attribute" => {
                let (Some(object), Some(attribute)) = (
                    node.child_by_field_name("object"),
                    node.child_by_field_name("attribute"),
                ) else {
                    return QualifiedNames::new();
                };
                let attribute = &source[attribute.byte_range()];
                self.qualified_names(object, source)
                    .into_iter()
                    .map(|prefix| format!("{}.{}", prefix, attribute))
                    .collect()
            }
            _ => QualifiedNames::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codemod::syntax::{decorator_expression, walk};

    fn decorators(module: &ParsedModule) -> Vec<Node<'_>> {
        let mut found = Vec::new();
        walk(module.root(), &mut |node| {
            if node.kind() == "decorator" {
                found.extend(decorator_expression(node));
            }
            true
        });
        found
    }

    #[test]
    fn test_symbol_table() {
        assert_eq!(symbol_for("attr.s"), Some(AttrsSymbol::LegacyMarker));
        assert_eq!(symbol_for("attrs.attrib"), Some(AttrsSymbol::LegacyBuilder));
        assert_eq!(symbol_for("attr.Factory"), Some(AttrsSymbol::Factory));
        assert_eq!(symbol_for("attrs.define"), None);
        assert_eq!(symbol_for("dataclasses.dataclass"), None);
    }

    #[test]
    fn test_resolves_through_aliases() {
        let module = ParsedModule::parse(
            "import attr as a\nfrom attr import attrs as marker\n\n@a.s\nclass A:\n    pass\n\n@marker\nclass B:\n    pass\n\n@unknown\nclass C:\n    pass\n",
        )
        .unwrap();
        let resolver = ImportResolver::from_module(&module);
        let source = module.source();
        let found = decorators(&module);

        assert_eq!(
            resolver.qualified_names(found[0], source),
            QualifiedNames::from(["attr.s".to_string()])
        );
        assert!(resolver.is(found[1], source, AttrsSymbol::LegacyMarker));
        assert_eq!(
            resolver.resolves_to(found[2], source, AttrsSymbol::LegacyMarker),
            SymbolMatch::NoMatch
        );
    }

    #[test]
    fn test_fallback_imports_make_resolution_ambiguous() {
        let module = ParsedModule::parse(
            "try:\n    from attr import s\nexcept ImportError:\n    from mylib import s\n\n@s\nclass A:\n    pass\n",
        )
        .unwrap();
        let resolver = ImportResolver::from_module(&module);
        let found = decorators(&module);

        assert_eq!(
            resolver.resolves_to(found[0], module.source(), AttrsSymbol::LegacyMarker),
            SymbolMatch::Ambiguous
        );
    }

    #[test]
    fn test_relative_imports_are_ignored() {
        let module = ParsedModule::parse("from .attr import s\n\n@s\nclass A:\n    pass\n").unwrap();
        let resolver = ImportResolver::from_module(&module);
        let found = decorators(&module);

        assert!(resolver.qualified_names(found[0], module.source()).is_empty());
    }
}
