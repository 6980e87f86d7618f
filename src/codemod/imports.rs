//! Import reconciliation.
//!
//! Runs once per file after every class decision has been made. It looks at
//! the emitted text (re-parsed), retires the legacy imports nothing refers to
//! any more and makes the target symbols the rewrites introduced importable
//! from the target module.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::Range;

use serde::Serialize;
use tracing::debug;
use tree_sitter::Node;

use super::CodemodResult;
use super::edits::{Replacement, apply_replacements, line_start, next_line_start};
use super::resolver::{
    AttrsSymbol, ImportResolver, LEGACY_NAMESPACES, SymbolResolver, TARGET_MODULE, symbol_for,
};
use super::syntax::{
    ImportStatement, ImportedName, ParsedModule, collect_imports, is_docstring, name_references,
    named_children, root_identifier, walk,
};

/// Symbols of the target API a rewrite may introduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum TargetSymbol {
    Define,
    Field,
    Factory,
}

impl TargetSymbol {
    pub const ALL: [TargetSymbol; 3] = [TargetSymbol::Define, TargetSymbol::Field, TargetSymbol::Factory];

    pub fn name(self) -> &'static str {
        match self {
            TargetSymbol::Define => "define",
            TargetSymbol::Field => "field",
            TargetSymbol::Factory => "Factory",
        }
    }

    fn qualified(self) -> String {
        format!("{}.{}", TARGET_MODULE, self.name())
    }
}

impl fmt::Display for TargetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Local spelling of each target symbol in one module.
///
/// A symbol is spelled by its own name unless the module already binds that
/// name to something else, in which case it is imported under a free
/// `attrs_<name>` alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetNames {
    spellings: BTreeMap<TargetSymbol, String>,
}

impl Default for TargetNames {
    fn default() -> Self {
        Self {
            spellings: TargetSymbol::ALL
                .into_iter()
                .map(|symbol| (symbol, symbol.name().to_string()))
                .collect(),
        }
    }
}

impl TargetNames {
    pub fn for_module(module: &ParsedModule) -> Self {
        let bound = module_bindings(module);
        let mut taken: BTreeSet<String> = name_references(module, &[]).into_keys().collect();
        taken.extend(bound.keys().cloned());

        let mut names = Self::default();
        for symbol in TargetSymbol::ALL {
            let conflict = bound
                .get(symbol.name())
                .is_some_and(|bindings| !bindings.iter().all(|q| is_spelling_of(q.as_deref(), symbol)));
            if !conflict {
                continue;
            }
            let alias = free_alias(symbol, &taken);
            debug!(symbol = %symbol, alias = %alias, "target name already bound; importing under an alias");
            taken.insert(alias.clone());
            names.spellings.insert(symbol, alias);
        }
        names
    }

    pub fn get(&self, symbol: TargetSymbol) -> &str {
        self.spellings
            .get(&symbol)
            .map_or(symbol.name(), String::as_str)
    }

    /// `define` or `define as attrs_define`, as written in an import.
    fn import_clause(&self, symbol: TargetSymbol) -> String {
        match self.get(symbol) {
            local if local == symbol.name() => local.to_string(),
            local => format!("{} as {}", symbol.name(), local),
        }
    }
}

/// `attr.define` and `attrs.define` are the same object.
fn is_spelling_of(qualified: Option<&str>, symbol: TargetSymbol) -> bool {
    qualified.is_some_and(|qualified| {
        LEGACY_NAMESPACES
            .iter()
            .any(|namespace| qualified == format!("{}.{}", namespace, symbol.name()))
    })
}

fn free_alias(symbol: TargetSymbol, taken: &BTreeSet<String>) -> String {
    let base = format!("{}_{}", TARGET_MODULE, symbol.name());
    let mut candidate = base.clone();
    let mut suffix = 2;
    while taken.contains(&candidate) {
        candidate = format!("{}_{}", base, suffix);
        suffix += 1;
    }
    candidate
}

/// Module-level bindings: imported names map to what they import, top-level
/// definitions and assignments to `None`.
fn module_bindings(module: &ParsedModule) -> HashMap<String, Vec<Option<String>>> {
    let mut bound: HashMap<String, Vec<Option<String>>> = HashMap::new();
    for statement in collect_imports(module) {
        for name in statement.names {
            bound.entry(name.binding).or_default().push(Some(name.qualified));
        }
    }
    for statement in named_children(module.root()) {
        let definition = match statement.kind() {
            "decorated_definition" => statement.child_by_field_name("definition"),
            _ => Some(statement),
        };
        let name = match definition.map(|node| (node.kind(), node)) {
            Some(("function_definition" | "class_definition", node)) => node.child_by_field_name("name"),
            Some(("expression_statement", node)) => named_children(node)
                .into_iter()
                .find(|child| child.kind() == "assignment")
                .and_then(|assignment| assignment.child_by_field_name("left"))
                .filter(|target| target.kind() == "identifier"),
            _ => None,
        };
        if let Some(name) = name {
            bound.entry(module.text(name).to_string()).or_default().push(None);
        }
    }
    bound
}

/// Target symbols required by the rewrites of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportTable {
    names: TargetNames,
    required: BTreeSet<TargetSymbol>,
    first_use: Option<usize>,
}

impl ImportTable {
    pub fn new(names: TargetNames) -> Self {
        Self {
            names,
            ..Self::default()
        }
    }

    pub fn names(&self) -> &TargetNames {
        &self.names
    }

    /// Record that `symbol` is referenced by text starting at byte `at`.
    pub fn require(&mut self, symbol: TargetSymbol, at: usize) {
        self.required.insert(symbol);
        self.first_use = Some(self.first_use.map_or(at, |first| first.min(at)));
    }
}

fn sorted_symbols(symbols: impl Iterator<Item = TargetSymbol>) -> Vec<TargetSymbol> {
    let mut symbols: Vec<TargetSymbol> = symbols.collect();
    symbols.sort_unstable_by_key(|symbol| symbol.name());
    symbols
}

/// Reconcile the import block of `emitted`, the rewritten form of `original`.
pub fn reconcile(
    original: &ParsedModule,
    emitted: &ParsedModule,
    table: &ImportTable,
) -> CodemodResult<ParsedModule> {
    let source = emitted.source();
    let resolver = ImportResolver::from_module(emitted);
    let callees = factory_callees(emitted, &resolver);
    let callee_spans: Vec<Range<usize>> = callees
        .values()
        .flatten()
        .map(|callee| callee.byte_range())
        .collect();

    let before = name_references(original, &[]);
    let after = name_references(emitted, &callee_spans);
    let statements: Vec<ImportStatement<'_>> = collect_imports(emitted)
        .into_iter()
        .filter(|statement| statement.top_level)
        .collect();

    let names = &table.names;
    let mut required = table.required.clone();
    let mut edits = Vec::new();

    let retired: Vec<Vec<bool>> = statements
        .iter()
        .map(|statement| {
            statement
                .names
                .iter()
                .map(|name| {
                    is_legacy_import(statement, name)
                        && before.get(&name.binding).copied().unwrap_or(0) > 0
                        && after.get(&name.binding).copied().unwrap_or(0) == 0
                })
                .collect()
        })
        .collect();

    for (statement, flags) in statements.iter().zip(&retired) {
        for (name, _) in statement.names.iter().zip(flags).filter(|(_, retired)| **retired) {
            debug!(binding = %name.binding, qualified = %name.qualified, "retiring legacy import");
            for callee in callees.get(&name.binding).into_iter().flatten() {
                required.insert(TargetSymbol::Factory);
                if emitted.text(*callee) != names.get(TargetSymbol::Factory) {
                    edits.push(Replacement::for_node(
                        *callee,
                        emitted,
                        names.get(TargetSymbol::Factory),
                        "factory wrapper requalified to the target module",
                    ));
                }
            }
        }
    }

    let available: BTreeSet<TargetSymbol> = statements
        .iter()
        .zip(&retired)
        .filter(|(statement, _)| statement.module.as_deref() == Some(TARGET_MODULE))
        .flat_map(|(statement, flags)| {
            statement
                .names
                .iter()
                .zip(flags)
                .filter(|(_, retired)| !**retired)
                .map(|(name, _)| name)
        })
        .flat_map(|name| {
            TargetSymbol::ALL
                .into_iter()
                .filter(move |symbol| name.binding == names.get(*symbol) && name.qualified == symbol.qualified())
        })
        .collect();
    let missing: Vec<String> = sorted_symbols(required.difference(&available).copied())
        .into_iter()
        .map(|symbol| names.import_clause(symbol))
        .collect();

    // New names must be bound before the first rewritten class runs.
    let anchor = table.first_use.unwrap_or(source.len());
    let target = statements.iter().position(|statement| {
        statement.module.as_deref() == Some(TARGET_MODULE)
            && !statement.wildcard
            && statement.node.end_byte() <= anchor
    });

    for (index, (statement, flags)) in statements.iter().zip(&retired).enumerate() {
        let merge_here = target == Some(index) && !missing.is_empty();
        if !merge_here && !flags.contains(&true) {
            continue;
        }
        let mut kept: Vec<&str> = statement
            .names
            .iter()
            .zip(flags)
            .filter(|(_, retired)| !**retired)
            .map(|(name, _)| emitted.text(name.node))
            .collect();
        if merge_here {
            kept.extend(missing.iter().map(String::as_str));
        }

        if kept.is_empty() {
            edits.push(Replacement::remove_statement(
                statement.node,
                emitted,
                "legacy import no longer referenced",
            ));
        } else {
            edits.push(Replacement::for_node(
                statement.node,
                emitted,
                render_import(statement, &kept, emitted),
                "import names updated",
            ));
        }
    }

    if target.is_none() && !missing.is_empty() {
        let newline = emitted.newline();
        let at = insertion_point(emitted, &statements, anchor);
        let mut line = format!("from {} import {}{}", TARGET_MODULE, missing.join(", "), newline);
        if at == source.len() && !source.is_empty() && !source.ends_with('\n') {
            line.insert_str(0, newline);
        }
        edits.push(Replacement::insert(source, at, line, "target symbols imported"));
    }

    if edits.is_empty() {
        return Ok(emitted.clone());
    }
    ParsedModule::parse(apply_replacements(source, edits)?)
}

/// A legacy namespace import or an individually imported legacy symbol.
/// `attrs.Factory` is already the target spelling and never retired.
fn is_legacy_import(statement: &ImportStatement<'_>, name: &ImportedName<'_>) -> bool {
    match statement.module.as_deref() {
        None => LEGACY_NAMESPACES.contains(&name.qualified.as_str()),
        Some(module) if LEGACY_NAMESPACES.contains(&module) => {
            symbol_for(&name.qualified).is_some() && name.qualified != TargetSymbol::Factory.qualified()
        }
        Some(_) => false,
    }
}

/// Callee nodes of factory-wrapper calls, keyed by the binding they go through.
fn factory_callees<'t>(
    module: &'t ParsedModule,
    resolver: &ImportResolver,
) -> HashMap<String, Vec<Node<'t>>> {
    let mut callees: HashMap<String, Vec<Node<'t>>> = HashMap::new();
    walk(module.root(), &mut |node| {
        if node.kind() == "call" {
            let function = node
                .child_by_field_name("function")
                .filter(|function| resolver.is(*function, module.source(), AttrsSymbol::Factory));
            if let Some(function) = function {
                if let Some(root) = root_identifier(function) {
                    callees
                        .entry(module.text(root).to_string())
                        .or_default()
                        .push(function);
                }
            }
        }
        true
    });
    callees
}

fn render_import(statement: &ImportStatement<'_>, names: &[&str], module: &ParsedModule) -> String {
    let from = statement
        .node
        .child_by_field_name("module_name")
        .map(|name| module.text(name));
    match from {
        Some(from) => format!("from {} import {}", from, names.join(", ")),
        None => format!("import {}", names.join(", ")),
    }
}

/// Right after the last top-level import ending before `anchor`, else after
/// the module docstring, else before the first statement.
fn insertion_point(module: &ParsedModule, statements: &[ImportStatement<'_>], anchor: usize) -> usize {
    let source = module.source();
    let last = statements
        .iter()
        .map(|statement| statement.node)
        .filter(|node| node.end_byte() <= anchor)
        .max_by_key(|node| node.end_byte());
    if let Some(last) = last {
        return next_line_start(source, last.end_byte());
    }
    let body = named_children(module.root());
    match body.first() {
        Some(first) if is_docstring(*first) => next_line_start(source, first.end_byte()),
        Some(first) => line_start(source, first.start_byte()),
        None => source.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconcile_text(original: &str, emitted: &str, symbols: &[TargetSymbol]) -> String {
        let original = ParsedModule::parse(original).unwrap();
        let emitted = ParsedModule::parse(emitted).unwrap();
        let first_use = emitted.source().find('@').unwrap_or(emitted.source().len());
        let mut table = ImportTable::new(TargetNames::for_module(&original));
        for symbol in symbols {
            table.require(*symbol, first_use);
        }
        reconcile(&original, &emitted, &table).unwrap().into_source()
    }

    fn spellings(source: &str) -> Vec<String> {
        let names = TargetNames::for_module(&ParsedModule::parse(source).unwrap());
        TargetSymbol::ALL
            .into_iter()
            .map(|symbol| names.get(symbol).to_string())
            .collect()
    }

    #[test]
    fn test_unbound_names_keep_their_spelling() {
        assert_eq!(spellings("import attr\n"), vec!["define", "field", "Factory"]);
        assert_eq!(
            spellings("from attr import Factory\nfrom attrs import define\n"),
            vec!["define", "field", "Factory"]
        );
    }

    #[test]
    fn test_names_bound_elsewhere_get_an_alias() {
        assert_eq!(
            spellings("from dataclasses import dataclass, field\n"),
            vec!["define", "attrs_field", "Factory"]
        );
        assert_eq!(
            spellings("def define():\n    pass\n\nattrs_Factory = 1\nFactory = object\n"),
            vec!["attrs_define", "field", "attrs_Factory_2"]
        );
    }

    #[test]
    fn test_aliased_names_are_imported_with_as() {
        let output = reconcile_text(
            "import attr\nfrom dataclasses import field\n\n@attr.s\nclass C:\n    x = attr.ib(type=int, repr=False)\n",
            "import attr\nfrom dataclasses import field\n\n@define\nclass C:\n    x: int = attrs_field(repr=False)\n",
            &[TargetSymbol::Define, TargetSymbol::Field],
        );
        assert_eq!(
            output,
            "from dataclasses import field\nfrom attrs import define, field as attrs_field\n\n@define\nclass C:\n    x: int = attrs_field(repr=False)\n"
        );
    }

    #[test]
    fn test_import_below_first_class_is_not_an_anchor() {
        let output = reconcile_text(
            "import attr\n\n@attr.s\nclass C:\n    x = attr.ib(type=int)\n\nimport os\nfrom attrs import frozen\n",
            "import attr\n\n@define\nclass C:\n    x: int\n\nimport os\nfrom attrs import frozen\n",
            &[TargetSymbol::Define],
        );
        assert_eq!(
            output,
            "from attrs import define\n\n@define\nclass C:\n    x: int\n\nimport os\nfrom attrs import frozen\n"
        );
    }

    #[test]
    fn test_inserted_line_uses_file_newline() {
        let output = reconcile_text(
            "import attr\r\nimport os\r\n\r\n@attr.s\r\nclass C:\r\n    x = attr.ib(type=int)\r\n",
            "import attr\r\nimport os\r\n\r\n@define\r\nclass C:\r\n    x: int\r\n",
            &[TargetSymbol::Define],
        );
        assert_eq!(
            output,
            "import os\r\nfrom attrs import define\r\n\r\n@define\r\nclass C:\r\n    x: int\r\n"
        );
    }

    #[test]
    fn test_unreferenced_namespace_import_is_replaced_in_place() {
        let output = reconcile_text(
            "\nimport attr\n\n@attr.s\nclass C:\n    x = attr.ib(type=int)\n",
            "\nimport attr\n\n@define\nclass C:\n    x: int\n",
            &[TargetSymbol::Define],
        );
        assert_eq!(output, "\nfrom attrs import define\n\n@define\nclass C:\n    x: int\n");
    }

    #[test]
    fn test_new_import_follows_last_import() {
        let output = reconcile_text(
            "import attr\nfrom typing import List\n\n@attr.s\nclass C:\n    x = attr.ib(type=List[int])\n",
            "import attr\nfrom typing import List\n\n@define\nclass C:\n    x: List[int]\n",
            &[TargetSymbol::Define],
        );
        assert_eq!(
            output,
            "from typing import List\nfrom attrs import define\n\n@define\nclass C:\n    x: List[int]\n"
        );
    }

    #[test]
    fn test_still_referenced_namespace_is_kept() {
        let output = reconcile_text(
            "import attr\n\n@attr.s\nclass C:\n    x = attr.ib(type=int, validator=attr.validators.instance_of(int))\n",
            "import attr\n\n@define\nclass C:\n    x: int = field(validator=attr.validators.instance_of(int))\n",
            &[TargetSymbol::Define, TargetSymbol::Field],
        );
        assert!(output.starts_with("import attr\nfrom attrs import define, field\n"));
    }

    #[test]
    fn test_named_legacy_symbols_are_removed() {
        let output = reconcile_text(
            "from attr import attrs, attrib\n\n@attrs\nclass C:\n    x = attrib(type=int)\n",
            "from attr import attrs, attrib\n\n@define\nclass C:\n    x: int\n",
            &[TargetSymbol::Define],
        );
        assert_eq!(output, "from attrs import define\n\n@define\nclass C:\n    x: int\n");
    }

    #[test]
    fn test_partial_statement_keeps_other_names() {
        let output = reconcile_text(
            "from attr import attrs, attrib, validators\n\n@attrs\nclass C:\n    x = attrib(type=int, validator=validators.instance_of(int))\n",
            "from attr import attrs, attrib, validators\n\n@define\nclass C:\n    x: int = field(validator=validators.instance_of(int))\n",
            &[TargetSymbol::Define, TargetSymbol::Field],
        );
        assert!(output.starts_with("from attr import validators\nfrom attrs import define, field\n"));
    }

    #[test]
    fn test_names_merge_into_existing_target_import() {
        let output = reconcile_text(
            "import attr\nfrom attrs import frozen\n\n@attr.s\nclass C:\n    x = attr.ib(type=int)\n",
            "import attr\nfrom attrs import frozen\n\n@define\nclass C:\n    x: int\n",
            &[TargetSymbol::Define],
        );
        assert_eq!(output, "from attrs import frozen, define\n\n@define\nclass C:\n    x: int\n");
    }

    #[test]
    fn test_factory_wrapper_is_requalified_when_namespace_retires() {
        let output = reconcile_text(
            "import attr\n\n@attr.s\nclass C:\n    x = attr.ib(type=list, default=attr.Factory(list))\n",
            "import attr\n\n@define\nclass C:\n    x: list = attr.Factory(list)\n",
            &[TargetSymbol::Define],
        );
        assert_eq!(
            output,
            "from attrs import Factory, define\n\n@define\nclass C:\n    x: list = Factory(list)\n"
        );
    }

    #[test]
    fn test_factory_wrapper_keeps_still_used_namespace() {
        let output = reconcile_text(
            "import attr\n\n@attr.s\nclass C:\n    x = attr.ib(type=list, default=attr.Factory(list), validator=attr.validators.instance_of(list))\n",
            "import attr\n\n@define\nclass C:\n    x: list = field(default=attr.Factory(list), validator=attr.validators.instance_of(list))\n",
            &[TargetSymbol::Define, TargetSymbol::Field],
        );
        assert!(output.starts_with("import attr\nfrom attrs import define, field\n"));
        assert!(output.contains("attr.Factory(list)"));
    }

    #[test]
    fn test_unused_legacy_import_is_left_alone() {
        let output = reconcile_text(
            "import attr\nimport attrs\n\n@attrs.s\nclass C:\n    x = attrs.ib(type=int)\n",
            "import attr\nimport attrs\n\n@define\nclass C:\n    x: int\n",
            &[TargetSymbol::Define],
        );
        assert_eq!(
            output,
            "import attr\nfrom attrs import define\n\n@define\nclass C:\n    x: int\n"
        );
    }

    #[test]
    fn test_insertion_after_docstring_without_imports() {
        let output = reconcile_text(
            "\"\"\"Docs.\"\"\"\n\nx = 1\n",
            "\"\"\"Docs.\"\"\"\n\nx = 1\n",
            &[TargetSymbol::Define],
        );
        assert_eq!(output, "\"\"\"Docs.\"\"\"\nfrom attrs import define\n\nx = 1\n");
    }

    #[test]
    fn test_nothing_to_do_returns_emitted_text() {
        let source = "from attrs import define\n\n@define\nclass C:\n    x: int\n";
        assert_eq!(reconcile_text(source, source, &[TargetSymbol::Define]), source);
    }
}
