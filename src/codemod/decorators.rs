//! Class marker decorator rewriting: `@attr.s(...)` becomes `@define(...)`.

use tree_sitter::Node;

use super::edits::Replacement;
use super::imports::{TargetNames, TargetSymbol};
use super::resolver::{AttrsSymbol, SymbolMatch, SymbolResolver};
use super::syntax::{ParsedModule, decorator_expression, named_children};

/// One argument of a marker decorator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratorArgument<'t> {
    pub node: Node<'t>,
    pub keyword: Option<String>,
    pub value: Node<'t>,
}

impl DecoratorArgument<'_> {
    /// `auto_attribs=True` is what the target marker does anyway.
    fn is_redundant(&self) -> bool {
        self.keyword.as_deref() == Some("auto_attribs") && self.value.kind() == "true"
    }
}

/// A decorator confirmed to be the legacy class marker.
#[derive(Debug, Clone)]
pub struct MarkerDecorator<'t> {
    pub decorator: Node<'t>,
    pub expression: Node<'t>,
    /// `None` for the bare form, `Some` (possibly empty) for a call.
    pub arguments: Option<Vec<DecoratorArgument<'t>>>,
}

#[derive(Debug, Clone)]
pub enum MarkerResolution<'t> {
    Marker(MarkerDecorator<'t>),
    Ambiguous,
    NotMarker,
}

pub fn resolve_marker<'t>(
    decorator: Node<'t>,
    module: &ParsedModule,
    resolver: &dyn SymbolResolver,
) -> MarkerResolution<'t> {
    let Some(expression) = decorator_expression(decorator) else {
        return MarkerResolution::NotMarker;
    };
    let (callee, arguments) = if expression.kind() == "call" {
        let Some(function) = expression.child_by_field_name("function") else {
            return MarkerResolution::NotMarker;
        };
        let arguments = expression
            .child_by_field_name("arguments")
            .filter(|arguments| arguments.kind() == "argument_list")
            .map(|arguments| decorator_arguments(arguments, module))
            .unwrap_or_default();
        (function, Some(arguments))
    } else {
        (expression, None)
    };

    match resolver.resolves_to(callee, module.source(), AttrsSymbol::LegacyMarker) {
        SymbolMatch::Match => MarkerResolution::Marker(MarkerDecorator {
            decorator,
            expression,
            arguments,
        }),
        SymbolMatch::Ambiguous => MarkerResolution::Ambiguous,
        SymbolMatch::NoMatch => MarkerResolution::NotMarker,
    }
}

fn decorator_arguments<'t>(arguments: Node<'t>, module: &ParsedModule) -> Vec<DecoratorArgument<'t>> {
    named_children(arguments)
        .into_iter()
        .map(|node| {
            if node.kind() == "keyword_argument" {
                DecoratorArgument {
                    node,
                    keyword: node
                        .child_by_field_name("name")
                        .map(|name| module.text(name).to_string()),
                    value: node.child_by_field_name("value").unwrap_or(node),
                }
            } else {
                DecoratorArgument {
                    node,
                    keyword: None,
                    value: node,
                }
            }
        })
        .collect()
}

impl<'t> MarkerDecorator<'t> {
    /// Arguments that survive the migration, in original order.
    pub fn kept_arguments(&self) -> Vec<&DecoratorArgument<'t>> {
        self.arguments
            .iter()
            .flatten()
            .filter(|argument| !argument.is_redundant())
            .collect()
    }

    /// Target marker text for the decorator expression.
    pub fn render(&self, module: &ParsedModule, names: &TargetNames) -> String {
        let kept = self.kept_arguments();
        let marker = names.get(TargetSymbol::Define);
        if kept.is_empty() {
            return marker.to_string();
        }
        let arguments: Vec<&str> = kept.iter().map(|argument| module.text(argument.node)).collect();
        format!("{}({})", marker, arguments.join(", "))
    }

    pub fn rewrite(&self, module: &ParsedModule, names: &TargetNames) -> Replacement {
        Replacement::for_node(
            self.expression,
            module,
            self.render(module, names),
            "legacy class marker replaced by the target marker",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codemod::resolver::ImportResolver;
    use crate::codemod::syntax::walk;

    fn render(source: &str) -> Vec<Option<String>> {
        let module = ParsedModule::parse(source).unwrap();
        let resolver = ImportResolver::from_module(&module);
        let mut decorators = Vec::new();
        walk(module.root(), &mut |node| {
            if node.kind() == "decorator" {
                decorators.push(node);
            }
            true
        });
        decorators
            .into_iter()
            .map(|decorator| match resolve_marker(decorator, &module, &resolver) {
                MarkerResolution::Marker(marker) => Some(marker.render(&module, &TargetNames::default())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_bare_marker() {
        assert_eq!(
            render("import attr\n\n@attr.s\nclass C:\n    pass\n"),
            vec![Some("define".to_string())]
        );
    }

    #[test]
    fn test_marker_arguments_are_kept_in_order() {
        assert_eq!(
            render("import attr\n\n@attr.s(frozen=True, eq=False)\nclass C:\n    pass\n"),
            vec![Some("define(frozen=True, eq=False)".to_string())]
        );
    }

    #[test]
    fn test_auto_attribs_true_is_dropped() {
        assert_eq!(
            render("import attr\n\n@attr.s(auto_attribs=True)\nclass C:\n    pass\n"),
            vec![Some("define".to_string())]
        );
        assert_eq!(
            render("import attr\n\n@attr.s(slots=True, auto_attribs=True, repr=False)\nclass C:\n    pass\n"),
            vec![Some("define(slots=True, repr=False)".to_string())]
        );
    }

    #[test]
    fn test_auto_attribs_false_is_kept() {
        assert_eq!(
            render("import attr\n\n@attr.s(auto_attribs=False)\nclass C:\n    pass\n"),
            vec![Some("define(auto_attribs=False)".to_string())]
        );
    }

    #[test]
    fn test_empty_call_becomes_bare() {
        assert_eq!(
            render("from attr import attrs\n\n@attrs()\nclass C:\n    pass\n"),
            vec![Some("define".to_string())]
        );
    }

    #[test]
    fn test_other_decorators_are_not_markers() {
        assert_eq!(
            render("import functools\n\n@functools.total_ordering\nclass C:\n    pass\n"),
            vec![None]
        );
    }
}
