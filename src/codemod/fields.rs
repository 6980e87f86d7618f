//! Field rule engine.
//!
//! A legacy `attr.ib(...)` call is decomposed into a tagged record
//! ([`FieldArgs`]) and the target declaration is picked from an explicit
//! decision table ([`FieldArgs::synthesize`]):
//!
//! | factory | simple default | other args | forced | shape            |
//! |---------|----------------|------------|--------|------------------|
//! | no      | yes            | no         | no     | literal default  |
//! | yes     | -              | no         | no     | factory shortcut |
//! | no      | no             | no         | no     | bare annotation  |
//! | any other combination                         || `field(...)`     |

use tree_sitter::Node;

use super::edits::line_start;
use super::imports::{TargetNames, TargetSymbol};
use super::resolver::{AttrsSymbol, SymbolResolver};
use super::syntax::{ParsedModule, named_children};

/// One argument of a legacy builder call, kept in source form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderArgument<'t> {
    /// Whole argument (`validator=...`, `0`, `**extra`).
    pub node: Node<'t>,
    pub keyword: Option<String>,
    pub value: Node<'t>,
}

/// A call to one of the legacy per-field builders.
#[derive(Debug, Clone)]
pub struct LegacyBuilderCall<'t> {
    pub call: Node<'t>,
    pub arguments: Vec<BuilderArgument<'t>>,
    /// Comments standing between the arguments.
    pub comments: Vec<Node<'t>>,
}

impl<'t> LegacyBuilderCall<'t> {
    /// `Some` when `value` is a call whose callee resolves to a legacy builder.
    pub fn recognize(
        value: Node<'t>,
        module: &ParsedModule,
        resolver: &dyn SymbolResolver,
    ) -> Option<Self> {
        if value.kind() != "call" {
            return None;
        }
        let function = value.child_by_field_name("function")?;
        if !resolver.is(function, module.source(), AttrsSymbol::LegacyBuilder) {
            return None;
        }
        let arguments = value.child_by_field_name("arguments")?;
        let mut cursor = arguments.walk();
        let comments = arguments
            .children(&mut cursor)
            .filter(|child| child.kind() == "comment")
            .collect();
        Some(Self {
            call: value,
            arguments: call_arguments(arguments, module),
            comments,
        })
    }

    pub fn keyword(&self, name: &str) -> Option<&BuilderArgument<'t>> {
        self.arguments
            .iter()
            .rev()
            .find(|argument| argument.keyword.as_deref() == Some(name))
    }

    pub fn has_type(&self) -> bool {
        self.keyword("type").is_some()
    }
}

fn call_arguments<'t>(arguments: Node<'t>, module: &ParsedModule) -> Vec<BuilderArgument<'t>> {
    if arguments.kind() != "argument_list" {
        // A bare generator argument: `attr.ib(x for x in y)`.
        return vec![BuilderArgument {
            node: arguments,
            keyword: None,
            value: arguments,
        }];
    }

    named_children(arguments)
        .into_iter()
        .map(|node| match node.kind() {
            "keyword_argument" => BuilderArgument {
                node,
                keyword: node
                    .child_by_field_name("name")
                    .map(|name| module.text(name).to_string()),
                value: node.child_by_field_name("value").unwrap_or(node),
            },
            _ => BuilderArgument {
                node,
                keyword: None,
                value: node,
            },
        })
        .collect()
}

/// A per-instance default: `Factory(value)` or `factory=value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactoryArg<'t> {
    /// The `Factory` callee; `None` for the `factory=` keyword.
    pub function: Option<Node<'t>>,
    pub value: Node<'t>,
    /// Whole wrapper call, emitted unchanged by the shortcut form.
    pub wrapper: Option<Node<'t>>,
}

impl<'t> FactoryArg<'t> {
    /// `Some` for a `Factory(callable)` call with exactly one positional argument.
    pub fn from_wrapper(
        value: Node<'t>,
        module: &ParsedModule,
        resolver: &dyn SymbolResolver,
    ) -> Option<Self> {
        if value.kind() != "call" {
            return None;
        }
        let function = value.child_by_field_name("function")?;
        if !resolver.is(function, module.source(), AttrsSymbol::Factory) {
            return None;
        }
        let arguments = value.child_by_field_name("arguments")?;
        if arguments.kind() != "argument_list" {
            return None;
        }
        let children = named_children(arguments);
        let [argument] = children.as_slice() else {
            return None;
        };
        let argument = *argument;
        if matches!(
            argument.kind(),
            "keyword_argument" | "list_splat" | "dictionary_splat"
        ) {
            return None;
        }

        Some(Self {
            function: Some(function),
            value: argument,
            wrapper: Some(value),
        })
    }
}

/// Decomposed legacy builder arguments.
#[derive(Debug, Clone, Default)]
pub struct FieldArgs<'t> {
    pub type_expr: Option<Node<'t>>,
    pub simple_default: Option<Node<'t>>,
    pub factory: Option<FactoryArg<'t>>,
    pub other: Vec<BuilderArgument<'t>>,
}

impl<'t> FieldArgs<'t> {
    pub fn decompose(
        call: &LegacyBuilderCall<'t>,
        module: &ParsedModule,
        resolver: &dyn SymbolResolver,
    ) -> Self {
        let mut args = FieldArgs::default();
        for argument in &call.arguments {
            match argument.keyword.as_deref() {
                Some("type") => args.type_expr = Some(argument.value),
                Some("default") => {
                    match FactoryArg::from_wrapper(argument.value, module, resolver) {
                        Some(factory) => args.factory = Some(factory),
                        None => args.simple_default = Some(argument.value),
                    }
                }
                Some("factory") => {
                    args.factory = Some(FactoryArg {
                        function: None,
                        value: argument.value,
                        wrapper: None,
                    })
                }
                _ => args.other.push(argument.clone()),
            }
        }
        args
    }

    pub fn synthesize(&self, forced: bool) -> FieldShape<'t> {
        let has_other = !self.other.is_empty();
        match (self.factory, self.simple_default, has_other, forced) {
            (None, Some(default), false, false) => FieldShape::Literal(default),
            (Some(factory), _, false, false) => FieldShape::FactoryShortcut(factory),
            (None, None, false, false) => FieldShape::Bare,
            _ => FieldShape::Builder {
                factory: self.factory.map(|factory| factory.value),
                default: self.simple_default.filter(|_| self.factory.is_none()),
                other: self.other.clone(),
            },
        }
    }
}

/// Target declaration form for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldShape<'t> {
    /// `name: T = <default>`
    Literal(Node<'t>),
    /// `name: T = Factory(<value>)`
    FactoryShortcut(FactoryArg<'t>),
    /// `name: T = field(...)`
    Builder {
        factory: Option<Node<'t>>,
        default: Option<Node<'t>>,
        other: Vec<BuilderArgument<'t>>,
    },
    /// `name: T`
    Bare,
}

/// Rendered replacement text plus the target symbols it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRewrite {
    pub text: String,
    pub symbols: Vec<TargetSymbol>,
}

pub fn render_field(
    name: &str,
    annotation: Option<&str>,
    shape: &FieldShape<'_>,
    module: &ParsedModule,
    names: &TargetNames,
) -> FieldRewrite {
    let mut symbols = Vec::new();
    let value = match shape {
        FieldShape::Literal(default) => Some(module.text(*default).to_string()),
        FieldShape::FactoryShortcut(factory) => Some(match factory.wrapper {
            Some(wrapper) => module.text(wrapper).to_string(),
            None => {
                symbols.push(TargetSymbol::Factory);
                format!("{}({})", names.get(TargetSymbol::Factory), module.text(factory.value))
            }
        }),
        FieldShape::Builder {
            factory,
            default,
            other,
        } => {
            symbols.push(TargetSymbol::Field);
            let mut arguments = Vec::new();
            if let Some(factory) = factory {
                arguments.push(format!("factory={}", module.text(*factory)));
            }
            if let Some(default) = default {
                arguments.push(format!("default={}", module.text(*default)));
            }
            arguments.extend(other.iter().map(|argument| module.text(argument.node).to_string()));
            Some(format!("{}({})", names.get(TargetSymbol::Field), arguments.join(", ")))
        }
        FieldShape::Bare if annotation.is_none() => {
            // Nothing left to declare the field with but the builder itself.
            symbols.push(TargetSymbol::Field);
            Some(format!("{}()", names.get(TargetSymbol::Field)))
        }
        FieldShape::Bare => None,
    };

    let text = match (annotation, value) {
        (Some(annotation), Some(value)) => format!("{}: {} = {}", name, annotation, value),
        (Some(annotation), None) => format!("{}: {}", name, annotation),
        (None, Some(value)) => format!("{} = {}", name, value),
        (None, None) => name.to_string(),
    };

    FieldRewrite { text, symbols }
}

/// Move comments from between the builder's arguments onto their own lines
/// above `rewritten`, at the indentation of `statement`.
pub fn with_interior_comments(
    rewritten: String,
    call: &LegacyBuilderCall<'_>,
    statement: Node<'_>,
    module: &ParsedModule,
) -> String {
    if call.comments.is_empty() {
        return rewritten;
    }
    let source = module.source();
    let indent: String = source[line_start(source, statement.start_byte())..statement.start_byte()]
        .chars()
        .take_while(|c| c.is_whitespace())
        .collect();

    let mut text = String::new();
    for comment in &call.comments {
        text.push_str(module.text(*comment));
        text.push_str(module.newline());
        text.push_str(&indent);
    }
    text.push_str(&rewritten);
    text
}
