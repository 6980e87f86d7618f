//! Python syntax layer built on tree-sitter.
//!
//! [`ParsedModule`] owns the source text together with its concrete syntax
//! tree. The rest of this module lifts the few shapes the engine cares about
//! (classes, field assignments, companion methods, imports) out of the raw
//! tree without losing the byte spans needed to rewrite them.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use tree_sitter::{Node, Parser, Tree};

use super::{CodemodError, CodemodResult};

/// Immutable parse of one Python source file.
#[derive(Clone)]
pub struct ParsedModule {
    source: String,
    tree: Tree,
}

impl ParsedModule {
    /// Parse `source`. Any syntax error makes the whole file unusable.
    pub fn parse(source: impl Into<String>) -> CodemodResult<Self> {
        let source = source.into();
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into())?;

        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| CodemodError::Parse("parser produced no tree".to_string()))?;

        if let Some(error) = first_error(tree.root_node()) {
            let position = error.start_position();
            return Err(CodemodError::Parse(format!(
                "syntax error at line {}, column {}",
                position.row + 1,
                position.column + 1
            )));
        }

        Ok(Self { source, tree })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text covered by `node`.
    pub fn text(&self, node: Node<'_>) -> &str {
        &self.source[node.byte_range()]
    }

    /// Line terminator the file is written with.
    pub fn newline(&self) -> &'static str {
        if self.source.contains("\r\n") { "\r\n" } else { "\n" }
    }

    pub fn into_source(self) -> String {
        self.source
    }
}

impl fmt::Debug for ParsedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedModule")
            .field("bytes", &self.source.len())
            .field("root", &self.tree.root_node().kind())
            .finish()
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if !node.has_error() {
        return None;
    }
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error).or(Some(node))
}

/// Named children of `node`, comments excluded.
pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// Every child stored under `field`.
pub fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

/// Pre-order walk over named nodes. Returning `false` skips the children.
pub fn walk<'t, F>(node: Node<'t>, visit: &mut F)
where
    F: FnMut(Node<'t>) -> bool,
{
    if !visit(node) {
        return;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    for child in children {
        walk(child, visit);
    }
}

/// The expression following `@` in a decorator.
pub fn decorator_expression(decorator: Node<'_>) -> Option<Node<'_>> {
    named_children(decorator).into_iter().next()
}

/// A string literal standing alone as a statement.
pub fn is_docstring(statement: Node<'_>) -> bool {
    if statement.kind() != "expression_statement" {
        return false;
    }
    let children = named_children(statement);
    children.len() == 1 && matches!(children[0].kind(), "string" | "concatenated_string")
}

/// Leftmost identifier of a dotted expression (`attr` in `attr.validators.x`).
pub fn root_identifier(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "identifier" => Some(node),
        "attribute" => node.child_by_field_name("object").and_then(root_identifier),
        _ => None,
    }
}

/// Left-hand side of a field assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldTarget {
    Name(String),
    /// Attribute, subscript, tuple or chained targets.
    Unsupported(String),
}

/// One `name [: annotation] [= value]` statement in a class body.
#[derive(Debug, Clone, Copy)]
pub struct FieldDeclaration<'t> {
    pub statement: Node<'t>,
    pub target: Node<'t>,
    pub chained: bool,
    pub annotation: Option<Node<'t>>,
    pub value: Option<Node<'t>>,
}

impl<'t> FieldDeclaration<'t> {
    /// Lift an `expression_statement` holding a single assignment.
    pub fn from_statement(statement: Node<'t>) -> Option<Self> {
        if statement.kind() != "expression_statement" {
            return None;
        }
        let children = named_children(statement);
        if children.len() != 1 || children[0].kind() != "assignment" {
            return None;
        }
        let assignment = children[0];
        let target = assignment.child_by_field_name("left")?;
        let annotation = assignment.child_by_field_name("type");

        let mut chained = false;
        let mut value = assignment.child_by_field_name("right");
        while let Some(inner) = value.filter(|node| node.kind() == "assignment") {
            chained = true;
            value = inner.child_by_field_name("right");
        }

        Some(Self {
            statement,
            target,
            chained,
            annotation,
            value,
        })
    }

    pub fn target(&self, module: &ParsedModule) -> FieldTarget {
        let text = module.text(self.target).to_string();
        if !self.chained && self.target.kind() == "identifier" {
            FieldTarget::Name(text)
        } else {
            FieldTarget::Unsupported(text)
        }
    }
}

/// A method decorated with `@<field>.validator` or `@<field>.default`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionMethod {
    /// The field the hook is attached to.
    pub receiver: String,
}

/// Structural view of one class definition.
#[derive(Debug, Clone)]
pub struct ClassDeclaration<'t> {
    pub name: String,
    pub node: Node<'t>,
    pub decorators: Vec<Node<'t>>,
    pub body: Node<'t>,
    pub fields: Vec<FieldDeclaration<'t>>,
    pub companions: Vec<CompanionMethod>,
}

impl<'t> ClassDeclaration<'t> {
    pub fn from_node(node: Node<'t>, module: &'t ParsedModule) -> CodemodResult<Self> {
        if node.kind() != "class_definition" {
            return Err(CodemodError::MalformedTree(format!(
                "expected class_definition, found {}",
                node.kind()
            )));
        }
        let name = node
            .child_by_field_name("name")
            .map(|name| module.text(name).to_string())
            .ok_or_else(|| CodemodError::MalformedTree("class without a name".to_string()))?;
        let body = node.child_by_field_name("body").ok_or_else(|| {
            CodemodError::MalformedTree(format!("class `{}` without a body", name))
        })?;

        let decorators = match node.parent() {
            Some(parent) if parent.kind() == "decorated_definition" => named_children(parent)
                .into_iter()
                .filter(|child| child.kind() == "decorator")
                .collect(),
            _ => Vec::new(),
        };

        let mut fields = Vec::new();
        let mut companions = Vec::new();
        for statement in named_children(body) {
            match statement.kind() {
                "expression_statement" => fields.extend(FieldDeclaration::from_statement(statement)),
                "decorated_definition" => companions.extend(companion_methods(statement, module)),
                _ => {}
            }
        }

        Ok(Self {
            name,
            node,
            decorators,
            body,
            fields,
            companions,
        })
    }

    /// 1-based line of the `class` keyword (or first decorator).
    pub fn line(&self) -> usize {
        self.decorators
            .first()
            .copied()
            .unwrap_or(self.node)
            .start_position()
            .row
            + 1
    }
}

fn companion_methods(definition: Node<'_>, module: &ParsedModule) -> Vec<CompanionMethod> {
    let is_method = definition
        .child_by_field_name("definition")
        .is_some_and(|inner| inner.kind() == "function_definition");
    if !is_method {
        return Vec::new();
    }

    named_children(definition)
        .into_iter()
        .filter(|child| child.kind() == "decorator")
        .filter_map(|decorator| {
            let expression = decorator_expression(decorator)?;
            if expression.kind() != "attribute" {
                return None;
            }
            let object = expression.child_by_field_name("object")?;
            if object.kind() != "identifier" {
                return None;
            }
            let hook = module.text(expression.child_by_field_name("attribute")?);
            if !matches!(hook, "validator" | "default") {
                return None;
            }
            Some(CompanionMethod {
                receiver: module.text(object).to_string(),
            })
        })
        .collect()
}

/// One name bound by an import statement.
#[derive(Debug, Clone)]
pub struct ImportedName<'t> {
    /// `dotted_name` or `aliased_import` node.
    pub node: Node<'t>,
    /// Local name the import binds.
    pub binding: String,
    /// Fully-qualified name the binding refers to.
    pub qualified: String,
}

#[derive(Debug, Clone)]
pub struct ImportStatement<'t> {
    pub node: Node<'t>,
    /// Source module of a `from` import, `None` for plain `import`.
    pub module: Option<String>,
    pub names: Vec<ImportedName<'t>>,
    pub wildcard: bool,
    /// Direct child of the module, as opposed to nested in `if`/`try`.
    pub top_level: bool,
}

impl<'t> ImportStatement<'t> {
    fn from_node(node: Node<'t>, module: &'t ParsedModule) -> Option<Self> {
        let source_module = match node.kind() {
            "import_statement" => None,
            "import_from_statement" => {
                Some(compact(module.text(node.child_by_field_name("module_name")?)))
            }
            "future_import_statement" => Some("__future__".to_string()),
            _ => return None,
        };

        let names = field_children(node, "name")
            .into_iter()
            .map(|name| imported_name(name, source_module.as_deref(), module))
            .collect();
        let wildcard = named_children(node)
            .iter()
            .any(|child| child.kind() == "wildcard_import");
        let top_level = node.parent().is_some_and(|parent| parent.kind() == "module");

        Some(Self {
            node,
            module: source_module,
            names,
            wildcard,
            top_level,
        })
    }
}

fn imported_name<'t>(
    node: Node<'t>,
    from_module: Option<&str>,
    module: &'t ParsedModule,
) -> ImportedName<'t> {
    let (path, alias) = if node.kind() == "aliased_import" {
        let path = node
            .child_by_field_name("name")
            .map(|name| compact(module.text(name)))
            .unwrap_or_default();
        let alias = node
            .child_by_field_name("alias")
            .map(|alias| module.text(alias).to_string());
        (path, alias)
    } else {
        (compact(module.text(node)), None)
    };

    let (binding, qualified) = match (from_module, alias) {
        (Some(from), Some(alias)) => (alias, format!("{}.{}", from, path)),
        (Some(from), None) => (path.clone(), format!("{}.{}", from, path)),
        (None, Some(alias)) => (alias, path),
        (None, None) => {
            let head = path.split('.').next().unwrap_or_default().to_string();
            (head.clone(), head)
        }
    };

    ImportedName {
        node,
        binding,
        qualified,
    }
}

fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Module-level imports in source order, including those nested in
/// module-level `if`/`try` blocks but not inside functions or classes.
pub fn collect_imports(module: &ParsedModule) -> Vec<ImportStatement<'_>> {
    let mut statements = Vec::new();
    walk(module.root(), &mut |node| match node.kind() {
        "import_statement" | "import_from_statement" | "future_import_statement" => {
            statements.extend(ImportStatement::from_node(node, module));
            false
        }
        "function_definition" | "class_definition" | "decorated_definition" | "lambda" => false,
        _ => true,
    });
    statements
}

/// Count identifier references by name, ignoring import statements,
/// attribute names after a dot, keyword-argument names and anything inside
/// one of the `skip` spans.
pub fn name_references(module: &ParsedModule, skip: &[Range<usize>]) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    walk(module.root(), &mut |node| {
        let range = node.byte_range();
        if skip
            .iter()
            .any(|span| span.start <= range.start && range.end <= span.end)
        {
            return false;
        }
        match node.kind() {
            "import_statement" | "import_from_statement" | "future_import_statement" => false,
            "identifier" => {
                if is_reference(node) {
                    *counts.entry(module.text(node).to_string()).or_default() += 1;
                }
                false
            }
            _ => true,
        }
    });
    counts
}

fn is_reference(identifier: Node<'_>) -> bool {
    let Some(parent) = identifier.parent() else {
        return true;
    };
    let field = match parent.kind() {
        "attribute" => "attribute",
        "keyword_argument" | "function_definition" | "class_definition" => "name",
        _ => return true,
    };
    parent.child_by_field_name(field) != Some(identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_in(module: &ParsedModule) -> Node<'_> {
        let mut found = None;
        walk(module.root(), &mut |node| {
            if found.is_none() && node.kind() == "class_definition" {
                found = Some(node);
            }
            found.is_none()
        });
        found.expect("test source contains a class")
    }

    #[test]
    fn test_parse_rejects_syntax_errors() {
        let result = ParsedModule::parse("class Broken(:\n    pass\n");
        assert!(matches!(result, Err(CodemodError::Parse(_))));
    }

    #[test]
    fn test_class_declaration_collects_fields_and_companions() {
        let module = ParsedModule::parse(
            r#"
@attr.s
class Point:
    x = attr.ib(type=int)
    y: int = attr.ib()
    LIMIT = 10

    @x.validator
    def _check_x(self, attribute, value):
        pass

    @y.default
    def _y_default(self):
        return 0

    @property
    def norm(self):
        return 0
"#,
        )
        .unwrap();

        let class = ClassDeclaration::from_node(class_in(&module), &module).unwrap();
        assert_eq!(class.name, "Point");
        assert_eq!(class.decorators.len(), 1);
        assert_eq!(class.fields.len(), 3);
        assert_eq!(class.fields[0].target(&module), FieldTarget::Name("x".to_string()));
        assert!(class.fields[1].annotation.is_some());
        assert_eq!(
            class.companions,
            vec![
                CompanionMethod {
                    receiver: "x".to_string()
                },
                CompanionMethod {
                    receiver: "y".to_string()
                },
            ]
        );
        assert_eq!(class.line(), 2);
    }

    #[test]
    fn test_unsupported_targets() {
        let module = ParsedModule::parse(
            "class C:\n    self.x = attr.ib(type=int)\n    a = b = attr.ib(type=int)\n",
        )
        .unwrap();
        let class = ClassDeclaration::from_node(class_in(&module), &module).unwrap();

        assert_eq!(
            class.fields[0].target(&module),
            FieldTarget::Unsupported("self.x".to_string())
        );
        assert_eq!(
            class.fields[1].target(&module),
            FieldTarget::Unsupported("a".to_string())
        );
        let value = class.fields[1].value.unwrap();
        assert_eq!(value.kind(), "call");
    }

    #[test]
    fn test_collect_imports_bindings() {
        let module = ParsedModule::parse(
            "import attr\nimport attr.validators as v\nfrom attr import attrs as A, attrib\ntry:\n    import attrs\nexcept ImportError:\n    pass\ndef f():\n    import os\n",
        )
        .unwrap();

        let imports = collect_imports(&module);
        let bindings: Vec<(String, String, bool)> = imports
            .iter()
            .flat_map(|statement| {
                statement
                    .names
                    .iter()
                    .map(move |name| (name.binding.clone(), name.qualified.clone(), statement.top_level))
            })
            .collect();

        assert_eq!(
            bindings,
            vec![
                ("attr".to_string(), "attr".to_string(), true),
                ("v".to_string(), "attr.validators".to_string(), true),
                ("A".to_string(), "attr.attrs".to_string(), true),
                ("attrib".to_string(), "attr.attrib".to_string(), true),
                ("attrs".to_string(), "attrs".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_name_references_skip_attribute_names_and_imports() {
        let module = ParsedModule::parse(
            "import attr\nx = attr.ib()\ny = self.attr\nf(attr=1)\n",
        )
        .unwrap();
        let counts = name_references(&module, &[]);
        assert_eq!(counts.get("attr"), Some(&1));

        let skip = vec![12..25];
        let counts = name_references(&module, &skip);
        assert_eq!(counts.get("attr"), None);
    }

    #[test]
    fn test_newline_style() {
        assert_eq!(ParsedModule::parse("import os\n").unwrap().newline(), "\n");
        assert_eq!(ParsedModule::parse("import os\r\nx = 1\r\n").unwrap().newline(), "\r\n");
    }

    #[test]
    fn test_docstring_detection() {
        let module = ParsedModule::parse("\"\"\"Module docs.\"\"\"\nimport os\n").unwrap();
        let statements = named_children(module.root());
        assert!(is_docstring(statements[0]));
        assert!(!is_docstring(statements[1]));
    }
}
