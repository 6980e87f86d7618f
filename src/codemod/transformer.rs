//! Tree walker driving one file's transformation.

use tracing::{debug, instrument, warn};
use tree_sitter::Node;

use super::classifier::{ClassVerdict, Safety, classify};
use super::decorators::{MarkerResolution, resolve_marker};
use super::edits::{Replacement, apply_replacements};
use super::fields::{FieldArgs, LegacyBuilderCall, render_field, with_interior_comments};
use super::imports::{ImportTable, TargetNames, TargetSymbol, reconcile};
use super::resolver::{ImportResolver, SymbolResolver};
use super::syntax::{ClassDeclaration, FieldTarget, ParsedModule, named_children};
use super::{CodemodResult, Diagnostic, DiagnosticKind};

/// Result of transforming one module.
#[derive(Debug, Clone)]
pub struct TransformOutcome {
    /// The rewritten module, or a copy of the input when nothing changed.
    pub module: ParsedModule,
    pub changed: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl TransformOutcome {
    pub fn source(&self) -> &str {
        self.module.source()
    }
}

/// Parse and transform `source` with a resolver built from its own imports.
pub fn transform_source(source: &str) -> CodemodResult<TransformOutcome> {
    let module = ParsedModule::parse(source)?;
    transform_module(&module)
}

pub fn transform_module(module: &ParsedModule) -> CodemodResult<TransformOutcome> {
    let resolver = ImportResolver::from_module(module);
    transform_with_resolver(module, &resolver)
}

#[instrument(skip_all, fields(bytes = module.source().len()))]
pub fn transform_with_resolver(
    module: &ParsedModule,
    resolver: &dyn SymbolResolver,
) -> CodemodResult<TransformOutcome> {
    let mut rewriter = ClassRewriter::new(module, resolver);
    rewriter.visit(module.root())?;

    let ClassRewriter {
        edits,
        imports,
        diagnostics,
        rewritten_classes,
        ..
    } = rewriter;

    if rewritten_classes == 0 {
        return Ok(TransformOutcome {
            module: module.clone(),
            changed: false,
            diagnostics,
        });
    }

    let emitted = ParsedModule::parse(apply_replacements(module.source(), edits)?)?;
    let reconciled = reconcile(module, &emitted, &imports)?;
    let changed = reconciled.source() != module.source();
    debug!(classes = rewritten_classes, changed, "module transformed");

    Ok(TransformOutcome {
        module: reconciled,
        changed,
        diagnostics,
    })
}

/// Per-class state, fixed on class entry and read-only for the body.
#[derive(Debug, Clone)]
struct ClassContext {
    name: String,
    verdict: Option<ClassVerdict>,
}

struct ClassRewriter<'a> {
    module: &'a ParsedModule,
    resolver: &'a dyn SymbolResolver,
    contexts: Vec<ClassContext>,
    edits: Vec<Replacement>,
    imports: ImportTable,
    diagnostics: Vec<Diagnostic>,
    rewritten_classes: usize,
}

impl<'a> ClassRewriter<'a> {
    fn new(module: &'a ParsedModule, resolver: &'a dyn SymbolResolver) -> Self {
        Self {
            module,
            resolver,
            contexts: Vec::new(),
            edits: Vec::new(),
            imports: ImportTable::new(TargetNames::for_module(module)),
            diagnostics: Vec::new(),
            rewritten_classes: 0,
        }
    }

    fn visit(&mut self, node: Node<'a>) -> CodemodResult<()> {
        if node.kind() == "class_definition" {
            return self.visit_class(node);
        }
        for child in named_children(node) {
            self.visit(child)?;
        }
        Ok(())
    }

    fn visit_class(&mut self, node: Node<'a>) -> CodemodResult<()> {
        let class = ClassDeclaration::from_node(node, self.module)?;
        let name = self.qualified_name(&class.name);

        let mut markers = Vec::new();
        let mut ambiguous = false;
        for decorator in &class.decorators {
            match resolve_marker(*decorator, self.module, self.resolver) {
                MarkerResolution::Marker(marker) => markers.push(marker),
                MarkerResolution::Ambiguous => ambiguous = true,
                MarkerResolution::NotMarker => {}
            }
        }

        if markers.is_empty() {
            if ambiguous {
                self.report(
                    &name,
                    class.line(),
                    DiagnosticKind::AmbiguousDecorator,
                    "decorator may or may not be the legacy class marker; class left unchanged".to_string(),
                );
                return Ok(());
            }
            return self.visit_body(&class, ClassContext { name, verdict: None });
        }

        let verdict = classify(&class, self.module, self.resolver);
        if let Safety::Unsafe { untyped_fields } = &verdict.safety {
            self.report(
                &name,
                class.line(),
                DiagnosticKind::UnsafeClass,
                format!(
                    "legacy fields without a type: {}; class left unchanged",
                    untyped_fields.join(", ")
                ),
            );
            return Ok(());
        }

        for marker in &markers {
            self.edits.push(marker.rewrite(self.module, self.imports.names()));
            self.imports.require(TargetSymbol::Define, marker.decorator.start_byte());
        }
        self.rewritten_classes += 1;
        debug!(class = %name, "rewriting class");

        let context = ClassContext {
            name,
            verdict: Some(verdict),
        };
        self.rewrite_fields(&class, &context);
        self.visit_body(&class, context)
    }

    fn visit_body(&mut self, class: &ClassDeclaration<'a>, context: ClassContext) -> CodemodResult<()> {
        self.contexts.push(context);
        let result = named_children(class.body)
            .into_iter()
            .try_for_each(|statement| self.visit(statement));
        self.contexts.pop();
        result
    }

    fn rewrite_fields(&mut self, class: &ClassDeclaration<'a>, context: &ClassContext) {
        let module = self.module;
        for field in &class.fields {
            let Some(call) = field
                .value
                .and_then(|value| LegacyBuilderCall::recognize(value, module, self.resolver))
            else {
                continue;
            };

            let name = match field.target(module) {
                FieldTarget::Name(name) => name,
                FieldTarget::Unsupported(target) => {
                    self.report(
                        &context.name,
                        field.statement.start_position().row + 1,
                        DiagnosticKind::UnsupportedTarget,
                        format!("field target `{}` is not a plain name; field left unchanged", target),
                    );
                    continue;
                }
            };

            let forced = context
                .verdict
                .as_ref()
                .is_some_and(|verdict| verdict.is_forced(&name));
            let args = FieldArgs::decompose(&call, module, self.resolver);
            let annotation = args
                .type_expr
                .or(field.annotation)
                .map(|annotation| module.text(annotation));
            let rewrite = render_field(
                &name,
                annotation,
                &args.synthesize(forced),
                module,
                self.imports.names(),
            );

            debug!(class = %context.name, field = %name, replacement = %rewrite.text, "rewriting field");
            for symbol in &rewrite.symbols {
                self.imports.require(*symbol, field.statement.start_byte());
            }
            self.edits.push(Replacement::for_node(
                field.statement,
                module,
                with_interior_comments(rewrite.text, &call, field.statement, module),
                "legacy field builder replaced",
            ));
        }
    }

    fn qualified_name(&self, name: &str) -> String {
        match self.contexts.last() {
            Some(outer) => format!("{}.{}", outer.name, name),
            None => name.to_string(),
        }
    }

    fn report(&mut self, class_name: &str, line: usize, kind: DiagnosticKind, message: String) {
        warn!(class = %class_name, line, kind = %kind, "{}", message);
        self.diagnostics.push(Diagnostic {
            class_name: class_name.to_string(),
            line,
            kind,
            message,
        });
    }
}
