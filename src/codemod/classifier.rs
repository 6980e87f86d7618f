//! Class safety classifier.
//!
//! A class may only be rewritten when every legacy field declares its type,
//! either through `type=` or an annotation of its own; otherwise dropping the
//! builder call would lose the field altogether. The classifier also records
//! the forced-builder set: fields a `@<name>.validator` / `@<name>.default`
//! method binds to, which must stay `field(...)` calls.

use std::collections::BTreeSet;

use super::fields::LegacyBuilderCall;
use super::resolver::SymbolResolver;
use super::syntax::{ClassDeclaration, FieldDeclaration, ParsedModule};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Safety {
    Safe,
    Unsafe { untyped_fields: Vec<String> },
}

/// Per-class decision, computed once on class entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassVerdict {
    pub safety: Safety,
    pub forced_builders: BTreeSet<String>,
}

impl ClassVerdict {
    pub fn is_safe(&self) -> bool {
        self.safety == Safety::Safe
    }

    pub fn is_forced(&self, field: &str) -> bool {
        self.forced_builders.contains(field)
    }
}

pub fn classify(
    class: &ClassDeclaration<'_>,
    module: &ParsedModule,
    resolver: &dyn SymbolResolver,
) -> ClassVerdict {
    let forced_builders = class
        .companions
        .iter()
        .map(|companion| companion.receiver.clone())
        .collect();

    let untyped_fields: Vec<String> = class
        .fields
        .iter()
        .filter(|field| is_untyped_legacy(field, module, resolver))
        .map(|field| module.text(field.target).to_string())
        .collect();

    let safety = if untyped_fields.is_empty() {
        Safety::Safe
    } else {
        Safety::Unsafe { untyped_fields }
    };

    ClassVerdict {
        safety,
        forced_builders,
    }
}

/// A legacy builder call with no `type=` on a field with no annotation.
pub fn is_untyped_legacy(
    field: &FieldDeclaration<'_>,
    module: &ParsedModule,
    resolver: &dyn SymbolResolver,
) -> bool {
    if field.annotation.is_some() {
        return false;
    }
    field
        .value
        .and_then(|value| LegacyBuilderCall::recognize(value, module, resolver))
        .is_some_and(|call| !call.has_type())
}
