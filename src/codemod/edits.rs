//! Byte-span replacements and their application to source text.

use std::ops::Range;

use tree_sitter::Node;

use super::syntax::ParsedModule;
use super::{CodemodError, CodemodResult};

/// A replacement of one byte range of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub range: Range<usize>,
    pub line: usize,
    pub original: String,
    pub replacement: String,
    pub reason: String,
}

impl Replacement {
    pub fn new(
        source: &str,
        range: Range<usize>,
        replacement: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            line: line_of(source, range.start),
            original: source[range.clone()].to_string(),
            range,
            replacement: replacement.into(),
            reason: reason.into(),
        }
    }

    /// Replace exactly the text covered by `node`.
    pub fn for_node(
        node: Node<'_>,
        module: &ParsedModule,
        replacement: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(module.source(), node.byte_range(), replacement, reason)
    }

    pub fn insert(source: &str, at: usize, text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(source, at..at, text, reason)
    }

    /// Remove a whole statement. When it is alone on its line, the line goes
    /// with it, trailing comment and newline included; otherwise the adjacent
    /// `;` separator is removed instead.
    pub fn remove_statement(node: Node<'_>, module: &ParsedModule, reason: impl Into<String>) -> Self {
        let source = module.source();
        let range = statement_removal_range(source, node.byte_range());
        Self::new(source, range, "", reason)
    }
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

/// Offset of the first byte of the line containing `offset`.
pub fn line_start(source: &str, offset: usize) -> usize {
    source[..offset].rfind('\n').map_or(0, |index| index + 1)
}

/// Offset just past the newline ending the line containing `offset`.
pub fn next_line_start(source: &str, offset: usize) -> usize {
    source[offset..]
        .find('\n')
        .map_or(source.len(), |index| offset + index + 1)
}

fn statement_removal_range(source: &str, statement: Range<usize>) -> Range<usize> {
    let begin = line_start(source, statement.start);
    let line_stop = source[statement.end..]
        .find('\n')
        .map_or(source.len(), |index| statement.end + index);
    let before = &source[begin..statement.start];
    let after = source[statement.end..line_stop].trim_start();

    if before.trim().is_empty() && (after.is_empty() || after.starts_with('#')) {
        return begin..next_line_start(source, statement.end);
    }
    if let Some(rest) = after.strip_prefix(';') {
        let end = line_stop - rest.trim_start().len();
        return statement.start..end;
    }
    match before.rfind(';') {
        Some(index) => (begin + index)..statement.end,
        None => statement,
    }
}

/// Apply `replacements` to `source`. Ranges may touch but never overlap.
pub fn apply_replacements(source: &str, mut replacements: Vec<Replacement>) -> CodemodResult<String> {
    replacements.sort_by_key(|replacement| (replacement.range.start, replacement.range.end));

    let mut output = String::with_capacity(source.len());
    let mut cursor = 0;
    let mut previous: Option<Range<usize>> = None;

    for replacement in &replacements {
        if replacement.range.start < cursor {
            return Err(CodemodError::OverlappingEdits {
                first: previous.unwrap_or(0..cursor),
                second: replacement.range.clone(),
            });
        }
        output.push_str(&source[cursor..replacement.range.start]);
        output.push_str(&replacement.replacement);
        cursor = replacement.range.end;
        previous = Some(replacement.range.clone());
    }
    output.push_str(&source[cursor..]);

    Ok(output)
}
