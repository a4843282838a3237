//! Queries and edits on `from <module> import <names>` statements.

use migrator_syntax::python::{node_text, walk};
use migrator_syntax::{EditSpan, LineIndex};
use tree_sitter::Node;

/// One `from ... import ...` statement.
#[derive(Debug, Clone)]
pub(super) struct ImportFrom<'t> {
    statement: Node<'t>,
    module: Node<'t>,
    names: Vec<Node<'t>>,
}

impl<'t> ImportFrom<'t> {
    /// Collects every `from ... import ...` statement below `root`.
    pub(super) fn all(root: Node<'t>) -> Vec<Self> {
        let mut statements = Vec::new();
        walk(root, &mut |node| {
            if node.kind() != "import_from_statement" {
                return;
            }
            let Some(module) = node.child_by_field_name("module_name") else {
                return;
            };
            let mut cursor = node.walk();
            let names = node.children_by_field_name("name", &mut cursor).collect();
            statements.push(Self {
                statement: node,
                module,
                names,
            });
        });
        statements
    }

    /// The imported-from module as written.
    pub(super) fn module<'s>(&self, source: &'s str) -> &'s str {
        node_text(self.module, source)
    }

    /// Whether `name` is imported without an alias.
    pub(super) fn imports(&self, name: &str, source: &str) -> bool {
        self.names
            .iter()
            .any(|node| node.kind() == "dotted_name" && node_text(*node, source) == name)
    }

    /// Builds the edit dropping every unaliased name listed in `names`.
    ///
    /// A statement left with nothing to import is removed together with its
    /// line; otherwise the surviving names are rejoined with the separator
    /// the statement already uses.
    pub(super) fn without(&self, names: &[&str], source: &str) -> Option<EditSpan> {
        let (removed, kept): (Vec<Node<'t>>, Vec<Node<'t>>) =
            self.names.iter().copied().partition(|node| {
                node.kind() == "dotted_name" && names.contains(&node_text(*node, source))
            });
        if removed.is_empty() {
            return None;
        }
        let index = LineIndex::new(source);
        if kept.is_empty() {
            let start = self.statement.start_byte() - self.statement.start_position().column;
            let end = source
                .get(self.statement.end_byte()..)
                .and_then(|rest| rest.find('\n'))
                .map_or(source.len(), |newline| self.statement.end_byte() + newline + 1);
            let range = index.range(start..end);
            return Some(EditSpan::delete(range.start, range.end));
        }

        let (first, last) = (self.names.first()?, self.names.last()?);
        let separator = match self.names.get(1) {
            Some(second) => source.get(first.end_byte()..second.start_byte())?,
            None => ", ",
        };
        let joined = kept
            .iter()
            .map(|node| node_text(*node, source))
            .collect::<Vec<_>>()
            .join(separator);
        let range = index.range(first.start_byte()..last.end_byte());
        Some(EditSpan::replace(range.start, range.end, joined))
    }
}
