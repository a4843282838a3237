//! Python syntax helpers shared by the structural rewriters.
//!
//! These functions answer the handful of questions rewriters ask of a
//! Tree-sitter Python tree: which calls target a given name, how were their
//! arguments passed, and what value does a string literal denote.

use tree_sitter::Node;

/// Returns the source text covered by `node`.
#[must_use]
pub fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or_default()
}

/// Visits `node` and all of its descendants in document order.
pub fn walk<'t>(node: Node<'t>, visit: &mut impl FnMut(Node<'t>)) {
    let mut cursor = node.walk();
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() || cursor.node() == node {
                return;
            }
        }
    }
}

/// One argument of a call site.
#[derive(Debug, Clone, Copy)]
pub enum Argument<'t> {
    /// An argument passed by position.
    Positional(Node<'t>),
    /// A `name=value` argument.
    Keyword {
        /// The whole `keyword_argument` node.
        node: Node<'t>,
        /// The keyword identifier.
        name: Node<'t>,
        /// The argument value.
        value: Node<'t>,
    },
    /// A `*args` or `**kwargs` expansion.
    Splat(Node<'t>),
}

impl<'t> Argument<'t> {
    /// Returns the node covering the whole argument.
    #[must_use]
    pub const fn node(&self) -> Node<'t> {
        match self {
            Self::Positional(node) | Self::Splat(node) | Self::Keyword { node, .. } => *node,
        }
    }

    /// Returns the keyword name when the argument was passed by keyword.
    #[must_use]
    pub fn keyword<'s>(&self, source: &'s str) -> Option<&'s str> {
        match self {
            Self::Keyword { name, .. } => Some(node_text(*name, source)),
            Self::Positional(_) | Self::Splat(_) => None,
        }
    }
}

/// A call expression together with its classified arguments.
#[derive(Debug, Clone)]
pub struct CallSite<'t> {
    node: Node<'t>,
    function: Node<'t>,
    argument_list: Node<'t>,
    arguments: Vec<Argument<'t>>,
}

impl<'t> CallSite<'t> {
    /// Classifies the arguments of a `call` node.
    ///
    /// Returns `None` for nodes that are not calls or whose argument is a
    /// bare generator expression.
    #[must_use]
    pub fn from_node(node: Node<'t>) -> Option<Self> {
        if node.kind() != "call" {
            return None;
        }
        let function = node.child_by_field_name("function")?;
        let argument_list = node.child_by_field_name("arguments")?;
        if argument_list.kind() != "argument_list" {
            return None;
        }

        let mut cursor = argument_list.walk();
        let arguments = argument_list
            .named_children(&mut cursor)
            .filter(|child| child.kind() != "comment")
            .map(classify_argument)
            .collect();

        Some(Self {
            node,
            function,
            argument_list,
            arguments,
        })
    }

    /// The whole call expression.
    #[must_use]
    pub const fn node(&self) -> Node<'t> {
        self.node
    }

    /// The callee expression.
    #[must_use]
    pub const fn function(&self) -> Node<'t> {
        self.function
    }

    /// The parenthesised argument list.
    #[must_use]
    pub const fn argument_list(&self) -> Node<'t> {
        self.argument_list
    }

    /// All arguments in source order.
    #[must_use]
    pub fn arguments(&self) -> &[Argument<'t>] {
        &self.arguments
    }

    /// Returns the `index`-th positional argument.
    #[must_use]
    pub fn positional(&self, index: usize) -> Option<Node<'t>> {
        self.arguments
            .iter()
            .filter_map(|argument| match argument {
                Argument::Positional(node) => Some(*node),
                Argument::Keyword { .. } | Argument::Splat(_) => None,
            })
            .nth(index)
    }

    /// Number of positional arguments.
    #[must_use]
    pub fn positional_count(&self) -> usize {
        self.arguments
            .iter()
            .filter(|argument| matches!(argument, Argument::Positional(_)))
            .count()
    }

    /// Returns the keyword argument named `name`.
    #[must_use]
    pub fn keyword(&self, name: &str, source: &str) -> Option<Argument<'t>> {
        self.arguments
            .iter()
            .find(|argument| argument.keyword(source) == Some(name))
            .copied()
    }

    /// Returns whether any argument is a `*` or `**` expansion.
    #[must_use]
    pub fn has_splat(&self) -> bool {
        self.arguments
            .iter()
            .any(|argument| matches!(argument, Argument::Splat(_)))
    }
}

fn classify_argument(node: Node<'_>) -> Argument<'_> {
    match node.kind() {
        "keyword_argument" => match (
            node.child_by_field_name("name"),
            node.child_by_field_name("value"),
        ) {
            (Some(name), Some(value)) => Argument::Keyword { node, name, value },
            _ => Argument::Splat(node),
        },
        "list_splat" | "dictionary_splat" => Argument::Splat(node),
        _ => Argument::Positional(node),
    }
}

/// Returns the final name segment of a callee.
///
/// `ustr` yields `ustr`, `tools.misc.ustr` yields `ustr`, and any other
/// expression (subscripts, calls) yields `None`.
#[must_use]
pub fn callee_name<'s>(function: Node<'_>, source: &'s str) -> Option<&'s str> {
    match function.kind() {
        "identifier" => Some(node_text(function, source)),
        "attribute" => function
            .child_by_field_name("attribute")
            .map(|attribute| node_text(attribute, source)),
        _ => None,
    }
}

/// Collects every call whose callee name satisfies `predicate`.
#[must_use]
pub fn find_calls<'t>(
    root: Node<'t>,
    source: &str,
    mut predicate: impl FnMut(&str) -> bool,
) -> Vec<CallSite<'t>> {
    let mut calls = Vec::new();
    walk(root, &mut |node| {
        let Some(call) = CallSite::from_node(node) else {
            return;
        };
        if callee_name(call.function(), source).is_some_and(&mut predicate) {
            calls.push(call);
        }
    });
    calls
}

/// Evaluates a string or implicitly concatenated string node.
///
/// Returns `None` for f-strings, byte strings and non-string nodes.
#[must_use]
pub fn string_node_value(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "string" => string_value(node_text(node, source)),
        "concatenated_string" => {
            let mut cursor = node.walk();
            let mut value = String::new();
            for part in node.named_children(&mut cursor) {
                if part.kind() == "comment" {
                    continue;
                }
                value.push_str(&string_node_value(part, source)?);
            }
            Some(value)
        }
        _ => None,
    }
}

/// Evaluates the elements of a list or tuple made only of string literals.
#[must_use]
pub fn string_sequence(node: Node<'_>, source: &str) -> Option<Vec<String>> {
    if !matches!(node.kind(), "list" | "tuple") {
        return None;
    }
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .map(|child| string_node_value(child, source))
        .collect()
}

/// Evaluates a single Python string literal.
///
/// Supports `r`/`u` prefixes, single, double and triple quotes, and the
/// common backslash escapes. Unknown escapes are kept verbatim, matching
/// Python's behaviour.
#[must_use]
pub fn string_value(literal: &str) -> Option<String> {
    let prefix_len = literal
        .find(['\'', '"'])
        .filter(|&idx| idx <= 2)?;
    let (raw_prefix, quoted) = literal.split_at(prefix_len);
    let prefix = raw_prefix.to_ascii_lowercase();
    if prefix.contains('f') || prefix.contains('b') {
        return None;
    }
    let raw = prefix.contains('r');

    let delimiter = ["\"\"\"", "'''", "\"", "'"]
        .into_iter()
        .find(|candidate| quoted.starts_with(candidate))?;
    let body = quoted
        .strip_prefix(delimiter)?
        .strip_suffix(delimiter)?;

    if raw {
        return Some(body.to_owned());
    }
    Some(unescape(body))
}

fn unescape(body: &str) -> String {
    let mut value = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            value.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => value.push('\n'),
            Some('t') => value.push('\t'),
            Some('r') => value.push('\r'),
            Some('\\') => value.push('\\'),
            Some('\'') => value.push('\''),
            Some('"') => value.push('"'),
            Some('\n') => {}
            Some(other) => {
                value.push('\\');
                value.push(other);
            }
            None => value.push('\\'),
        }
    }
    value
}

/// Renders `value` the way Python's `repr()` renders a `str`.
///
/// Single quotes are preferred unless the value contains a single quote and
/// no double quote.
#[must_use]
pub fn python_repr(value: &str) -> String {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut rendered = String::with_capacity(value.len() + 2);
    rendered.push(quote);
    for ch in value.chars() {
        match ch {
            '\\' => rendered.push_str("\\\\"),
            '\n' => rendered.push_str("\\n"),
            '\t' => rendered.push_str("\\t"),
            '\r' => rendered.push_str("\\r"),
            c if c == quote => {
                rendered.push('\\');
                rendered.push(c);
            }
            c => rendered.push(c),
        }
    }
    rendered.push(quote);
    rendered
}

/// Renders `value` as a double-quoted literal with JSON escaping rules.
#[must_use]
pub fn double_quoted(value: &str) -> String {
    let mut rendered = String::with_capacity(value.len() + 2);
    rendered.push('"');
    for ch in value.chars() {
        match ch {
            '"' => rendered.push_str("\\\""),
            '\\' => rendered.push_str("\\\\"),
            '\n' => rendered.push_str("\\n"),
            '\t' => rendered.push_str("\\t"),
            '\r' => rendered.push_str("\\r"),
            c => rendered.push(c),
        }
    }
    rendered.push('"');
    rendered
}
