//! Moves interpolation arguments into translation calls.
//!
//! `_("Hello %s") % name` becomes `_("Hello %s", name)`, dictionary
//! interpolation becomes keyword arguments and `.format()` calls on
//! translated strings become `%`-style placeholders.

use migrator_rules::ScopeSpec;
use regex::{Captures, Regex};

use super::{RewriteContext, Rewriter, compile};
use crate::error::EngineError;

/// The translation call rewriter.
#[derive(Debug, Default, Clone, Copy)]
pub struct TranslationFormat;

#[derive(Debug, Clone, Copy)]
enum Quote {
    Single,
    Double,
}

impl Quote {
    const fn char(self) -> char {
        match self {
            Self::Single => '\'',
            Self::Double => '"',
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Callback {
    Mapping(Quote),
    Parenthesised,
    Plain,
    Format(Quote),
}

const PATTERNS: [(&str, Callback); 6] = [
    (
        r#"_\(\s*"([^"]+)"\s*\)\s*%\s*\{([^}]+)\}"#,
        Callback::Mapping(Quote::Double),
    ),
    (
        r#"_\(\s*'([^']+)'\s*\)\s*%\s*\{([^}]+)\}"#,
        Callback::Mapping(Quote::Single),
    ),
    (
        r#"_\(\s*(["'].*?%[ds].*?["'])\s*\)\s*%\s*\(\s*(.+)\s*\)"#,
        Callback::Parenthesised,
    ),
    (
        r#"_\(\s*(["'].*?%[ds].*?["'])\s*\)\s*?%\s*?([^\s]+)"#,
        Callback::Plain,
    ),
    (
        r#"_\(\s*"([^"]*)"\s*\)\.format\(\s*(\s*[^)]+)\)"#,
        Callback::Format(Quote::Double),
    ),
    (
        r#"_\(\s*'([^']*)'\s*\)\.format\(\s*(\s*[^)]+)\)"#,
        Callback::Format(Quote::Single),
    ),
];

impl Rewriter for TranslationFormat {
    fn name(&self) -> &'static str {
        "translation_format"
    }

    fn scope(&self) -> ScopeSpec {
        ScopeSpec::since("13.0")
    }

    fn rewrite(&self, context: &mut RewriteContext<'_>) -> Result<(), EngineError> {
        let rules = PATTERNS
            .iter()
            .map(|(pattern, callback)| Ok((compile(pattern)?, *callback)))
            .collect::<Result<Vec<(Regex, Callback)>, EngineError>>()?;
        let positional = compile(r"\{\d*\}")?;
        let named = compile(r"\{(\w+)\}")?;

        context.regex_pass(self.name(), &[".py"], |text| {
            let mut current = text.to_owned();
            for (regex, callback) in &rules {
                current = regex
                    .replace_all(&current, |captures: &Captures<'_>| {
                        callback.apply(captures, &positional, &named)
                    })
                    .into_owned();
            }
            current
        })
    }
}

impl Callback {
    fn apply(self, captures: &Captures<'_>, positional: &Regex, named: &Regex) -> String {
        let first = captures.get(1).map_or("", |m| m.as_str());
        let second = captures.get(2).map_or("", |m| m.as_str());
        match self {
            Self::Mapping(quote) => {
                let entries = mapping_entries(second);
                let q = quote.char();
                format!("_({q}{first}{q}, {entries})")
            }
            Self::Parenthesised => {
                let arguments = second.strip_suffix(',').unwrap_or(second);
                format!("_({first}, {arguments})")
            }
            Self::Plain => format!("_({first}, {second})"),
            Self::Format(quote) => {
                let with_positional = positional.replace_all(first, "%s");
                let converted = named.replace_all(&with_positional, "%(${1})s");
                let joined = second.split_whitespace().collect::<Vec<_>>().join(" ");
                let arguments = joined.strip_suffix(',').unwrap_or(&joined);
                let q = quote.char();
                format!("_({q}{converted}{q}, {arguments})")
            }
        }
    }
}

/// Turns `'a': x, "b": y` into `a=x, b=y`, dropping entries without a key.
fn mapping_entries(dictionary: &str) -> String {
    dictionary
        .split(',')
        .filter_map(|entry| entry.split_once(':'))
        .map(|(key, value)| {
            let name = key.trim().trim_matches('\'').trim_matches('"');
            format!("{name}={}", value.trim())
        })
        .collect::<Vec<_>>()
        .join(", ")
}
