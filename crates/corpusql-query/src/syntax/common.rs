//! Shared parser primitives for the query language.

use chumsky::extra;
use chumsky::prelude::*;

/// Extra type for parsers - uses Rich errors for better messages
pub type Extra<'src> = extra::Err<Rich<'src, char>>;

// ============================================================================
// Primitive parsers
// ============================================================================

/// Parser for identifiers: a letter or underscore, then alphanumerics/underscores
pub fn ident<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    any()
        .filter(|c: &char| c.is_alphabetic() || *c == '_')
        .then(
            any()
                .filter(|c: &char| c.is_alphanumeric() || *c == '_')
                .repeated(),
        )
        .to_slice()
        .map(|s: &str| s.to_string())
        .labelled("identifier")
}

/// Backslash escape inside a quoted string
fn escape<'src>() -> impl Parser<'src, &'src str, char, Extra<'src>> + Clone {
    just('\\').ignore_then(any().map(|c: char| match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        other => other,
    }))
}

/// Parser for single-quoted string literals: 'value'
pub fn single_quoted_string<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    just('\'')
        .ignore_then(
            none_of("'\\")
                .or(escape())
                .repeated()
                .collect::<String>(),
        )
        .then_ignore(just('\''))
        .labelled("single-quoted string")
}

/// Parser for double-quoted string literals: "value"
pub fn double_quoted_string<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    just('"')
        .ignore_then(
            none_of("\"\\")
                .or(escape())
                .repeated()
                .collect::<String>(),
        )
        .then_ignore(just('"'))
        .labelled("double-quoted string")
}

/// Parser for string literals (single or double quoted)
pub fn string_literal<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    single_quoted_string()
        .or(double_quoted_string())
        .labelled("string literal")
}

/// Parser for numeric literals: optional sign, integer part, optional fraction
pub fn number<'src>() -> impl Parser<'src, &'src str, f64, Extra<'src>> + Clone {
    just('-')
        .or_not()
        .then(text::int(10))
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .try_map(|s: &str, span| {
            s.parse::<f64>()
                .map_err(|_| Rich::custom(span, format!("invalid number {}", s)))
        })
        .labelled("number")
}

/// Parser for regex literals: /pattern/
///
/// `\/` unescapes to `/`; every other escape is kept for the regex engine.
pub fn regex_literal<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    let escaped = just('\\').ignore_then(any()).map(|c: char| {
        if c == '/' {
            "/".to_string()
        } else {
            format!("\\{}", c)
        }
    });

    just('/')
        .ignore_then(
            none_of("/\\")
                .map(|c: char| c.to_string())
                .or(escaped)
                .repeated()
                .collect::<Vec<String>>(),
        )
        .then_ignore(just('/'))
        .map(|parts| parts.concat())
        .labelled("regular expression")
}

/// Keyword parser (whole identifier match)
pub fn kw<'src>(keyword: &'static str) -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    text::keyword::<&str, _, Extra<'src>>(keyword).ignored()
}

// ============================================================================
// Error formatting
// ============================================================================

/// Format chumsky errors as one "Line X, column Y" message per error
pub fn format_errors(errs: &[Rich<'_, char>], input: &str) -> String {
    errs.iter()
        .map(|e| {
            let span = e.span();
            let start = span.start;
            let line = input[..start].matches('\n').count() + 1;
            let col = start - input[..start].rfind('\n').map_or(0, |i| i + 1);
            format!("Line {}, column {}: {}", line, col + 1, e.reason())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
