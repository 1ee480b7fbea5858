//! SQL literal quoting.
//!
//! Translators inline the literals of an expression as quoted SQL strings.
//! Backslashes and single quotes are escaped for MySQL string syntax.

use crate::expr::Literal;

/// Quote a string as a MySQL string literal
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Render a number without a trailing `.0` for integral values
pub fn number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Render a literal as SQL. `Null` renders as `NULL`.
pub fn render(literal: &Literal) -> String {
    match literal {
        Literal::String(s) => quote(s),
        Literal::Number(n) => number(*n),
        Literal::Bool(true) => "1".to_string(),
        Literal::Bool(false) => "0".to_string(),
        Literal::Null => "NULL".to_string(),
    }
}

/// Sanitize a layer id for use inside a SQL alias
pub fn alias_safe(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
