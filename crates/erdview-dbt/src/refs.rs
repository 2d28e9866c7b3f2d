//! `ref('model')` expressions in test arguments
//!
//! Grammar: the literal `ref('`, one or more characters other than a quote,
//! then the literal `')`. Anything else does not match. Double-quoted refs,
//! package-qualified refs and surrounding whitespace are not recognized.

/// Extract the model name from a `ref('model_name')` expression
///
/// Returns `None` when the input does not match the grammar.
pub fn parse_ref(expr: &str) -> Option<&str> {
    let model_name = expr.strip_prefix("ref('")?.strip_suffix("')")?;

    if model_name.is_empty() || model_name.contains(['\'', '"']) {
        return None;
    }

    Some(model_name)
}
