//! Serialization of template expressions into their string form.
//!
//! Emitted expressions live inside JSON string tokens as `"[func(...)]"`.
//! Lone string literals may instead serialize as plain strings, with the
//! leading-bracket escape applied so the runtime does not mistake them for
//! expressions.

use lazy_static::lazy_static;
use regex::Regex;

use crate::template::expression::{FunctionExpression, TemplateExpression, TemplateValue};

lazy_static! {
    /// Property names that can be appended with dot notation.
    static ref LEGAL_IDENTIFIER_RE: Regex = Regex::new(r"^[a-zA-Z_][0-9a-zA-Z_]*$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleStringHandling {
    /// A lone string literal serializes as the raw string value.
    SerializeAsString,
    /// A lone string literal serializes as a bracketed expression.
    SerializeAsExpression,
}

#[derive(Debug, Clone, Copy)]
pub struct ExpressionSerializerSettings {
    pub include_outer_square_brackets: bool,
    pub single_string_handling: SingleStringHandling,
}

#[derive(Debug, Clone, Copy)]
pub struct ExpressionSerializer {
    settings: ExpressionSerializerSettings,
}

impl ExpressionSerializer {
    pub fn new(settings: ExpressionSerializerSettings) -> Self {
        ExpressionSerializer { settings }
    }

    pub fn serialize_expression(&self, expression: &TemplateExpression) -> String {
        if let TemplateExpression::Literal(TemplateValue::String(value)) = expression {
            if self.settings.single_string_handling == SingleStringHandling::SerializeAsString {
                return escape_template_string(value);
            }
        }

        let inner = serialize_inner(expression);
        match self.settings.include_outer_square_brackets {
            true => format!("[{inner}]"),
            false => inner,
        }
    }
}

/// A literal string that itself looks like an expression must be escaped by
/// doubling the opening bracket.
fn escape_template_string(value: &str) -> String {
    if value.starts_with('[') && value.ends_with(']') {
        return format!("[{value}");
    }

    value.to_string()
}

fn serialize_inner(expression: &TemplateExpression) -> String {
    match expression {
        TemplateExpression::Literal(TemplateValue::String(value)) => quote(value),
        TemplateExpression::Literal(TemplateValue::Int(value)) => value.to_string(),
        TemplateExpression::Function(function) => serialize_function(function),
    }
}

fn serialize_function(function: &FunctionExpression) -> String {
    let parameters = function
        .parameters
        .iter()
        .map(serialize_inner)
        .collect::<Vec<_>>()
        .join(", ");

    let mut serialized = format!("{}({})", function.name, parameters);

    for property in &function.properties {
        match property {
            TemplateExpression::Literal(TemplateValue::String(name))
                if LEGAL_IDENTIFIER_RE.is_match(name) =>
            {
                serialized.push('.');
                serialized.push_str(name);
            }
            other => {
                serialized.push('[');
                serialized.push_str(&serialize_inner(other));
                serialized.push(']');
            }
        }
    }

    serialized
}

/// Single-quoted string with embedded quotes doubled.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
