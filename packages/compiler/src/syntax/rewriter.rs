//! Symbol-replacement rewriter.
//!
//! Ancestor name composition repeatedly rewrites a name expression so it
//! stays valid one lexical level further down a nested-resource chain. The
//! rewrite is purely structural: variable accesses bound to the requested
//! symbols are swapped for replacement syntax, everything else is cloned.

use indexmap::IndexMap;

use crate::semantics::{SemanticModel, SymbolId};
use crate::syntax::{
    ArrayAccessSyntax, ArraySyntax, BinaryOperationSyntax, ForSyntax, InstanceFunctionCallSyntax,
    FunctionCallSyntax, ObjectPropertySyntax, ObjectSyntax, ParenthesizedSyntax, PropertyAccessSyntax,
    PropertyKey, StringSyntax, Syntax, TernaryOperationSyntax, UnaryOperationSyntax,
};

/// Returns a copy of `syntax` with every variable access bound to a key of
/// `replacements` substituted by the mapped syntax.
pub fn replace_symbols(
    model: &SemanticModel,
    replacements: &IndexMap<SymbolId, Syntax>,
    syntax: &Syntax,
) -> Syntax {
    match syntax {
        Syntax::VariableAccess(access) => {
            if let Some(symbol) = model.get_symbol_info(access.id) {
                if let Some(replacement) = replacements.get(&symbol) {
                    return replacement.clone();
                }
            }
            syntax.clone()
        }
        Syntax::String(string) => Syntax::String(StringSyntax {
            id: string.id,
            segments: string.segments.clone(),
            expressions: string
                .expressions
                .iter()
                .map(|e| replace_symbols(model, replacements, e))
                .collect(),
        }),
        Syntax::Object(object) => Syntax::Object(ObjectSyntax {
            id: object.id,
            properties: object
                .properties
                .iter()
                .map(|p| ObjectPropertySyntax {
                    id: p.id,
                    key: match &p.key {
                        PropertyKey::Identifier(name) => PropertyKey::Identifier(name.clone()),
                        PropertyKey::String(key) => PropertyKey::String(StringSyntax {
                            id: key.id,
                            segments: key.segments.clone(),
                            expressions: key
                                .expressions
                                .iter()
                                .map(|e| replace_symbols(model, replacements, e))
                                .collect(),
                        }),
                    },
                    value: replace_symbols(model, replacements, &p.value),
                })
                .collect(),
        }),
        Syntax::Array(array) => Syntax::Array(ArraySyntax {
            id: array.id,
            items: array
                .items
                .iter()
                .map(|i| replace_symbols(model, replacements, i))
                .collect(),
        }),
        Syntax::Parenthesized(inner) => Syntax::Parenthesized(ParenthesizedSyntax {
            id: inner.id,
            expression: Box::new(replace_symbols(model, replacements, &inner.expression)),
        }),
        Syntax::UnaryOperation(unary) => Syntax::UnaryOperation(UnaryOperationSyntax {
            id: unary.id,
            operator: unary.operator,
            expression: Box::new(replace_symbols(model, replacements, &unary.expression)),
        }),
        Syntax::BinaryOperation(binary) => Syntax::BinaryOperation(BinaryOperationSyntax {
            id: binary.id,
            operator: binary.operator,
            left: Box::new(replace_symbols(model, replacements, &binary.left)),
            right: Box::new(replace_symbols(model, replacements, &binary.right)),
        }),
        Syntax::TernaryOperation(ternary) => Syntax::TernaryOperation(TernaryOperationSyntax {
            id: ternary.id,
            condition: Box::new(replace_symbols(model, replacements, &ternary.condition)),
            true_expression: Box::new(replace_symbols(model, replacements, &ternary.true_expression)),
            false_expression: Box::new(replace_symbols(
                model,
                replacements,
                &ternary.false_expression,
            )),
        }),
        Syntax::FunctionCall(call) => Syntax::FunctionCall(FunctionCallSyntax {
            id: call.id,
            name: call.name.clone(),
            arguments: call
                .arguments
                .iter()
                .map(|a| replace_symbols(model, replacements, a))
                .collect(),
        }),
        Syntax::InstanceFunctionCall(call) => {
            Syntax::InstanceFunctionCall(InstanceFunctionCallSyntax {
                id: call.id,
                base: Box::new(replace_symbols(model, replacements, &call.base)),
                name: call.name.clone(),
                arguments: call
                    .arguments
                    .iter()
                    .map(|a| replace_symbols(model, replacements, a))
                    .collect(),
            })
        }
        Syntax::ArrayAccess(access) => Syntax::ArrayAccess(ArrayAccessSyntax {
            id: access.id,
            base: Box::new(replace_symbols(model, replacements, &access.base)),
            index: Box::new(replace_symbols(model, replacements, &access.index)),
        }),
        Syntax::PropertyAccess(access) => Syntax::PropertyAccess(PropertyAccessSyntax {
            id: access.id,
            base: Box::new(replace_symbols(model, replacements, &access.base)),
            property_name: access.property_name.clone(),
        }),
        Syntax::For(for_syntax) => Syntax::For(ForSyntax {
            id: for_syntax.id,
            expression: Box::new(replace_symbols(model, replacements, &for_syntax.expression)),
            body: Box::new(replace_symbols(model, replacements, &for_syntax.body)),
        }),
        Syntax::BooleanLiteral(_)
        | Syntax::IntegerLiteral(_)
        | Syntax::NullLiteral(_)
        | Syntax::ExplicitVariableAccess(_) => syntax.clone(),
    }
}
