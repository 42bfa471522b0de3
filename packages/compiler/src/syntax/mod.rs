//! Resolved syntax tree consumed by the emission backend.
//!
//! The tokenizer, parser and binder live upstream; this module only models
//! the expression shapes they hand over. Every node carries a `NodeId` so the
//! semantic model can attach symbol bindings and scope information without
//! the tree itself owning any of it.

pub mod rewriter;

/// Identity of a syntax node, assigned by the upstream parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Nodes synthesized during rewriting. They never participate in symbol
    /// lookups, so they all share one reserved id.
    pub const SYNTHETIC: NodeId = NodeId(u32::MAX);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    LogicalOr,
    LogicalAnd,
    Equals,
    NotEquals,
    EqualsInsensitive,
    NotEqualsInsensitive,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Coalesce,
}

#[derive(Debug, Clone)]
pub struct BooleanLiteralSyntax {
    pub id: NodeId,
    pub value: bool,
}

/// Integer literals are scanned as unsigned; the lowering step decides
/// whether the magnitude fits the signed 64-bit value space.
#[derive(Debug, Clone)]
pub struct IntegerLiteralSyntax {
    pub id: NodeId,
    pub value: u64,
}

/// A string with optional interpolation. `segments` always has exactly one
/// more element than `expressions`; a non-interpolated string is a single
/// segment with no expressions.
#[derive(Debug, Clone)]
pub struct StringSyntax {
    pub id: NodeId,
    pub segments: Vec<String>,
    pub expressions: Vec<Syntax>,
}

impl StringSyntax {
    pub fn is_interpolated(&self) -> bool {
        !self.expressions.is_empty()
    }

    /// The literal value, when the string has no interpolation.
    pub fn try_get_literal_value(&self) -> Option<&str> {
        match self.expressions.is_empty() {
            true => Some(&self.segments[0]),
            false => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NullLiteralSyntax {
    pub id: NodeId,
}

#[derive(Debug, Clone)]
pub enum PropertyKey {
    Identifier(String),
    String(StringSyntax),
}

#[derive(Debug, Clone)]
pub struct ObjectPropertySyntax {
    pub id: NodeId,
    pub key: PropertyKey,
    pub value: Syntax,
}

impl ObjectPropertySyntax {
    /// The compile-time key name, if the key is an identifier or a
    /// non-interpolated string.
    pub fn try_get_key_text(&self) -> Option<&str> {
        match &self.key {
            PropertyKey::Identifier(name) => Some(name),
            PropertyKey::String(string) => string.try_get_literal_value(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectSyntax {
    pub id: NodeId,
    pub properties: Vec<ObjectPropertySyntax>,
}

#[derive(Debug, Clone)]
pub struct ArraySyntax {
    pub id: NodeId,
    pub items: Vec<Syntax>,
}

#[derive(Debug, Clone)]
pub struct ParenthesizedSyntax {
    pub id: NodeId,
    pub expression: Box<Syntax>,
}

#[derive(Debug, Clone)]
pub struct UnaryOperationSyntax {
    pub id: NodeId,
    pub operator: UnaryOperator,
    pub expression: Box<Syntax>,
}

#[derive(Debug, Clone)]
pub struct BinaryOperationSyntax {
    pub id: NodeId,
    pub operator: BinaryOperator,
    pub left: Box<Syntax>,
    pub right: Box<Syntax>,
}

#[derive(Debug, Clone)]
pub struct TernaryOperationSyntax {
    pub id: NodeId,
    pub condition: Box<Syntax>,
    pub true_expression: Box<Syntax>,
    pub false_expression: Box<Syntax>,
}

#[derive(Debug, Clone)]
pub struct FunctionCallSyntax {
    pub id: NodeId,
    pub name: String,
    pub arguments: Vec<Syntax>,
}

/// A method-style call, e.g. `store.listKeys()` or `vault.getSecret('x')`.
/// The base may itself be an array access over a collection.
#[derive(Debug, Clone)]
pub struct InstanceFunctionCallSyntax {
    pub id: NodeId,
    pub base: Box<Syntax>,
    pub name: String,
    pub arguments: Vec<Syntax>,
}

#[derive(Debug, Clone)]
pub struct ArrayAccessSyntax {
    pub id: NodeId,
    pub base: Box<Syntax>,
    pub index: Box<Syntax>,
}

#[derive(Debug, Clone)]
pub struct PropertyAccessSyntax {
    pub id: NodeId,
    pub base: Box<Syntax>,
    pub property_name: String,
}

#[derive(Debug, Clone)]
pub struct VariableAccessSyntax {
    pub id: NodeId,
    pub name: String,
}

/// An access that bypasses symbol resolution and always emits a
/// `variables(...)` lookup in the target template.
#[derive(Debug, Clone)]
pub struct ExplicitVariableAccessSyntax {
    pub id: NodeId,
    pub name: String,
}

/// A `for` expression. Loop locals (item/index variables) are bound through
/// the semantic model, not stored on the node.
#[derive(Debug, Clone)]
pub struct ForSyntax {
    pub id: NodeId,
    pub expression: Box<Syntax>,
    pub body: Box<Syntax>,
}

#[derive(Debug, Clone)]
pub enum Syntax {
    BooleanLiteral(BooleanLiteralSyntax),
    IntegerLiteral(IntegerLiteralSyntax),
    String(StringSyntax),
    NullLiteral(NullLiteralSyntax),
    Object(ObjectSyntax),
    Array(ArraySyntax),
    Parenthesized(ParenthesizedSyntax),
    UnaryOperation(UnaryOperationSyntax),
    BinaryOperation(BinaryOperationSyntax),
    TernaryOperation(TernaryOperationSyntax),
    FunctionCall(FunctionCallSyntax),
    InstanceFunctionCall(InstanceFunctionCallSyntax),
    ArrayAccess(ArrayAccessSyntax),
    PropertyAccess(PropertyAccessSyntax),
    VariableAccess(VariableAccessSyntax),
    ExplicitVariableAccess(ExplicitVariableAccessSyntax),
    For(ForSyntax),
}

impl Syntax {
    pub fn node_id(&self) -> NodeId {
        match self {
            Syntax::BooleanLiteral(s) => s.id,
            Syntax::IntegerLiteral(s) => s.id,
            Syntax::String(s) => s.id,
            Syntax::NullLiteral(s) => s.id,
            Syntax::Object(s) => s.id,
            Syntax::Array(s) => s.id,
            Syntax::Parenthesized(s) => s.id,
            Syntax::UnaryOperation(s) => s.id,
            Syntax::BinaryOperation(s) => s.id,
            Syntax::TernaryOperation(s) => s.id,
            Syntax::FunctionCall(s) => s.id,
            Syntax::InstanceFunctionCall(s) => s.id,
            Syntax::ArrayAccess(s) => s.id,
            Syntax::PropertyAccess(s) => s.id,
            Syntax::VariableAccess(s) => s.id,
            Syntax::ExplicitVariableAccess(s) => s.id,
            Syntax::For(s) => s.id,
        }
    }

    /// Splits an optional outer array access from its base, e.g.
    /// `stores[i]` -> (`stores`, Some(`i`)).
    pub fn unwrap_array_access(&self) -> (&Syntax, Option<&Syntax>) {
        match self {
            Syntax::ArrayAccess(access) => (&access.base, Some(&access.index)),
            other => (other, None),
        }
    }
}

/// Helpers for synthesizing nodes during expression rewriting.
pub mod factory {
    use super::*;

    pub fn create_array_access(base: Syntax, index: Syntax) -> Syntax {
        Syntax::ArrayAccess(ArrayAccessSyntax {
            id: NodeId::SYNTHETIC,
            base: Box::new(base),
            index: Box::new(index),
        })
    }

    pub fn create_array(items: Vec<Syntax>) -> Syntax {
        Syntax::Array(ArraySyntax {
            id: NodeId::SYNTHETIC,
            items,
        })
    }

    pub fn create_string_literal(value: impl Into<String>) -> Syntax {
        Syntax::String(StringSyntax {
            id: NodeId::SYNTHETIC,
            segments: vec![value.into()],
            expressions: Vec::new(),
        })
    }
}
