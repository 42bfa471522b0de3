//! Local-variable accessibility analysis.
//!
//! Lowering sometimes relocates an expression to a different position in the
//! emitted template (dependency entries, cross-resource name composition).
//! This analyzer answers the one question that relocation raises: which loop
//! locals referenced by the expression stop being in scope at the new
//! position.

use indexmap::IndexSet;

use crate::semantics::{SemanticModel, Symbol, SymbolId};
use crate::syntax::{NodeId, PropertyKey, Syntax};

pub struct DataFlowAnalyzer<'a> {
    model: &'a SemanticModel,
}

impl<'a> DataFlowAnalyzer<'a> {
    pub fn new(model: &'a SemanticModel) -> Self {
        DataFlowAnalyzer { model }
    }

    /// All loop locals the expression references, in first-use order.
    pub fn get_local_symbol_dependencies(&self, syntax: &Syntax) -> IndexSet<SymbolId> {
        let mut locals = IndexSet::new();
        self.collect_locals(syntax, &mut locals);
        locals
    }

    /// Locals referenced by `syntax` that are no longer in scope once the
    /// expression is evaluated at `new_context`.
    pub fn get_inaccessible_locals_after_move(
        &self,
        syntax: &Syntax,
        new_context: NodeId,
    ) -> IndexSet<SymbolId> {
        let visible = self.model.loops_in_scope_at(new_context);

        self.get_local_symbol_dependencies(syntax)
            .into_iter()
            .filter(|local| match self.model.symbol(*local) {
                Symbol::Local(local) => !visible.contains(&local.declaring_loop),
                _ => false,
            })
            .collect()
    }

    fn collect_locals(&self, syntax: &Syntax, out: &mut IndexSet<SymbolId>) {
        match syntax {
            Syntax::VariableAccess(access) => {
                if let Some(symbol) = self.model.get_symbol_info(access.id) {
                    if matches!(self.model.symbol(symbol), Symbol::Local(_)) {
                        out.insert(symbol);
                    }
                }
            }
            Syntax::String(string) => {
                for expression in &string.expressions {
                    self.collect_locals(expression, out);
                }
            }
            Syntax::Object(object) => {
                for property in &object.properties {
                    if let PropertyKey::String(key) = &property.key {
                        for expression in &key.expressions {
                            self.collect_locals(expression, out);
                        }
                    }
                    self.collect_locals(&property.value, out);
                }
            }
            Syntax::Array(array) => {
                for item in &array.items {
                    self.collect_locals(item, out);
                }
            }
            Syntax::Parenthesized(inner) => self.collect_locals(&inner.expression, out),
            Syntax::UnaryOperation(unary) => self.collect_locals(&unary.expression, out),
            Syntax::BinaryOperation(binary) => {
                self.collect_locals(&binary.left, out);
                self.collect_locals(&binary.right, out);
            }
            Syntax::TernaryOperation(ternary) => {
                self.collect_locals(&ternary.condition, out);
                self.collect_locals(&ternary.true_expression, out);
                self.collect_locals(&ternary.false_expression, out);
            }
            Syntax::FunctionCall(call) => {
                for argument in &call.arguments {
                    self.collect_locals(argument, out);
                }
            }
            Syntax::InstanceFunctionCall(call) => {
                self.collect_locals(&call.base, out);
                for argument in &call.arguments {
                    self.collect_locals(argument, out);
                }
            }
            Syntax::ArrayAccess(access) => {
                self.collect_locals(&access.base, out);
                self.collect_locals(&access.index, out);
            }
            Syntax::PropertyAccess(access) => self.collect_locals(&access.base, out),
            Syntax::For(for_syntax) => {
                self.collect_locals(&for_syntax.expression, out);
                self.collect_locals(&for_syntax.body, out);
            }
            Syntax::BooleanLiteral(_)
            | Syntax::IntegerLiteral(_)
            | Syntax::NullLiteral(_)
            | Syntax::ExplicitVariableAccess(_) => {}
        }
    }
}
