//! Shared builders for emission tests.
//!
//! The real binder lives upstream, so tests assemble the semantic model by
//! hand: every syntax node gets a fresh id, and bindings, loops and resource
//! metadata are registered against those ids.

use mantle_compiler::emit::{EmitterContext, ExpressionConverter, Result};
use mantle_compiler::semantics::metadata::{
    DeclaredResourceMetadata, ResourceMetadata, ResourceMetadataId, TypeReference,
};
use mantle_compiler::semantics::{
    EmitterSettings, LocalKind, LocalSymbol, LoopId, LoopInfo, LoopParent, ModuleDeclaration,
    ModuleId, ParameterSymbol, SemanticModel, Symbol, SymbolId, VariableSymbol,
};
use mantle_compiler::syntax::{
    ArrayAccessSyntax, BinaryOperationSyntax, BinaryOperator, BooleanLiteralSyntax,
    FunctionCallSyntax, InstanceFunctionCallSyntax, IntegerLiteralSyntax, NodeId,
    NullLiteralSyntax, PropertyAccessSyntax, StringSyntax, Syntax, TernaryOperationSyntax,
    UnaryOperationSyntax, UnaryOperator, VariableAccessSyntax,
};
use mantle_compiler::template::{
    ExpressionSerializer, ExpressionSerializerSettings, SingleStringHandling, TemplateExpression,
};

pub struct Fixture {
    pub model: SemanticModel,
    next_id: u32,
}

impl Fixture {
    pub fn new() -> Self {
        Fixture {
            model: SemanticModel::new(),
            next_id: 0,
        }
    }

    pub fn id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn string(&mut self, value: &str) -> Syntax {
        Syntax::String(StringSyntax {
            id: self.id(),
            segments: vec![value.to_string()],
            expressions: Vec::new(),
        })
    }

    /// `segments` has one more element than `expressions`.
    pub fn interpolated(&mut self, segments: &[&str], expressions: Vec<Syntax>) -> Syntax {
        Syntax::String(StringSyntax {
            id: self.id(),
            segments: segments.iter().map(|s| s.to_string()).collect(),
            expressions,
        })
    }

    pub fn int(&mut self, value: u64) -> Syntax {
        Syntax::IntegerLiteral(IntegerLiteralSyntax {
            id: self.id(),
            value,
        })
    }

    pub fn boolean(&mut self, value: bool) -> Syntax {
        Syntax::BooleanLiteral(BooleanLiteralSyntax {
            id: self.id(),
            value,
        })
    }

    pub fn null(&mut self) -> Syntax {
        Syntax::NullLiteral(NullLiteralSyntax { id: self.id() })
    }

    pub fn unary(&mut self, operator: UnaryOperator, expression: Syntax) -> Syntax {
        Syntax::UnaryOperation(UnaryOperationSyntax {
            id: self.id(),
            operator,
            expression: Box::new(expression),
        })
    }

    pub fn binary(&mut self, operator: BinaryOperator, left: Syntax, right: Syntax) -> Syntax {
        Syntax::BinaryOperation(BinaryOperationSyntax {
            id: self.id(),
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn ternary(&mut self, condition: Syntax, when_true: Syntax, when_false: Syntax) -> Syntax {
        Syntax::TernaryOperation(TernaryOperationSyntax {
            id: self.id(),
            condition: Box::new(condition),
            true_expression: Box::new(when_true),
            false_expression: Box::new(when_false),
        })
    }

    pub fn function_call(&mut self, name: &str, arguments: Vec<Syntax>) -> Syntax {
        Syntax::FunctionCall(FunctionCallSyntax {
            id: self.id(),
            name: name.to_string(),
            arguments,
        })
    }

    pub fn instance_call(&mut self, base: Syntax, name: &str, arguments: Vec<Syntax>) -> Syntax {
        Syntax::InstanceFunctionCall(InstanceFunctionCallSyntax {
            id: self.id(),
            base: Box::new(base),
            name: name.to_string(),
            arguments,
        })
    }

    pub fn array_access(&mut self, base: Syntax, index: Syntax) -> Syntax {
        Syntax::ArrayAccess(ArrayAccessSyntax {
            id: self.id(),
            base: Box::new(base),
            index: Box::new(index),
        })
    }

    pub fn property_access(&mut self, base: Syntax, property_name: &str) -> Syntax {
        Syntax::PropertyAccess(PropertyAccessSyntax {
            id: self.id(),
            base: Box::new(base),
            property_name: property_name.to_string(),
        })
    }

    /// A name access bound to an existing symbol.
    pub fn access(&mut self, name: &str, symbol: SymbolId) -> Syntax {
        let id = self.id();
        self.model.bind(id, symbol);
        Syntax::VariableAccess(VariableAccessSyntax {
            id,
            name: name.to_string(),
        })
    }

    pub fn parameter(&mut self, name: &str) -> SymbolId {
        self.model.add_symbol(Symbol::Parameter(ParameterSymbol {
            name: name.to_string(),
            resource: None,
        }))
    }

    pub fn parameter_access(&mut self, name: &str) -> Syntax {
        let symbol = self.parameter(name);
        self.access(name, symbol)
    }

    pub fn variable(&mut self, name: &str, value: Syntax) -> SymbolId {
        self.model.add_symbol(Symbol::Variable(VariableSymbol {
            name: name.to_string(),
            value,
        }))
    }

    pub fn add_loop(&mut self, expression: Syntax, parent: LoopParent) -> LoopId {
        let for_node = self.id();
        self.model.add_loop(LoopInfo {
            for_node,
            expression,
            parent,
        })
    }

    pub fn local(&mut self, name: &str, kind: LocalKind, declaring_loop: LoopId) -> SymbolId {
        self.model.add_symbol(Symbol::Local(LocalSymbol {
            name: name.to_string(),
            kind,
            declaring_loop,
        }))
    }

    pub fn declared_resource(
        &mut self,
        symbol_name: &str,
        qualified_type: &str,
        api_version: &str,
        name_syntax: Syntax,
    ) -> ResourceMetadataId {
        let metadata = self.declared_metadata(symbol_name, qualified_type, api_version, name_syntax);
        self.model.add_resource(ResourceMetadata::Declared(metadata))
    }

    pub fn declared_collection(
        &mut self,
        symbol_name: &str,
        qualified_type: &str,
        api_version: &str,
        name_syntax: Syntax,
    ) -> ResourceMetadataId {
        let mut metadata =
            self.declared_metadata(symbol_name, qualified_type, api_version, name_syntax);
        metadata.is_collection = true;
        self.model.add_resource(ResourceMetadata::Declared(metadata))
    }

    fn declared_metadata(
        &mut self,
        symbol_name: &str,
        qualified_type: &str,
        api_version: &str,
        name_syntax: Syntax,
    ) -> DeclaredResourceMetadata {
        let symbol_name_syntax = Syntax::VariableAccess(VariableAccessSyntax {
            id: self.id(),
            name: symbol_name.to_string(),
        });

        DeclaredResourceMetadata {
            symbol_name: symbol_name.to_string(),
            type_reference: TypeReference::new(qualified_type, Some(api_version)),
            is_az_resource: true,
            is_existing: false,
            is_collection: false,
            has_condition: false,
            name_syntax,
            symbol_name_syntax,
        }
    }

    /// A name access that the binder resolved to a resource.
    pub fn resource_access(&mut self, name: &str, resource: ResourceMetadataId) -> Syntax {
        let symbol = self.model.add_symbol(Symbol::Resource(resource));
        let id = self.id();
        self.model.bind(id, symbol);
        self.model.bind_resource(id, resource);
        Syntax::VariableAccess(VariableAccessSyntax {
            id,
            name: name.to_string(),
        })
    }

    pub fn module(&mut self, name: &str, name_syntax: Syntax, is_collection: bool) -> ModuleId {
        self.model.add_module(ModuleDeclaration {
            name: name.to_string(),
            is_collection,
            has_condition: false,
            name_syntax,
        })
    }

    pub fn module_access(&mut self, name: &str, module: ModuleId) -> Syntax {
        let symbol = self.model.add_symbol(Symbol::Module(module));
        self.access(name, symbol)
    }
}

pub fn serializer() -> ExpressionSerializer {
    ExpressionSerializer::new(ExpressionSerializerSettings {
        include_outer_square_brackets: true,
        single_string_handling: SingleStringHandling::SerializeAsString,
    })
}

pub fn serialize(expression: &TemplateExpression) -> String {
    serializer().serialize_expression(expression)
}

pub fn try_convert(model: &SemanticModel, syntax: &Syntax) -> Result<TemplateExpression> {
    let context = EmitterContext::new(model, EmitterSettings::default());
    let converter = ExpressionConverter::new(&context);
    converter.convert_expression(syntax)
}

/// Converts and serializes with default settings, panicking on failure.
pub fn convert_to_string(model: &SemanticModel, syntax: &Syntax) -> String {
    serialize(&try_convert(model, syntax).unwrap())
}

pub fn convert_symbolic_to_string(model: &SemanticModel, syntax: &Syntax) -> String {
    let settings = EmitterSettings {
        enable_symbolic_names: true,
    };
    let context = EmitterContext::new(model, settings);
    let converter = ExpressionConverter::new(&context);
    serialize(&converter.convert_expression(syntax).unwrap())
}
