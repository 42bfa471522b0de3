//! Lowering of resolved syntax into operations, and of operations into
//! target template expressions.
//!
//! Lowering is a two-step pipeline. `convert_expression_operation` maps a
//! syntax tree onto the closed `Operation` set, resolving every symbol
//! through the semantic model. `convert_operation` then renders operations as
//! expressions of the target language, which has no operators or lexical
//! scope, only function calls. Loop locals never survive lowering: any
//! expression relocated out of its loop gets its locals substituted through
//! an `IndexReplacementContext` first.

use indexmap::{IndexMap, IndexSet};

use crate::emit::{
    scope, EmitError, EmitterContext, Result, ANY_FUNCTION, MODULE_NAME_PROPERTY,
    MODULE_OUTPUTS_PROPERTY, NESTED_DEPLOYMENT_RESOURCE_API_VERSION,
    NESTED_DEPLOYMENT_RESOURCE_TYPE,
};
use crate::operations::{
    ConstantValue, GetKeyVaultSecretOperation, IndexReplacementContext, ModuleOutputOperation,
    Operation, ResourceReferenceOperation,
};
use crate::semantics::metadata::{ResourceMetadata, ResourceMetadataId, ScopeData};
use crate::semantics::{LocalKind, LoopId, ModuleId, Symbol, SymbolId};
use crate::syntax::rewriter::replace_symbols;
use crate::syntax::{
    factory, ArrayAccessSyntax, ArraySyntax, BinaryOperationSyntax, BinaryOperator,
    FunctionCallSyntax, InstanceFunctionCallSyntax, NodeId, ObjectSyntax, PropertyAccessSyntax,
    PropertyKey, StringSyntax, Syntax, TernaryOperationSyntax, UnaryOperationSyntax, UnaryOperator,
    VariableAccessSyntax,
};
use crate::template::expression::{
    append_properties, create_function, FunctionExpression, TemplateExpression, TemplateValue,
};

const RESOURCE_ID_PROPERTY: &str = "id";
const RESOURCE_NAME_PROPERTY: &str = "name";
const RESOURCE_TYPE_PROPERTY: &str = "type";
const RESOURCE_API_VERSION_PROPERTY: &str = "apiVersion";
const RESOURCE_PROPERTIES_PROPERTY: &str = "properties";

/// Lowers expressions under a fixed set of local-variable replacements.
///
/// A converter is cheap to derive: relocating an expression creates a new
/// converter carrying the replacement operations for every loop local that
/// went out of scope, and conversion otherwise proceeds identically.
#[derive(Clone)]
pub struct ExpressionConverter<'a> {
    context: &'a EmitterContext<'a>,
    local_replacements: IndexMap<SymbolId, Operation>,
}

impl<'a> ExpressionConverter<'a> {
    pub fn new(context: &'a EmitterContext<'a>) -> Self {
        ExpressionConverter {
            context,
            local_replacements: IndexMap::new(),
        }
    }

    fn with_replacements(
        context: &'a EmitterContext<'a>,
        local_replacements: IndexMap<SymbolId, Operation>,
    ) -> Self {
        ExpressionConverter {
            context,
            local_replacements,
        }
    }

    /// Lowers and renders in one step.
    pub fn convert_expression(&self, syntax: &Syntax) -> Result<TemplateExpression> {
        let operation = self.convert_expression_operation(syntax)?;
        self.convert_operation(&operation)
    }

    /// Lowers a syntax tree onto the operation set.
    pub fn convert_expression_operation(&self, syntax: &Syntax) -> Result<Operation> {
        match syntax {
            Syntax::BooleanLiteral(literal) => Ok(Operation::constant(literal.value)),
            Syntax::IntegerLiteral(literal) => convert_integer(literal.value),
            Syntax::String(string) => self.convert_string(string),
            Syntax::NullLiteral(_) => Ok(Operation::NullValue),
            Syntax::Object(object) => self.convert_object(object),
            Syntax::Array(array) => self.convert_array(array),
            Syntax::Parenthesized(inner) => self.convert_expression_operation(&inner.expression),
            Syntax::UnaryOperation(unary) => self.convert_unary(unary),
            Syntax::BinaryOperation(binary) => self.convert_binary(binary),
            Syntax::TernaryOperation(ternary) => self.convert_ternary(ternary),
            Syntax::FunctionCall(call) => self.convert_function(call),
            Syntax::InstanceFunctionCall(call) => self.convert_instance_function(call),
            Syntax::ArrayAccess(access) => self.convert_array_access(access),
            Syntax::PropertyAccess(access) => self.convert_property_access(access),
            Syntax::VariableAccess(access) => self.convert_variable_access(access),
            Syntax::ExplicitVariableAccess(access) => {
                Ok(Operation::ExplicitVariableAccess(access.name.clone()))
            }
            Syntax::For(_) => Err(EmitError::unsupported(
                "a loop expression outside of a loop-aware position",
            )),
        }
    }

    /// Derives the converter that is valid after moving `moved_syntax` to the
    /// position of `new_context`.
    pub fn create_converter_for_index_replacement(
        &self,
        moved_syntax: &Syntax,
        index_expression: Option<&Syntax>,
        new_context: NodeId,
    ) -> Result<ExpressionConverter<'a>> {
        match self.try_get_replacement_context(moved_syntax, index_expression, new_context)? {
            Some(index_context) => Ok(Self::with_replacements(
                self.context,
                index_context.local_replacements,
            )),
            None => Ok(self.clone()),
        }
    }

    /// Computes the substitutions needed to evaluate `moved_syntax` at the
    /// position of `new_context`, selecting collection elements through
    /// `index_expression`.
    ///
    /// Returns `None` when nothing goes out of scope and no index is given.
    /// Fails when the inaccessible locals span more than one loop, or when a
    /// loop's locals go out of scope with no index to replace them by.
    pub fn try_get_replacement_context(
        &self,
        moved_syntax: &Syntax,
        index_expression: Option<&Syntax>,
        new_context: NodeId,
    ) -> Result<Option<IndexReplacementContext>> {
        let inaccessible_locals = self
            .context
            .data_flow
            .get_inaccessible_locals_after_move(moved_syntax, new_context);

        let mut inaccessible_loops: IndexSet<LoopId> = IndexSet::new();
        for local in &inaccessible_locals {
            inaccessible_loops.insert(self.get_enclosing_loop(*local)?);
        }

        match (inaccessible_loops.len(), index_expression) {
            (0, None) => Ok(None),
            (0, Some(index)) => Ok(Some(IndexReplacementContext {
                local_replacements: self.local_replacements.clone(),
                index: self.convert_expression_operation(index)?,
            })),
            (1, Some(index)) => {
                let for_loop = inaccessible_loops[0];
                let mut local_replacements = self.local_replacements.clone();
                for local in &inaccessible_locals {
                    let index_operation = self.convert_expression_operation(index)?;
                    let replacement = self.get_loop_variable(*local, for_loop, index_operation)?;
                    local_replacements.insert(*local, replacement);
                }

                Ok(Some(IndexReplacementContext {
                    local_replacements,
                    index: self.convert_expression_operation(index)?,
                }))
            }
            _ => Err(EmitError::AmbiguousIndexReplacement),
        }
    }

    /// Replacement context for relocating a resource's name expression. Under
    /// symbolic emission the moved expression is the symbolic name instead.
    pub fn try_get_replacement_context_for_resource(
        &self,
        resource: ResourceMetadataId,
        index_expression: Option<&Syntax>,
        new_context: NodeId,
    ) -> Result<Option<IndexReplacementContext>> {
        let declared = self
            .context
            .model
            .resource(resource)
            .as_declared()
            .ok_or_else(|| {
                EmitError::unsupported("index replacement on a resource without a declaration")
            })?;

        let moved_syntax = match self.context.settings.enable_symbolic_names {
            true => &declared.symbol_name_syntax,
            false => &declared.name_syntax,
        };

        self.try_get_replacement_context(moved_syntax, index_expression, new_context)
    }

    fn converter_for(&self, index_context: Option<&IndexReplacementContext>) -> Self {
        match index_context {
            Some(context) => Self::with_replacements(self.context, context.local_replacements.clone()),
            None => self.clone(),
        }
    }

    fn convert_string(&self, string: &StringSyntax) -> Result<Operation> {
        if let Some(literal) = string.try_get_literal_value() {
            return Ok(Operation::constant(literal.to_string()));
        }

        // Interpolation becomes a format call: segments form the format
        // string (with brace escaping) and the expressions become arguments.
        let mut format_string = String::new();
        for (i, segment) in string.segments.iter().enumerate() {
            format_string.push_str(&escape_format_segment(segment));
            if i < string.expressions.len() {
                format_string.push_str(&format!("{{{i}}}"));
            }
        }

        let mut parameters = vec![Operation::constant(format_string)];
        for expression in &string.expressions {
            parameters.push(self.convert_expression_operation(expression)?);
        }

        Ok(Operation::function_call("format", parameters))
    }

    fn convert_object(&self, object: &ObjectSyntax) -> Result<Operation> {
        let mut parameters = Vec::with_capacity(object.properties.len() * 2);
        for property in &object.properties {
            let key = match property.try_get_key_text() {
                Some(text) => Operation::constant(text.to_string()),
                None => match &property.key {
                    PropertyKey::String(key) => self.convert_string(key)?,
                    PropertyKey::Identifier(name) => Operation::constant(name.clone()),
                },
            };
            parameters.push(key);
            parameters.push(self.convert_expression_operation(&property.value)?);
        }

        Ok(Operation::function_call("createObject", parameters))
    }

    fn convert_array(&self, array: &ArraySyntax) -> Result<Operation> {
        let items = array
            .items
            .iter()
            .map(|item| self.convert_expression_operation(item))
            .collect::<Result<Vec<_>>>()?;

        Ok(Operation::function_call("createArray", items))
    }

    fn convert_unary(&self, unary: &UnaryOperationSyntax) -> Result<Operation> {
        match unary.operator {
            UnaryOperator::Not => Ok(Operation::function_call(
                "not",
                vec![self.convert_expression_operation(&unary.expression)?],
            )),
            UnaryOperator::Minus => {
                if let Syntax::IntegerLiteral(literal) = &*unary.expression {
                    // Fold the negation so the i64::MIN magnitude, which has
                    // no positive counterpart, stays representable.
                    return match literal.value {
                        v if v == i64::MAX as u64 + 1 => Ok(Operation::constant(i64::MIN)),
                        v if v <= i64::MAX as u64 => Ok(Operation::constant(-(v as i64))),
                        v => Err(EmitError::IntegerOverflow(v)),
                    };
                }

                Ok(Operation::function_call(
                    "sub",
                    vec![
                        Operation::constant(0_i64),
                        self.convert_expression_operation(&unary.expression)?,
                    ],
                ))
            }
        }
    }

    fn convert_binary(&self, binary: &BinaryOperationSyntax) -> Result<Operation> {
        let left = self.convert_expression_operation(&binary.left)?;
        let right = self.convert_expression_operation(&binary.right)?;

        let name = match binary.operator {
            BinaryOperator::LogicalOr => "or",
            BinaryOperator::LogicalAnd => "and",
            BinaryOperator::Equals => "equals",
            BinaryOperator::LessThan => "less",
            BinaryOperator::LessThanOrEqual => "lessOrEquals",
            BinaryOperator::GreaterThan => "greater",
            BinaryOperator::GreaterThanOrEqual => "greaterOrEquals",
            BinaryOperator::Add => "add",
            BinaryOperator::Subtract => "sub",
            BinaryOperator::Multiply => "mul",
            BinaryOperator::Divide => "div",
            BinaryOperator::Modulo => "mod",
            BinaryOperator::Coalesce => "coalesce",
            BinaryOperator::NotEquals => {
                return Ok(Operation::function_call(
                    "not",
                    vec![Operation::function_call("equals", vec![left, right])],
                ));
            }
            BinaryOperator::EqualsInsensitive => {
                return Ok(Operation::function_call(
                    "equals",
                    vec![
                        Operation::function_call("toLower", vec![left]),
                        Operation::function_call("toLower", vec![right]),
                    ],
                ));
            }
            BinaryOperator::NotEqualsInsensitive => {
                return Ok(Operation::function_call(
                    "not",
                    vec![Operation::function_call(
                        "equals",
                        vec![
                            Operation::function_call("toLower", vec![left]),
                            Operation::function_call("toLower", vec![right]),
                        ],
                    )],
                ));
            }
        };

        Ok(Operation::function_call(name, vec![left, right]))
    }

    fn convert_ternary(&self, ternary: &TernaryOperationSyntax) -> Result<Operation> {
        Ok(Operation::function_call(
            "if",
            vec![
                self.convert_expression_operation(&ternary.condition)?,
                self.convert_expression_operation(&ternary.true_expression)?,
                self.convert_expression_operation(&ternary.false_expression)?,
            ],
        ))
    }

    fn convert_function(&self, call: &FunctionCallSyntax) -> Result<Operation> {
        // The type-erasure function is an identity at runtime.
        if call.name == ANY_FUNCTION {
            return match call.arguments.as_slice() {
                [argument] => self.convert_expression_operation(argument),
                _ => Err(EmitError::unsupported(
                    "the type-erasure function takes exactly one argument",
                )),
            };
        }

        let parameters = call
            .arguments
            .iter()
            .map(|argument| self.convert_expression_operation(argument))
            .collect::<Result<Vec<_>>>()?;

        Ok(Operation::function_call(call.name.clone(), parameters))
    }

    fn convert_instance_function(&self, call: &InstanceFunctionCallSyntax) -> Result<Operation> {
        let (base, index_expression) = call.base.unwrap_array_access();

        if let Some(Symbol::Namespace { .. }) = self.context.model.symbol_for(base) {
            if index_expression.is_some() {
                return Err(EmitError::unsupported(
                    "array access over a namespace symbol",
                ));
            }

            let parameters = call
                .arguments
                .iter()
                .map(|argument| self.convert_expression_operation(argument))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Operation::function_call(call.name.clone(), parameters));
        }

        let resource = self
            .context
            .model
            .try_lookup_resource(base)
            .ok_or_else(|| {
                EmitError::unsupported(format!("method call '{}' on a non-resource base", call.name))
            })?;
        let declared = self
            .context
            .model
            .resource(resource)
            .as_declared()
            .ok_or_else(|| {
                EmitError::unsupported(format!(
                    "method call '{}' on a resource without a declaration",
                    call.name
                ))
            })?;

        let index_context =
            self.try_get_replacement_context_for_resource(resource, index_expression, call.id)?;
        let resource_id = Operation::ResourceId {
            metadata: resource,
            index_context: index_context.map(Box::new),
        };

        if call.name.len() >= 4 && call.name[..4].eq_ignore_ascii_case("list") {
            let mut parameters = vec![resource_id];
            if call.arguments.is_empty() {
                let api_version = declared.type_reference.api_version.clone().ok_or_else(|| {
                    EmitError::unsupported("list invocation on a resource without an API version")
                })?;
                parameters.push(Operation::constant(api_version));
            } else {
                for argument in &call.arguments {
                    parameters.push(self.convert_expression_operation(argument)?);
                }
            }

            return Ok(Operation::function_call(call.name.clone(), parameters));
        }

        if call.name.eq_ignore_ascii_case("getSecret") {
            let (secret_name, secret_version) = match call.arguments.as_slice() {
                [name] => (self.convert_expression_operation(name)?, None),
                [name, version] => (
                    self.convert_expression_operation(name)?,
                    Some(self.convert_expression_operation(version)?),
                ),
                _ => {
                    return Err(EmitError::unsupported(
                        "secret retrieval takes one or two arguments",
                    ));
                }
            };

            return Ok(Operation::GetKeyVaultSecret(Box::new(
                GetKeyVaultSecretOperation {
                    resource_id,
                    secret_name,
                    secret_version,
                },
            )));
        }

        Err(EmitError::unsupported(format!(
            "method '{}' is not invocable on a resource",
            call.name
        )))
    }

    fn convert_array_access(&self, access: &ArrayAccessSyntax) -> Result<Operation> {
        if matches!(*access.base, Syntax::VariableAccess(_)) {
            if let Some(resource) = self.context.model.try_lookup_resource(&access.base) {
                if let Some(declared) = self.context.model.resource(resource).as_declared() {
                    if declared.is_collection {
                        let index_context = self.try_get_replacement_context_for_resource(
                            resource,
                            Some(&access.index),
                            access.id,
                        )?;
                        return Ok(self.get_resource_reference(resource, index_context));
                    }
                }
            }

            if let Some(Symbol::Module(module)) = self.context.model.symbol_for(&access.base) {
                let module = *module;
                if self.context.model.module(module).is_collection {
                    let index_context = self.try_get_replacement_context(
                        &self.context.model.module(module).name_syntax,
                        Some(&access.index),
                        access.id,
                    )?;
                    return Ok(self.get_module_outputs_reference(module, index_context));
                }
            }
        }

        Ok(Operation::array_access(
            self.convert_expression_operation(&access.base)?,
            self.convert_expression_operation(&access.index)?,
        ))
    }

    fn convert_property_access(&self, access: &PropertyAccessSyntax) -> Result<Operation> {
        let model = self.context.model;

        // myResource.<prop> where the base resolves to a declared resource.
        if let Some(resource) = model.try_lookup_resource(&access.base) {
            if model.resource(resource).as_declared().is_some() {
                let index_context =
                    self.try_get_replacement_context_for_resource(resource, None, access.id)?;
                return self.convert_resource_property_access(
                    resource,
                    index_context,
                    &access.property_name,
                );
            }

            // Parameter-sourced or module-output resources reached by name.
            if matches!(*access.base, Syntax::VariableAccess(_)) {
                return self.convert_resource_property_access(resource, None, &access.property_name);
            }
        }

        // myResources[i].<prop> over a declared collection.
        if let Syntax::ArrayAccess(array_access) = &*access.base {
            if let Some(resource) = model.try_lookup_resource(&array_access.base) {
                if let Some(declared) = model.resource(resource).as_declared() {
                    if declared.is_collection {
                        let index_context = self.try_get_replacement_context_for_resource(
                            resource,
                            Some(&array_access.index),
                            access.id,
                        )?;
                        return self.convert_resource_property_access(
                            resource,
                            index_context,
                            &access.property_name,
                        );
                    }
                }
            }
        }

        // (mod.outputs.<res>).<prop> where the output is a resource.
        if let Syntax::PropertyAccess(_) = &*access.base {
            if let Some(resource) = model.try_lookup_resource(&access.base) {
                if let ResourceMetadata::ModuleOutput(output) = model.resource(resource) {
                    let module = output.module;
                    if !model.module(module).is_collection {
                        return self.convert_resource_property_access(
                            resource,
                            None,
                            &access.property_name,
                        );
                    }

                    // (mods[i].outputs.<res>).<prop> over a module collection.
                    if let Syntax::PropertyAccess(child) = &*access.base {
                        if let Syntax::PropertyAccess(grandchild) = &*child.base {
                            if let Syntax::ArrayAccess(array_access) = &*grandchild.base {
                                let index_context = self.try_get_replacement_context(
                                    &model.module(module).name_syntax,
                                    Some(&array_access.index),
                                    access.id,
                                )?;
                                return self.convert_resource_property_access(
                                    resource,
                                    index_context,
                                    &access.property_name,
                                );
                            }
                        }
                    }
                }
            }
        }

        // myModule.name
        if let Some(Symbol::Module(module)) = model.symbol_for(&access.base) {
            let module = *module;
            let index_context = self.try_get_replacement_context(
                &model.module(module).name_syntax,
                None,
                access.id,
            )?;
            return self.convert_module_property_access(module, &access.property_name, index_context);
        }

        // myModules[i].name
        if let Syntax::ArrayAccess(array_access) = &*access.base {
            if let Some(Symbol::Module(module)) = model.symbol_for(&array_access.base) {
                let module = *module;
                if model.module(module).is_collection {
                    let index_context = self.try_get_replacement_context(
                        &model.module(module).name_syntax,
                        Some(&array_access.index),
                        access.id,
                    )?;
                    return self.convert_module_property_access(
                        module,
                        &access.property_name,
                        index_context,
                    );
                }
            }
        }

        // <base>.outputs.<prop> chains.
        if let Syntax::PropertyAccess(child) = &*access.base {
            if child.property_name == MODULE_OUTPUTS_PROPERTY {
                // An inlined variable that holds module outputs: access the
                // serialized output object's value envelope.
                if let Syntax::VariableAccess(variable_access) = &*child.base {
                    if let Some(symbol) = model.get_symbol_info(variable_access.id) {
                        if matches!(model.symbol(symbol), Symbol::Variable(_))
                            && self.context.should_inline(symbol)
                        {
                            return Ok(Operation::property_access(
                                Operation::property_access(
                                    self.convert_variable_access(variable_access)?,
                                    access.property_name.clone(),
                                ),
                                "value",
                            ));
                        }
                    }
                }

                if let Some(Symbol::Module(module)) = model.symbol_for(&child.base) {
                    let module = *module;
                    let index_context = self.try_get_replacement_context(
                        &model.module(module).name_syntax,
                        None,
                        access.id,
                    )?;
                    return Ok(self.create_module_output(
                        module,
                        index_context,
                        &access.property_name,
                    ));
                }

                if let Syntax::ArrayAccess(array_access) = &*child.base {
                    if let Some(Symbol::Module(module)) = model.symbol_for(&array_access.base) {
                        let module = *module;
                        let index_context = self.try_get_replacement_context(
                            &model.module(module).name_syntax,
                            Some(&array_access.index),
                            access.id,
                        )?;
                        return Ok(self.create_module_output(
                            module,
                            index_context,
                            &access.property_name,
                        ));
                    }
                }
            }
        }

        Ok(Operation::property_access(
            self.convert_expression_operation(&access.base)?,
            access.property_name.clone(),
        ))
    }

    fn convert_resource_property_access(
        &self,
        resource: ResourceMetadataId,
        index_context: Option<IndexReplacementContext>,
        property_name: &str,
    ) -> Result<Operation> {
        let metadata = self.context.model.resource(resource);

        if self.context.settings.enable_symbolic_names && metadata.as_declared().is_some() {
            if !metadata.is_az_resource() {
                // Extensibility resources have no id-addressable form; all
                // their properties come off the reference object.
                return Ok(Operation::property_access(
                    Operation::SymbolicResourceReference {
                        metadata: resource,
                        index_context: index_context.map(Box::new),
                        full: false,
                    },
                    property_name,
                ));
            }

            return Ok(match property_name {
                RESOURCE_ID_PROPERTY
                | RESOURCE_NAME_PROPERTY
                | RESOURCE_TYPE_PROPERTY
                | RESOURCE_API_VERSION_PROPERTY => Operation::property_access(
                    Operation::ResourceInfo {
                        metadata: resource,
                        index_context: index_context.map(Box::new),
                    },
                    property_name,
                ),
                RESOURCE_PROPERTIES_PROPERTY => Operation::SymbolicResourceReference {
                    metadata: resource,
                    index_context: index_context.map(Box::new),
                    full: false,
                },
                _ => Operation::property_access(
                    Operation::SymbolicResourceReference {
                        metadata: resource,
                        index_context: index_context.map(Box::new),
                        full: true,
                    },
                    property_name,
                ),
            });
        }

        Ok(match property_name {
            RESOURCE_ID_PROPERTY => Operation::ResourceId {
                metadata: resource,
                index_context: index_context.map(Box::new),
            },
            RESOURCE_NAME_PROPERTY => Operation::ResourceName {
                metadata: resource,
                index_context: index_context.map(Box::new),
                fully_qualified: false,
            },
            RESOURCE_TYPE_PROPERTY => Operation::ResourceType(resource),
            RESOURCE_API_VERSION_PROPERTY => Operation::ResourceApiVersion(resource),
            RESOURCE_PROPERTIES_PROPERTY => {
                // Existing and conditional resources cannot rely on an
                // implicit deployment-time reference; pin the API version.
                let include_api_version = metadata.is_existing_resource()
                    || metadata.as_declared().is_some_and(|d| d.has_condition);
                Operation::ResourceReference(Box::new(ResourceReferenceOperation {
                    metadata: resource,
                    resource_id: Operation::ResourceId {
                        metadata: resource,
                        index_context: index_context.map(Box::new),
                    },
                    full: false,
                    include_api_version,
                }))
            }
            _ => Operation::property_access(
                Operation::ResourceReference(Box::new(ResourceReferenceOperation {
                    metadata: resource,
                    resource_id: Operation::ResourceId {
                        metadata: resource,
                        index_context: index_context.map(Box::new),
                    },
                    full: true,
                    include_api_version: true,
                })),
                property_name,
            ),
        })
    }

    fn convert_module_property_access(
        &self,
        module: ModuleId,
        property_name: &str,
        index_context: Option<IndexReplacementContext>,
    ) -> Result<Operation> {
        match property_name {
            MODULE_NAME_PROPERTY => Ok(Operation::ModuleName {
                module,
                index_context: index_context.map(Box::new),
            }),
            _ => Err(EmitError::unsupported(format!(
                "property '{property_name}' of a module symbol",
            ))),
        }
    }

    fn create_module_output(
        &self,
        module: ModuleId,
        index_context: Option<IndexReplacementContext>,
        output_name: &str,
    ) -> Operation {
        Operation::ModuleOutput(Box::new(ModuleOutputOperation {
            module,
            index_context,
            property_name: Operation::constant(output_name.to_string()),
        }))
    }

    fn convert_variable_access(&self, access: &VariableAccessSyntax) -> Result<Operation> {
        let symbol_id = self.context.model.get_symbol_info(access.id).ok_or_else(|| {
            EmitError::unsupported(format!("unbound name '{}'", access.name))
        })?;

        match self.context.model.symbol(symbol_id) {
            Symbol::Parameter(parameter) => match parameter.resource {
                Some(resource) => Ok(self.get_resource_reference(resource, None)),
                None => Ok(Operation::ParameterAccess(symbol_id)),
            },
            Symbol::Variable(variable) => {
                if self.context.should_inline(symbol_id) {
                    self.convert_expression_operation(&variable.value)
                } else {
                    Ok(Operation::VariableAccess(symbol_id))
                }
            }
            Symbol::Resource(resource) => Ok(self.get_resource_reference(*resource, None)),
            Symbol::Module(module) => Ok(self.get_module_outputs_reference(*module, None)),
            Symbol::Local(_) => self.get_local_variable(symbol_id),
            Symbol::Namespace { name } => Err(EmitError::unsupported(format!(
                "namespace '{name}' used as a value",
            ))),
        }
    }

    fn get_resource_reference(
        &self,
        resource: ResourceMetadataId,
        index_context: Option<IndexReplacementContext>,
    ) -> Operation {
        let metadata = self.context.model.resource(resource);

        match (
            self.context.settings.enable_symbolic_names,
            metadata.as_declared(),
        ) {
            (true, Some(_)) => Operation::SymbolicResourceReference {
                metadata: resource,
                index_context: index_context.map(Box::new),
                full: true,
            },
            _ => Operation::ResourceReference(Box::new(ResourceReferenceOperation {
                metadata: resource,
                resource_id: Operation::ResourceId {
                    metadata: resource,
                    index_context: index_context.map(Box::new),
                },
                full: true,
                include_api_version: true,
            })),
        }
    }

    fn get_module_outputs_reference(
        &self,
        module: ModuleId,
        index_context: Option<IndexReplacementContext>,
    ) -> Operation {
        Operation::property_access(
            Operation::ModuleReference {
                module,
                index_context: index_context.map(Box::new),
            },
            MODULE_OUTPUTS_PROPERTY,
        )
    }

    fn get_enclosing_loop(&self, local: SymbolId) -> Result<LoopId> {
        match self.context.model.symbol(local) {
            Symbol::Local(local) => Ok(local.declaring_loop),
            other => Err(EmitError::unsupported(format!(
                "symbol '{}' is not a loop local",
                other.name(),
            ))),
        }
    }

    fn get_loop_variable(
        &self,
        local: SymbolId,
        for_loop: LoopId,
        index_operation: Operation,
    ) -> Result<Operation> {
        let kind = match self.context.model.symbol(local) {
            Symbol::Local(local) => local.kind,
            other => {
                return Err(EmitError::unsupported(format!(
                    "symbol '{}' is not a loop local",
                    other.name(),
                )));
            }
        };

        match kind {
            LocalKind::Index => Ok(index_operation),
            LocalKind::Item => {
                let loop_info = self.context.model.loop_info(for_loop);
                Ok(Operation::array_access(
                    self.convert_expression_operation(&loop_info.expression)?,
                    index_operation,
                ))
            }
        }
    }

    fn get_local_variable(&self, local: SymbolId) -> Result<Operation> {
        if let Some(replacement) = self.local_replacements.get(&local) {
            return Ok(replacement.clone());
        }

        // Still inside the declaring loop: the local resolves through the
        // runtime's loop-index function.
        let for_loop = self.get_enclosing_loop(local)?;
        let index = self.create_copy_index_function(for_loop);
        self.get_loop_variable(local, for_loop, index)
    }

    fn create_copy_index_function(&self, for_loop: LoopId) -> Operation {
        let loop_info = self.context.model.loop_info(for_loop);
        match loop_info.parent.copy_index_name() {
            None => Operation::function_call("copyIndex", Vec::new()),
            Some(name) => Operation::function_call("copyIndex", vec![Operation::constant(name)]),
        }
    }

    /// Renders a lowered operation as a target expression.
    pub fn convert_operation(&self, operation: &Operation) -> Result<TemplateExpression> {
        match operation {
            Operation::ConstantValue(ConstantValue::String(value)) => {
                Ok(TemplateExpression::string(value.clone()))
            }
            Operation::ConstantValue(ConstantValue::Int(value)) => {
                // The target parses 32-bit literals only; bigger magnitudes
                // round-trip through a json() call.
                if (i32::MIN as i64..=i32::MAX as i64).contains(value) {
                    Ok(TemplateExpression::int(*value))
                } else {
                    Ok(create_function(
                        "json",
                        vec![TemplateExpression::string(value.to_string())],
                    ))
                }
            }
            Operation::ConstantValue(ConstantValue::Bool(value)) => Ok(create_function(
                if *value { "true" } else { "false" },
                Vec::new(),
            )),
            Operation::NullValue => Ok(create_function("null", Vec::new())),
            Operation::PropertyAccess {
                base,
                property_name,
            } => Ok(append_properties(
                to_function_expression(self.convert_operation(base)?),
                vec![TemplateExpression::string(property_name.clone())],
            )),
            Operation::ArrayAccess { base, access } => Ok(append_properties(
                to_function_expression(self.convert_operation(base)?),
                vec![self.convert_operation(access)?],
            )),
            Operation::ResourceId {
                metadata,
                index_context,
            } => self
                .converter_for(index_context.as_deref())
                .get_fully_qualified_resource_id(*metadata),
            Operation::ResourceName {
                metadata,
                index_context,
                fully_qualified,
            } => {
                let converter = self.converter_for(index_context.as_deref());
                match fully_qualified {
                    true => converter.get_fully_qualified_resource_name(*metadata),
                    false => converter.get_unqualified_resource_name(*metadata),
                }
            }
            Operation::ResourceType(resource) => Ok(TemplateExpression::string(
                self.context.model.resource(*resource).type_reference().format_type(),
            )),
            Operation::ResourceApiVersion(resource) => {
                let api_version = self
                    .context
                    .model
                    .resource(*resource)
                    .type_reference()
                    .api_version
                    .clone()
                    .ok_or_else(|| {
                        EmitError::unsupported("API version access on a versionless resource")
                    })?;
                Ok(TemplateExpression::string(api_version))
            }
            Operation::ResourceInfo {
                metadata,
                index_context,
            } => {
                let symbol_name = self.declared_symbol_name(*metadata)?;
                Ok(create_function(
                    "resourceInfo",
                    vec![self.generate_symbolic_reference(&symbol_name, index_context.as_deref())?],
                ))
            }
            Operation::ResourceReference(reference) => {
                let resource_id = self.convert_operation(&reference.resource_id)?;
                let api_version = || {
                    self.context
                        .model
                        .resource(reference.metadata)
                        .type_reference()
                        .api_version
                        .clone()
                        .ok_or_else(|| {
                            EmitError::unsupported("reference to a versionless resource")
                        })
                };

                Ok(match (reference.full, reference.include_api_version) {
                    (true, _) => create_function(
                        "reference",
                        vec![
                            resource_id,
                            TemplateExpression::string(api_version()?),
                            TemplateExpression::string("full"),
                        ],
                    ),
                    (false, false) => create_function("reference", vec![resource_id]),
                    (false, true) => create_function(
                        "reference",
                        vec![resource_id, TemplateExpression::string(api_version()?)],
                    ),
                })
            }
            Operation::SymbolicResourceReference {
                metadata,
                index_context,
                full,
            } => {
                let symbol_name = self.declared_symbol_name(*metadata)?;
                let symbolic =
                    self.generate_symbolic_reference(&symbol_name, index_context.as_deref())?;
                let resource = self.context.model.resource(*metadata);

                if *full && resource.is_az_resource() {
                    let api_version =
                        resource.type_reference().api_version.clone().ok_or_else(|| {
                            EmitError::unsupported("reference to a versionless resource")
                        })?;
                    Ok(create_function(
                        "reference",
                        vec![
                            symbolic,
                            TemplateExpression::string(api_version),
                            TemplateExpression::string("full"),
                        ],
                    ))
                } else {
                    Ok(create_function("reference", vec![symbolic]))
                }
            }
            Operation::ModuleName {
                module,
                index_context,
            } => self
                .converter_for(index_context.as_deref())
                .get_module_name_expression(*module),
            Operation::ModuleReference {
                module,
                index_context,
            } => {
                let declaration = self.context.model.module(*module);

                if self.context.settings.enable_symbolic_names {
                    let symbolic = self
                        .generate_symbolic_reference(&declaration.name, index_context.as_deref())?;
                    return Ok(create_function("reference", vec![symbolic]));
                }

                let module_id = self
                    .converter_for(index_context.as_deref())
                    .get_fully_qualified_module_id(*module)?;

                // Conditional deployments need the API version pinned so the
                // reference resolves even when the deployment was skipped.
                if declaration.has_condition {
                    Ok(create_function(
                        "reference",
                        vec![
                            module_id,
                            TemplateExpression::string(NESTED_DEPLOYMENT_RESOURCE_API_VERSION),
                        ],
                    ))
                } else {
                    Ok(create_function("reference", vec![module_id]))
                }
            }
            Operation::ModuleOutput(output) => {
                let reference = self.convert_operation(&Operation::ModuleReference {
                    module: output.module,
                    index_context: output.index_context.clone().map(Box::new),
                })?;

                Ok(append_properties(
                    to_function_expression(reference),
                    vec![
                        TemplateExpression::string(MODULE_OUTPUTS_PROPERTY),
                        self.convert_operation(&output.property_name)?,
                        TemplateExpression::string("value"),
                    ],
                ))
            }
            Operation::VariableAccess(symbol) => Ok(create_function(
                "variables",
                vec![TemplateExpression::string(
                    self.context.model.symbol(*symbol).name(),
                )],
            )),
            Operation::ExplicitVariableAccess(name) => Ok(create_function(
                "variables",
                vec![TemplateExpression::string(name.clone())],
            )),
            Operation::ParameterAccess(symbol) => Ok(create_function(
                "parameters",
                vec![TemplateExpression::string(
                    self.context.model.symbol(*symbol).name(),
                )],
            )),
            Operation::FunctionCall { name, parameters } => {
                let parameters = parameters
                    .iter()
                    .map(|parameter| self.convert_operation(parameter))
                    .collect::<Result<Vec<_>>>()?;
                Ok(create_function(name.clone(), parameters))
            }
            Operation::Object(_)
            | Operation::ObjectProperty(_)
            | Operation::Array(_)
            | Operation::ForLoop(_)
            | Operation::GetKeyVaultSecret(_)
            | Operation::Output(_)
            | Operation::Parameter(_)
            | Operation::Import(_) => Err(EmitError::unsupported(
                "operation has no expression form and must be emitted structurally",
            )),
        }
    }

    /// Name segments passed to the id functions: one expression per type
    /// segment after the provider.
    pub fn get_resource_name_segments(
        &self,
        resource: ResourceMetadataId,
    ) -> Result<Vec<TemplateExpression>> {
        let declared = self
            .context
            .model
            .resource(resource)
            .as_declared()
            .ok_or_else(|| {
                EmitError::unsupported("name segments of a resource without a declaration")
            })?;
        let ancestors = self.context.model.get_ancestors(resource);
        let name_expression = self.convert_expression(&declared.name_syntax)?;
        let types_after_provider = declared.type_reference.types_after_provider();

        if !ancestors.is_empty() {
            // The root ancestor may cover several type segments when it was
            // declared with a multi-segment name.
            let first_ancestor_length = types_after_provider
                .len()
                .checked_sub(ancestors.len())
                .ok_or_else(|| {
                    EmitError::unsupported("ancestor chain longer than the resource type")
                })?;

            let mut segments = Vec::new();
            for i in 0..ancestors.len() {
                let ancestor_syntax = self.get_resource_name_ancestor_syntax_segment(resource, i)?;
                let ancestor_expression = self.convert_expression(&ancestor_syntax)?;

                if i == 0 && first_ancestor_length > 1 {
                    for j in 0..first_ancestor_length {
                        segments.push(split_segment(ancestor_expression.clone(), j));
                    }
                } else {
                    segments.push(ancestor_expression);
                }
            }

            segments.push(name_expression);
            return Ok(segments);
        }

        if types_after_provider.len() == 1 {
            return Ok(vec![name_expression]);
        }

        Ok((0..types_after_provider.len())
            .map(|i| split_segment(name_expression.clone(), i))
            .collect())
    }

    /// The resource's name parts at the syntax level, ancestors first. Used
    /// when the whole composed name must be relocated as one expression.
    pub fn get_resource_name_syntax_segments(
        &self,
        resource: ResourceMetadataId,
    ) -> Result<Vec<Syntax>> {
        let declared = self
            .context
            .model
            .resource(resource)
            .as_declared()
            .ok_or_else(|| {
                EmitError::unsupported("name segments of a resource without a declaration")
            })?;
        let ancestors = self.context.model.get_ancestors(resource);

        let mut segments = Vec::with_capacity(ancestors.len() + 1);
        for i in 0..ancestors.len() {
            segments.push(self.get_resource_name_ancestor_syntax_segment(resource, i)?);
        }
        segments.push(declared.name_syntax.clone());

        Ok(segments)
    }

    /// Rewrites the name expression of the ancestor at `starting_index` so it
    /// is valid in the binding scope of `resource` itself. Each level down the
    /// chain substitutes the locals that fall out of scope with the next
    /// level's parent index expression.
    fn get_resource_name_ancestor_syntax_segment(
        &self,
        resource: ResourceMetadataId,
        starting_index: usize,
    ) -> Result<Syntax> {
        let model = self.context.model;
        let ancestors = model.get_ancestors(resource);
        if starting_index >= ancestors.len() {
            return Err(EmitError::unsupported(format!(
                "resource has {} ancestors but the segment at index {starting_index} was requested",
                ancestors.len(),
            )));
        }

        let declared_name = |id: ResourceMetadataId| -> Result<&Syntax> {
            model.resource(id).as_declared().map(|d| &d.name_syntax).ok_or_else(|| {
                EmitError::unsupported("ancestor chain through a resource without a declaration")
            })
        };

        let mut rewritten = declared_name(ancestors[starting_index].resource)?.clone();

        for i in starting_index..ancestors.len() {
            let ancestor = &ancestors[i];

            // Replacement is performed in the scope of the next ancestor, or
            // of the resource itself on the last link.
            let new_context_resource = match i + 1 < ancestors.len() {
                true => ancestors[i + 1].resource,
                false => resource,
            };
            let new_context = declared_name(new_context_resource)?.node_id();

            let inaccessible_locals = self
                .context
                .data_flow
                .get_inaccessible_locals_after_move(&rewritten, new_context);
            let mut inaccessible_loops: IndexSet<LoopId> = IndexSet::new();
            for local in &inaccessible_locals {
                inaccessible_loops.insert(self.get_enclosing_loop(*local)?);
            }

            match (inaccessible_loops.len(), &ancestor.index_expression) {
                // Nothing to replace, and later levels cannot introduce
                // locals that the starting level referenced.
                (0, _) if i == starting_index => {
                    return Ok(declared_name(ancestor.resource)?.clone());
                }
                (1, Some(index_expression)) => {
                    // An item variable substituted at the previous level now
                    // dangles one loop deeper; it can only be resolved
                    // through this ancestor's index.
                    let item_dependencies: Vec<SymbolId> = self
                        .context
                        .data_flow
                        .get_local_symbol_dependencies(&rewritten)
                        .into_iter()
                        .filter(|symbol| {
                            matches!(
                                model.symbol(*symbol),
                                Symbol::Local(local) if local.kind == LocalKind::Item
                            )
                        })
                        .collect();

                    match item_dependencies.as_slice() {
                        [] => {}
                        [item] => {
                            let item_loop = self.get_enclosing_loop(*item)?;
                            let mut straggler = IndexMap::new();
                            straggler.insert(
                                *item,
                                factory::create_array_access(
                                    model.loop_info(item_loop).expression.clone(),
                                    index_expression.clone(),
                                ),
                            );
                            rewritten = replace_symbols(model, &straggler, &rewritten);
                        }
                        _ => return Err(EmitError::AmbiguousIndexReplacement),
                    }

                    let for_loop = inaccessible_loops[0];
                    let mut replacements = IndexMap::new();
                    for local in &inaccessible_locals {
                        let replacement = match model.symbol(*local) {
                            Symbol::Local(info) if info.kind == LocalKind::Index => {
                                index_expression.clone()
                            }
                            Symbol::Local(_) => factory::create_array_access(
                                model.loop_info(for_loop).expression.clone(),
                                index_expression.clone(),
                            ),
                            other => {
                                return Err(EmitError::unsupported(format!(
                                    "symbol '{}' is not a loop local",
                                    other.name(),
                                )));
                            }
                        };
                        replacements.insert(*local, replacement);
                    }

                    rewritten = replace_symbols(model, &replacements, &rewritten);
                }
                _ => return Err(EmitError::AmbiguousIndexReplacement),
            }
        }

        Ok(rewritten)
    }

    pub fn get_fully_qualified_resource_name(
        &self,
        resource: ResourceMetadataId,
    ) -> Result<TemplateExpression> {
        let metadata = self.context.model.resource(resource);
        let declared = match metadata.as_declared() {
            Some(declared) => declared,
            // No expression exists for the full name of an external resource.
            None => return self.get_unqualified_resource_name(resource),
        };

        let ancestors = self.context.model.get_ancestors(resource);
        if ancestors.is_empty() {
            return self.convert_expression(&declared.name_syntax);
        }

        // '{0}/{1}/...' joined over the composed name segments.
        let segments = self.get_resource_name_segments(resource)?;
        let format_string = (0..segments.len())
            .map(|i| format!("{{{i}}}"))
            .collect::<Vec<_>>()
            .join("/");

        let mut parameters = vec![TemplateExpression::string(format_string)];
        parameters.extend(segments);
        Ok(create_function("format", parameters))
    }

    pub fn get_unqualified_resource_name(
        &self,
        resource: ResourceMetadataId,
    ) -> Result<TemplateExpression> {
        match self.context.model.resource(resource).as_declared() {
            Some(declared) => self.convert_expression(&declared.name_syntax),
            None => {
                // The last id segment is the resource's own name.
                let id = self.get_fully_qualified_resource_id(resource)?;
                Ok(create_function(
                    "last",
                    vec![create_function(
                        "split",
                        vec![id, TemplateExpression::string("/")],
                    )],
                ))
            }
        }
    }

    pub fn get_fully_qualified_resource_id(
        &self,
        resource: ResourceMetadataId,
    ) -> Result<TemplateExpression> {
        match self.context.model.resource(resource) {
            ResourceMetadata::Parameter(parameter) => {
                self.convert_operation(&Operation::ParameterAccess(parameter.symbol))
            }
            ResourceMetadata::ModuleOutput(output) => self
                .convert_operation(&Operation::ModuleOutput(Box::new(ModuleOutputOperation {
                    module: output.module,
                    index_context: None,
                    property_name: Operation::constant(output.output_name.clone()),
                }))),
            ResourceMetadata::Declared(declared) => {
                let scope_data = self.context.resource_scope(resource);
                let extension_scope = self.resolve_extension_scope(scope_data)?;
                scope::format_fully_qualified_resource_id(
                    scope_data,
                    extension_scope,
                    &declared.type_reference.format_type(),
                    self.get_resource_name_segments(resource)?,
                )
            }
        }
    }

    /// Id usable only within the deployment that declares the resource.
    pub fn get_unqualified_resource_id(
        &self,
        resource: ResourceMetadataId,
    ) -> Result<TemplateExpression> {
        let declared = self
            .context
            .model
            .resource(resource)
            .as_declared()
            .ok_or_else(|| {
                EmitError::unsupported("unqualified id of a resource without a declaration")
            })?;

        Ok(scope::unqualified_resource_id(
            &declared.type_reference.format_type(),
            self.get_resource_name_segments(resource)?,
        ))
    }

    pub fn get_fully_qualified_module_id(&self, module: ModuleId) -> Result<TemplateExpression> {
        let scope_data = self.context.module_scope(module);
        let extension_scope = self.resolve_extension_scope(scope_data)?;
        scope::format_fully_qualified_resource_id(
            scope_data,
            extension_scope,
            NESTED_DEPLOYMENT_RESOURCE_TYPE,
            vec![self.get_module_name_expression(module)?],
        )
    }

    pub fn get_module_name_expression(&self, module: ModuleId) -> Result<TemplateExpression> {
        self.convert_expression(&self.context.model.module(module).name_syntax)
    }

    pub fn generate_management_group_resource_id(
        &self,
        name_syntax: &Syntax,
        fully_qualified: bool,
    ) -> Result<TemplateExpression> {
        let name = self.convert_expression(name_syntax)?;
        Ok(scope::management_group_resource_id(name, fully_qualified))
    }

    /// A symbolic name, indexed when the declaration is a collection:
    /// `format('{name}[{0}]', <index>)`.
    pub fn generate_symbolic_reference(
        &self,
        symbol_name: &str,
        index_context: Option<&IndexReplacementContext>,
    ) -> Result<TemplateExpression> {
        match index_context {
            None => Ok(TemplateExpression::string(symbol_name)),
            Some(context) => Ok(create_function(
                "format",
                vec![
                    TemplateExpression::string(format!("{symbol_name}[{{0}}]")),
                    self.convert_operation(&context.index)?,
                ],
            )),
        }
    }

    fn resolve_extension_scope(
        &self,
        scope_data: &ScopeData,
    ) -> Result<Option<TemplateExpression>> {
        match scope_data {
            ScopeData::Extension { scope_resource } => {
                Ok(Some(self.get_fully_qualified_resource_id(*scope_resource)?))
            }
            _ => Ok(None),
        }
    }

    fn declared_symbol_name(&self, resource: ResourceMetadataId) -> Result<String> {
        self.context
            .model
            .resource(resource)
            .as_declared()
            .map(|declared| declared.symbol_name.clone())
            .ok_or_else(|| {
                EmitError::unsupported("symbolic reference to a resource without a declaration")
            })
    }
}

fn convert_integer(value: u64) -> Result<Operation> {
    if value > i64::MAX as u64 {
        return Err(EmitError::IntegerOverflow(value));
    }

    Ok(Operation::constant(value as i64))
}

fn escape_format_segment(segment: &str) -> String {
    segment.replace('{', "{{").replace('}', "}}")
}

/// Literal operands get coerced so property/index accesses always hang off a
/// function invocation.
pub(crate) fn to_function_expression(expression: TemplateExpression) -> FunctionExpression {
    match expression {
        TemplateExpression::Function(function) => function,
        TemplateExpression::Literal(TemplateValue::String(value)) => FunctionExpression {
            name: "string".to_string(),
            parameters: vec![TemplateExpression::string(value)],
            properties: Vec::new(),
        },
        TemplateExpression::Literal(TemplateValue::Int(value)) => FunctionExpression {
            name: "int".to_string(),
            parameters: vec![TemplateExpression::int(value)],
            properties: Vec::new(),
        },
    }
}

fn split_segment(name: TemplateExpression, index: usize) -> TemplateExpression {
    let split = FunctionExpression {
        name: "split".to_string(),
        parameters: vec![name, TemplateExpression::string("/")],
        properties: Vec::new(),
    };

    append_properties(split, vec![TemplateExpression::int(index as i64)])
}
