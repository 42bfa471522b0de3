//! Structural emission of operations into the template document.
//!
//! The emitter owns the split between native JSON and expression strings:
//! booleans, integers, nulls, objects and arrays are written as JSON tokens,
//! loops become copy objects, and everything else is serialized as a
//! bracketed expression string through the converter.

use std::collections::HashSet;
use std::io::Write;

use once_cell::sync::Lazy;

use crate::emit::converter::{to_function_expression, ExpressionConverter};
use crate::emit::{EmitError, EmitterContext, Result, ANY_FUNCTION};
use crate::operations::{
    ConstantValue, ForLoopOperation, ImportOperation, ObjectPropertyOperation, Operation,
    OutputOperation, ParameterOperation,
};
use crate::semantics::metadata::ResourceMetadataId;
use crate::semantics::{ModuleId, Symbol};
use crate::syntax::{factory, NodeId, ObjectSyntax, PropertyKey, Syntax};
use crate::template::expression::{create_function, rewrite_copy_index_arguments, TemplateExpression};
use crate::template::serializer::{
    ExpressionSerializer, ExpressionSerializerSettings, SingleStringHandling,
};
use crate::template::JsonWriter;

static SERIALIZER: Lazy<ExpressionSerializer> = Lazy::new(|| {
    ExpressionSerializer::new(ExpressionSerializerSettings {
        include_outer_square_brackets: true,
        // lone string literals become plain JSON strings, not "['...']"
        single_string_handling: SingleStringHandling::SerializeAsString,
    })
});

pub struct ExpressionEmitter<'a, W: Write> {
    writer: &'a mut JsonWriter<W>,
    context: &'a EmitterContext<'a>,
    converter: ExpressionConverter<'a>,
}

impl<'a, W: Write> ExpressionEmitter<'a, W> {
    pub fn new(writer: &'a mut JsonWriter<W>, context: &'a EmitterContext<'a>) -> Self {
        ExpressionEmitter {
            writer,
            context,
            converter: ExpressionConverter::new(context),
        }
    }

    /// Lowers a value position, keeping objects, arrays and loops structural
    /// so they can be written as JSON instead of expression strings.
    pub fn get_expression_operation(&self, syntax: &Syntax) -> Result<Operation> {
        if let Syntax::VariableAccess(access) = syntax {
            if let Some(symbol) = self.context.model.get_symbol_info(access.id) {
                if let Symbol::Variable(variable) = self.context.model.symbol(symbol) {
                    if self.context.should_inline(symbol) {
                        return self.get_expression_operation(&variable.value);
                    }
                }
            }
        }

        // The outermost type-erasure call unwraps here so its argument keeps
        // its structural form instead of being forced into an expression.
        if let Syntax::FunctionCall(call) = syntax {
            if call.name == ANY_FUNCTION {
                return match call.arguments.as_slice() {
                    [argument] => self.get_expression_operation(argument),
                    _ => Err(EmitError::unsupported(
                        "the type-erasure function takes exactly one argument",
                    )),
                };
            }
        }

        match syntax {
            Syntax::Parenthesized(inner) => self.get_expression_operation(&inner.expression),
            Syntax::Object(object) => Ok(Operation::Object(self.get_property_operations(object, None)?)),
            Syntax::Array(array) => {
                let items = array
                    .items
                    .iter()
                    .map(|item| self.get_expression_operation(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Operation::Array(items))
            }
            Syntax::For(for_syntax) => Ok(Operation::ForLoop(Box::new(ForLoopOperation {
                expression: self.get_expression_operation(&for_syntax.expression)?,
                body: self.get_expression_operation(&for_syntax.body)?,
            }))),
            other => self.converter.convert_expression_operation(other),
        }
    }

    pub fn emit_expression(&mut self, syntax: &Syntax) -> Result<()> {
        let operation = self.get_expression_operation(syntax)?;
        self.emit_operation(&operation)
    }

    /// Emits an expression valid at a different template position, replacing
    /// loop locals through the given index expression.
    pub fn emit_relocated_expression(
        &mut self,
        syntax: &Syntax,
        index_expression: Option<&Syntax>,
        new_context: NodeId,
    ) -> Result<()> {
        let converter = self.converter.create_converter_for_index_replacement(
            syntax,
            index_expression,
            new_context,
        )?;

        let expression = converter.convert_expression(syntax)?;
        self.write_expression(&expression)
    }

    pub fn emit_operation(&mut self, operation: &Operation) -> Result<()> {
        match operation {
            Operation::ConstantValue(ConstantValue::Bool(value)) => {
                self.writer.write_bool(*value)?;
            }
            Operation::ConstantValue(ConstantValue::Int(value)) => {
                self.writer.write_int(*value)?;
            }
            Operation::NullValue => {
                self.writer.write_null()?;
            }
            Operation::Object(properties) => {
                self.writer.write_start_object()?;
                self.emit_property_operations(properties)?;
                self.writer.write_end_object()?;
            }
            Operation::ObjectProperty(property) => {
                self.emit_property_operation(&property.key, &property.value)?;
            }
            Operation::Array(items) => {
                self.writer.write_start_array()?;
                for item in items {
                    self.emit_operation(item)?;
                }
                self.writer.write_end_array()?;
            }
            Operation::GetKeyVaultSecret(secret) => {
                self.emit_property_name("reference")?;
                self.writer.write_start_object()?;

                self.emit_property_name("keyVault")?;
                self.writer.write_start_object()?;
                self.emit_property("id", &secret.resource_id)?;
                self.writer.write_end_object()?;

                self.emit_property("secretName", &secret.secret_name)?;
                if let Some(version) = &secret.secret_version {
                    self.emit_property("secretVersion", version)?;
                }

                self.writer.write_end_object()?;
            }
            Operation::Output(output) => self.emit_output(output)?,
            Operation::Parameter(parameter) => self.emit_parameter(parameter)?,
            Operation::Import(import) => self.emit_import(import)?,
            other => self.emit_language_operation(other)?,
        }

        Ok(())
    }

    fn emit_output(&mut self, output: &OutputOperation) -> Result<()> {
        self.emit_property_name(&output.name)?;
        self.writer.write_start_object()?;

        self.emit_property_string("type", &output.output_type)?;
        match &output.value {
            Operation::ForLoop(for_loop) => {
                self.emit_property_name("copy")?;
                self.emit_copy_object(None, for_loop, Some(&for_loop.body), false, None)?;
            }
            value => self.emit_property("value", value)?,
        }

        for property in &output.additional_properties {
            self.emit_operation(property)?;
        }

        self.writer.write_end_object()?;
        Ok(())
    }

    fn emit_parameter(&mut self, parameter: &ParameterOperation) -> Result<()> {
        self.emit_property_name(&parameter.name)?;
        self.writer.write_start_object()?;

        for property in &parameter.additional_properties {
            self.emit_operation(property)?;
        }

        self.writer.write_end_object()?;
        Ok(())
    }

    fn emit_import(&mut self, import: &ImportOperation) -> Result<()> {
        self.emit_property_name(&import.alias_name)?;
        self.writer.write_start_object()?;

        self.emit_property_string("provider", &import.provider_name)?;
        self.emit_property_string("version", &import.provider_version)?;
        if let Some(config) = &import.config {
            self.emit_property("config", config)?;
        }

        self.writer.write_end_object()?;
        Ok(())
    }

    fn emit_language_operation(&mut self, operation: &Operation) -> Result<()> {
        // "[42]" would be valid but is pointless; write the token directly.
        if let Operation::ConstantValue(ConstantValue::Int(value)) = operation {
            self.writer.write_int(*value)?;
            return Ok(());
        }

        let converted = self.converter.convert_operation(operation)?;
        self.write_expression(&converted)
    }

    /// Writes one copy object: count, optional serial batching, and the
    /// per-iteration input.
    pub fn emit_copy_object(
        &mut self,
        name: Option<&str>,
        for_loop: &ForLoopOperation,
        input: Option<&Operation>,
        rewrite_copy_index: bool,
        batch_size: Option<i64>,
    ) -> Result<()> {
        // The deployment engine only accepts strings and objects as copy
        // input; everything else goes through expression serialization.
        fn can_emit_as_input_directly(input: &Operation) -> bool {
            matches!(input, Operation::Object(_) | Operation::ConstantValue(_))
        }

        self.writer.write_start_object()?;

        if let Some(name) = name {
            self.emit_property_string("name", name)?;
        }

        self.emit_property_with_transform("count", &for_loop.expression, |array_expression| {
            create_function("length", vec![array_expression])
        })?;

        if let Some(batch_size) = batch_size {
            self.emit_property_string("mode", "serial")?;
            self.emit_property_name("batchSize")?;
            self.writer.write_int(batch_size)?;
        }

        if let Some(input) = input {
            let direct = can_emit_as_input_directly(input);
            if !rewrite_copy_index {
                if direct {
                    self.emit_property("input", input)?;
                } else {
                    self.emit_property_with_transform("input", input, |converted| {
                        TemplateExpression::Function(to_function_expression(converted))
                    })?;
                }
            } else {
                // The emitted JSON wraps values in { "value": ... } envelopes
                // the source shape does not have, so named loop-index lookups
                // must be redirected to the envelope's fixed name.
                self.emit_property_with_transform("input", input, move |converted| {
                    let mut expression = match direct {
                        true => converted,
                        false => TemplateExpression::Function(to_function_expression(converted)),
                    };
                    rewrite_copy_index_arguments(&mut expression);
                    expression
                })?;
            }
        }

        self.writer.write_end_object()?;
        Ok(())
    }

    /// Emits the properties of an object syntax into the currently open JSON
    /// object, optionally omitting named properties handled elsewhere.
    pub fn emit_object_properties(
        &mut self,
        object: &ObjectSyntax,
        properties_to_omit: Option<&HashSet<String>>,
    ) -> Result<()> {
        let properties = self.get_property_operations(object, properties_to_omit)?;
        self.emit_property_operations(&properties)
    }

    fn get_property_operations(
        &self,
        object: &ObjectSyntax,
        properties_to_omit: Option<&HashSet<String>>,
    ) -> Result<Vec<ObjectPropertyOperation>> {
        let mut properties = Vec::new();
        for property in &object.properties {
            if let (Some(key), Some(omit)) = (property.try_get_key_text(), properties_to_omit) {
                if omit.contains(key) {
                    continue;
                }
            }

            let key = match property.try_get_key_text() {
                Some(text) => Operation::constant(text.to_string()),
                None => match &property.key {
                    PropertyKey::String(key) => self
                        .converter
                        .convert_expression_operation(&Syntax::String(key.clone()))?,
                    PropertyKey::Identifier(name) => Operation::constant(name.clone()),
                },
            };

            properties.push(ObjectPropertyOperation {
                key,
                value: self.get_expression_operation(&property.value)?,
            });
        }

        Ok(properties)
    }

    /// Loop-valued properties are grouped into one "copy" array up front; the
    /// rest emit in declaration order.
    fn emit_property_operations(&mut self, properties: &[ObjectPropertyOperation]) -> Result<()> {
        let has_loops = properties
            .iter()
            .any(|property| matches!(property.value, Operation::ForLoop(_)));

        if has_loops {
            self.emit_property_name("copy")?;
            self.writer.write_start_array()?;

            for property in properties {
                if let Operation::ForLoop(for_loop) = &property.value {
                    let name = match &property.key {
                        Operation::ConstantValue(ConstantValue::String(name)) => name.clone(),
                        _ => {
                            // caught by loop emit limitation checks upstream
                            return Err(EmitError::unsupported(
                                "a property loop requires a compile-time key",
                            ));
                        }
                    };

                    self.emit_copy_object(Some(&name), for_loop, Some(&for_loop.body), false, None)?;
                }
            }

            self.writer.write_end_array()?;
        }

        for property in properties {
            if matches!(property.value, Operation::ForLoop(_)) {
                continue;
            }

            self.emit_property_operation(&property.key, &property.value)?;
        }

        Ok(())
    }

    fn emit_property_operation(&mut self, key: &Operation, value: &Operation) -> Result<()> {
        match key {
            Operation::ConstantValue(ConstantValue::String(name)) => {
                self.emit_property_name(name)?;
            }
            expression_key => {
                let converted = self.converter.convert_operation(expression_key)?;
                self.writer
                    .write_property_name(&SERIALIZER.serialize_expression(&converted))?;
            }
        }

        self.emit_operation(value)
    }

    /// Module parameters are wrapped in a value envelope, except key vault
    /// secret references which carry their own reference object.
    pub fn emit_module_parameter_value(&mut self, syntax: &Syntax) -> Result<()> {
        let operation = self.get_expression_operation(syntax)?;
        match operation {
            secret @ Operation::GetKeyVaultSecret(_) => self.emit_operation(&secret),
            value => self.emit_operation(&Operation::ObjectProperty(Box::new(
                ObjectPropertyOperation {
                    key: Operation::constant("value"),
                    value,
                },
            ))),
        }
    }

    pub fn emit_unqualified_resource_id(
        &mut self,
        resource: ResourceMetadataId,
        index_expression: Option<&Syntax>,
        new_context: NodeId,
    ) -> Result<()> {
        let converter = self.converter_for_resource_name(resource, index_expression, new_context)?;
        let id = converter.get_unqualified_resource_id(resource)?;
        self.write_expression(&id)
    }

    /// Writes a symbolic reference to a resource, indexed when it is part of
    /// a collection.
    pub fn emit_indexed_symbol_reference(
        &mut self,
        resource: ResourceMetadataId,
        index_expression: Option<&Syntax>,
        new_context: NodeId,
    ) -> Result<()> {
        let symbol_name = self.declared_symbol_name(resource)?;
        let index_context = self.converter.try_get_replacement_context_for_resource(
            resource,
            index_expression,
            new_context,
        )?;
        let expression = self
            .converter
            .generate_symbolic_reference(&symbol_name, index_context.as_ref())?;

        self.write_expression(&expression)
    }

    pub fn emit_indexed_module_reference(
        &mut self,
        module: ModuleId,
        index_expression: Option<&Syntax>,
        new_context: NodeId,
    ) -> Result<()> {
        let declaration = self.context.model.module(module);
        let index_context = self.converter.try_get_replacement_context(
            &declaration.name_syntax,
            index_expression,
            new_context,
        )?;
        let expression = self
            .converter
            .generate_symbolic_reference(&declaration.name, index_context.as_ref())?;

        self.write_expression(&expression)
    }

    /// Writes a resource's fully qualified id, relocating the whole composed
    /// name so loop locals resolve at the new position.
    pub fn emit_resource_id_reference(
        &mut self,
        resource: ResourceMetadataId,
        index_expression: Option<&Syntax>,
        new_context: NodeId,
    ) -> Result<()> {
        let converter = self.converter_for_resource_name(resource, index_expression, new_context)?;
        let id = converter.get_fully_qualified_resource_id(resource)?;
        self.write_expression(&id)
    }

    pub fn emit_module_id_reference(
        &mut self,
        module: ModuleId,
        index_expression: Option<&Syntax>,
        new_context: NodeId,
    ) -> Result<()> {
        let converter = self.converter.create_converter_for_index_replacement(
            &self.context.model.module(module).name_syntax,
            index_expression,
            new_context,
        )?;
        let id = converter.get_fully_qualified_module_id(module)?;
        self.write_expression(&id)
    }

    pub fn get_fully_qualified_resource_name(
        &self,
        resource: ResourceMetadataId,
    ) -> Result<TemplateExpression> {
        self.converter.get_fully_qualified_resource_name(resource)
    }

    pub fn get_management_group_resource_id(
        &self,
        name_syntax: &Syntax,
        index_expression: Option<&Syntax>,
        new_context: NodeId,
        fully_qualified: bool,
    ) -> Result<TemplateExpression> {
        let converter = self.converter.create_converter_for_index_replacement(
            name_syntax,
            index_expression,
            new_context,
        )?;
        converter.generate_management_group_resource_id(name_syntax, fully_qualified)
    }

    pub fn emit_property(&mut self, name: &str, operation: &Operation) -> Result<()> {
        self.emit_property_name(name)?;
        self.emit_operation(operation)
    }

    pub fn emit_property_string(&mut self, name: &str, value: &str) -> Result<()> {
        self.emit_property_name(name)?;
        self.writer
            .write_string(&SERIALIZER.serialize_expression(&TemplateExpression::string(value)))?;
        Ok(())
    }

    pub fn emit_property_syntax(&mut self, name: &str, value: &Syntax) -> Result<()> {
        self.emit_property_name(name)?;
        self.emit_expression(value)
    }

    pub fn emit_optional_property_syntax(&mut self, name: &str, value: Option<&Syntax>) -> Result<()> {
        match value {
            Some(value) => self.emit_property_syntax(name, value),
            None => Ok(()),
        }
    }

    pub fn emit_property_expression(
        &mut self,
        name: &str,
        expression: &TemplateExpression,
    ) -> Result<()> {
        self.emit_property_name(name)?;
        self.write_expression(expression)
    }

    pub fn emit_property_with_transform(
        &mut self,
        name: &str,
        operation: &Operation,
        transform: impl FnOnce(TemplateExpression) -> TemplateExpression,
    ) -> Result<()> {
        self.emit_property_name(name)?;
        let converted = self.converter.convert_operation(operation)?;
        self.write_expression(&transform(converted))
    }

    /// Relocates the full composed name of a resource and derives a converter
    /// valid at the new position.
    fn converter_for_resource_name(
        &self,
        resource: ResourceMetadataId,
        index_expression: Option<&Syntax>,
        new_context: NodeId,
    ) -> Result<ExpressionConverter<'a>> {
        let name_components =
            factory::create_array(self.converter.get_resource_name_syntax_segments(resource)?);
        self.converter.create_converter_for_index_replacement(
            &name_components,
            index_expression,
            new_context,
        )
    }

    fn emit_property_name(&mut self, name: &str) -> Result<()> {
        // Property names take the same serialization path as values so that
        // expression-like names get the bracket escape.
        let serialized = SERIALIZER.serialize_expression(&TemplateExpression::string(name));
        self.writer.write_property_name(&serialized)?;
        Ok(())
    }

    fn write_expression(&mut self, expression: &TemplateExpression) -> Result<()> {
        self.writer
            .write_string(&SERIALIZER.serialize_expression(expression))?;
        Ok(())
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
