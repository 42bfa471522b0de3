//! The lowered-expression intermediate representation.
//!
//! Every source expression that reaches the emitter is first converted into
//! an `Operation` tree. Operations are fully lowered — no unresolved syntax
//! ever appears below one — and are constructed once, then either converted
//! into a target expression or written out directly.

use indexmap::IndexMap;

use crate::semantics::metadata::ResourceMetadataId;
use crate::semantics::{ModuleId, SymbolId};

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl From<bool> for ConstantValue {
    fn from(value: bool) -> Self {
        ConstantValue::Bool(value)
    }
}

impl From<i64> for ConstantValue {
    fn from(value: i64) -> Self {
        ConstantValue::Int(value)
    }
}

impl From<&str> for ConstantValue {
    fn from(value: &str) -> Self {
        ConstantValue::String(value.to_string())
    }
}

impl From<String> for ConstantValue {
    fn from(value: String) -> Self {
        ConstantValue::String(value)
    }
}

/// Substitutions applied when an expression is evaluated away from its
/// declaration site: loop locals map to index-derived operations, and the
/// relocated position's own index is `index`.
#[derive(Debug, Clone)]
pub struct IndexReplacementContext {
    pub local_replacements: IndexMap<SymbolId, Operation>,
    pub index: Operation,
}

#[derive(Debug, Clone)]
pub struct ObjectPropertyOperation {
    pub key: Operation,
    pub value: Operation,
}

#[derive(Debug, Clone)]
pub struct ForLoopOperation {
    /// The loop's source array.
    pub expression: Operation,
    pub body: Operation,
}

#[derive(Debug, Clone)]
pub struct ResourceReferenceOperation {
    pub metadata: ResourceMetadataId,
    pub resource_id: Operation,
    pub full: bool,
    pub include_api_version: bool,
}

#[derive(Debug, Clone)]
pub struct GetKeyVaultSecretOperation {
    pub resource_id: Operation,
    pub secret_name: Operation,
    pub secret_version: Option<Operation>,
}

#[derive(Debug, Clone)]
pub struct ModuleOutputOperation {
    pub module: ModuleId,
    pub index_context: Option<IndexReplacementContext>,
    pub property_name: Operation,
}

#[derive(Debug, Clone)]
pub struct OutputOperation {
    pub name: String,
    pub output_type: String,
    pub value: Operation,
    pub additional_properties: Vec<Operation>,
}

#[derive(Debug, Clone)]
pub struct ParameterOperation {
    pub name: String,
    pub additional_properties: Vec<Operation>,
}

#[derive(Debug, Clone)]
pub struct ImportOperation {
    pub alias_name: String,
    pub provider_name: String,
    pub provider_version: String,
    pub config: Option<Operation>,
}

#[derive(Debug, Clone)]
pub enum Operation {
    ConstantValue(ConstantValue),
    NullValue,
    Object(Vec<ObjectPropertyOperation>),
    ObjectProperty(Box<ObjectPropertyOperation>),
    Array(Vec<Operation>),
    ForLoop(Box<ForLoopOperation>),
    PropertyAccess {
        base: Box<Operation>,
        property_name: String,
    },
    ArrayAccess {
        base: Box<Operation>,
        access: Box<Operation>,
    },
    VariableAccess(SymbolId),
    ExplicitVariableAccess(String),
    ParameterAccess(SymbolId),
    ResourceId {
        metadata: ResourceMetadataId,
        index_context: Option<Box<IndexReplacementContext>>,
    },
    ResourceName {
        metadata: ResourceMetadataId,
        index_context: Option<Box<IndexReplacementContext>>,
        fully_qualified: bool,
    },
    ResourceType(ResourceMetadataId),
    ResourceApiVersion(ResourceMetadataId),
    ResourceReference(Box<ResourceReferenceOperation>),
    SymbolicResourceReference {
        metadata: ResourceMetadataId,
        index_context: Option<Box<IndexReplacementContext>>,
        full: bool,
    },
    ResourceInfo {
        metadata: ResourceMetadataId,
        index_context: Option<Box<IndexReplacementContext>>,
    },
    ModuleName {
        module: ModuleId,
        index_context: Option<Box<IndexReplacementContext>>,
    },
    ModuleReference {
        module: ModuleId,
        index_context: Option<Box<IndexReplacementContext>>,
    },
    ModuleOutput(Box<ModuleOutputOperation>),
    FunctionCall {
        name: String,
        parameters: Vec<Operation>,
    },
    GetKeyVaultSecret(Box<GetKeyVaultSecretOperation>),
    Output(Box<OutputOperation>),
    Parameter(ParameterOperation),
    Import(Box<ImportOperation>),
}

impl Operation {
    pub fn constant(value: impl Into<ConstantValue>) -> Operation {
        Operation::ConstantValue(value.into())
    }

    pub fn function_call(name: impl Into<String>, parameters: Vec<Operation>) -> Operation {
        Operation::FunctionCall {
            name: name.into(),
            parameters,
        }
    }

    pub fn property_access(base: Operation, property_name: impl Into<String>) -> Operation {
        Operation::PropertyAccess {
            base: Box::new(base),
            property_name: property_name.into(),
        }
    }

    pub fn array_access(base: Operation, access: Operation) -> Operation {
        Operation::ArrayAccess {
            base: Box::new(base),
            access: Box::new(access),
        }
    }
}
