//! Resource and module metadata resolved by the upstream type system.

use crate::semantics::{ModuleId, SymbolId};
use crate::syntax::Syntax;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceMetadataId(pub usize);

/// A fully-qualified resource type plus its selected API version, e.g.
/// `My.Rp/stores/containers@2023-01-01`.
#[derive(Debug, Clone)]
pub struct TypeReference {
    /// `["My.Rp", "stores", "containers"]` — provider first.
    pub segments: Vec<String>,
    pub api_version: Option<String>,
}

impl TypeReference {
    pub fn new(qualified_type: &str, api_version: Option<&str>) -> Self {
        TypeReference {
            segments: qualified_type.split('/').map(str::to_string).collect(),
            api_version: api_version.map(str::to_string),
        }
    }

    /// The type without the API version: `My.Rp/stores/containers`.
    pub fn format_type(&self) -> String {
        self.segments.join("/")
    }

    pub fn format_name(&self) -> String {
        match &self.api_version {
            Some(version) => format!("{}@{}", self.format_type(), version),
            None => self.format_type(),
        }
    }

    /// Type segments after the provider segment.
    pub fn types_after_provider(&self) -> &[String] {
        &self.segments[1..]
    }
}

/// Deployment scope a resource or module is assigned to.
#[derive(Debug, Clone, Default)]
pub enum ScopeData {
    #[default]
    ResourceGroup,
    Subscription,
    ManagementGroup,
    Tenant,
    /// Scoped to another resource; id construction needs that resource's
    /// fully qualified id as the scope argument.
    Extension { scope_resource: ResourceMetadataId },
}

/// A resource declared in the current file.
#[derive(Debug, Clone)]
pub struct DeclaredResourceMetadata {
    pub symbol_name: String,
    pub type_reference: TypeReference,
    /// False for extensibility resources, which are only addressable through
    /// references.
    pub is_az_resource: bool,
    /// Declared with the `existing` modifier.
    pub is_existing: bool,
    pub is_collection: bool,
    pub has_condition: bool,
    /// The declared `name` property value.
    pub name_syntax: Syntax,
    /// The declaration identifier as a name expression, used when symbolic
    /// name emission addresses the resource by symbol.
    pub symbol_name_syntax: Syntax,
}

/// A pre-existing resource whose id arrived through a parameter.
#[derive(Debug, Clone)]
pub struct ParameterResourceMetadata {
    pub symbol: SymbolId,
    pub type_reference: TypeReference,
    pub is_az_resource: bool,
}

/// A resource surfaced as the output of a module.
#[derive(Debug, Clone)]
pub struct ModuleOutputResourceMetadata {
    pub module: ModuleId,
    pub output_name: String,
    pub type_reference: TypeReference,
    pub is_az_resource: bool,
}

#[derive(Debug, Clone)]
pub enum ResourceMetadata {
    Declared(DeclaredResourceMetadata),
    Parameter(ParameterResourceMetadata),
    ModuleOutput(ModuleOutputResourceMetadata),
}

impl ResourceMetadata {
    pub fn type_reference(&self) -> &TypeReference {
        match self {
            ResourceMetadata::Declared(r) => &r.type_reference,
            ResourceMetadata::Parameter(r) => &r.type_reference,
            ResourceMetadata::ModuleOutput(r) => &r.type_reference,
        }
    }

    pub fn is_az_resource(&self) -> bool {
        match self {
            ResourceMetadata::Declared(r) => r.is_az_resource,
            ResourceMetadata::Parameter(r) => r.is_az_resource,
            ResourceMetadata::ModuleOutput(r) => r.is_az_resource,
        }
    }

    /// True for resources that already exist outside this deployment.
    pub fn is_existing_resource(&self) -> bool {
        match self {
            ResourceMetadata::Declared(r) => r.is_existing,
            ResourceMetadata::Parameter(_) | ResourceMetadata::ModuleOutput(_) => true,
        }
    }

    pub fn as_declared(&self) -> Option<&DeclaredResourceMetadata> {
        match self {
            ResourceMetadata::Declared(r) => Some(r),
            _ => None,
        }
    }
}

/// One link of a nested resource's parent chain.
#[derive(Debug, Clone)]
pub struct ResourceAncestor {
    pub resource: ResourceMetadataId,
    /// Index expression used to select the parent out of a collection, when
    /// the parent is a looped declaration.
    pub index_expression: Option<Syntax>,
}
