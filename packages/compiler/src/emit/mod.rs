//! Lowering and emission of expressions into the target template document.

pub mod converter;
pub mod emitter;
pub mod scope;

use std::collections::HashMap;

use indexmap::IndexSet;
use thiserror::Error;

use crate::data_flow::DataFlowAnalyzer;
use crate::semantics::metadata::{ResourceMetadataId, ScopeData};
use crate::semantics::{EmitterSettings, ModuleId, SemanticModel, SymbolId};

pub use converter::ExpressionConverter;
pub use emitter::ExpressionEmitter;

/// Resource type used for nested deployments backing module declarations.
pub const NESTED_DEPLOYMENT_RESOURCE_TYPE: &str = "Microsoft.Resources/deployments";

/// API version passed to `reference` when a conditioned module must be
/// resolved explicitly.
pub const NESTED_DEPLOYMENT_RESOURCE_API_VERSION: &str = "2022-09-01";

/// The module body property holding the deployment name.
pub const MODULE_NAME_PROPERTY: &str = "name";

/// The property through which module outputs are accessed.
pub const MODULE_OUTPUTS_PROPERTY: &str = "outputs";

/// The type-erasure function; it disappears during lowering.
pub const ANY_FUNCTION: &str = "any";

/// Failures of the lowering/emission pass. All variants are fatal for the
/// pass: callers surface them as internal compiler errors, distinct from the
/// user-facing diagnostics produced upstream.
#[derive(Debug, Error)]
pub enum EmitError {
    /// A syntax/symbol shape outside the supported closed set. Upstream
    /// validation should have rejected the program, so hitting this always
    /// signals a defect.
    #[error("unsupported construct: {0}")]
    UnsupportedConstruct(String),

    #[error("integer literal {0} is outside the representable 64-bit range")]
    IntegerOverflow(u64),

    /// Relocation would need to substitute locals across more than one
    /// distinct enclosing loop in a single step, which is not supported.
    #[error("mismatch between count of index expressions and inaccessible symbols during index replacement")]
    AmbiguousIndexReplacement,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EmitError {
    pub fn unsupported(description: impl Into<String>) -> EmitError {
        EmitError::UnsupportedConstruct(description.into())
    }
}

pub type Result<T> = std::result::Result<T, EmitError>;

const DEFAULT_SCOPE: ScopeData = ScopeData::ResourceGroup;

/// Read-only bundle of everything the converter and emitter consult:
/// semantic model, data-flow analyzer, emission settings, per-declaration
/// scope assignments and the set of variables that cannot be emitted as
/// standalone template variables.
pub struct EmitterContext<'a> {
    pub model: &'a SemanticModel,
    pub settings: EmitterSettings,
    pub data_flow: DataFlowAnalyzer<'a>,
    variables_to_inline: IndexSet<SymbolId>,
    resource_scope_data: HashMap<ResourceMetadataId, ScopeData>,
    module_scope_data: HashMap<ModuleId, ScopeData>,
}

impl<'a> EmitterContext<'a> {
    pub fn new(model: &'a SemanticModel, settings: EmitterSettings) -> Self {
        EmitterContext {
            model,
            settings,
            data_flow: DataFlowAnalyzer::new(model),
            variables_to_inline: IndexSet::new(),
            resource_scope_data: HashMap::new(),
            module_scope_data: HashMap::new(),
        }
    }

    /// Marks a variable whose value must be inlined at each use site instead
    /// of being referenced by name (e.g. it has a runtime dependency that the
    /// target's `variables` section cannot express).
    pub fn mark_variable_for_inlining(&mut self, variable: SymbolId) {
        self.variables_to_inline.insert(variable);
    }

    pub fn should_inline(&self, variable: SymbolId) -> bool {
        self.variables_to_inline.contains(&variable)
    }

    pub fn set_resource_scope(&mut self, resource: ResourceMetadataId, scope: ScopeData) {
        self.resource_scope_data.insert(resource, scope);
    }

    pub fn set_module_scope(&mut self, module: ModuleId, scope: ScopeData) {
        self.module_scope_data.insert(module, scope);
    }

    pub fn resource_scope(&self, resource: ResourceMetadataId) -> &ScopeData {
        self.resource_scope_data.get(&resource).unwrap_or(&DEFAULT_SCOPE)
    }

    pub fn module_scope(&self, module: ModuleId) -> &ScopeData {
        self.module_scope_data.get(&module).unwrap_or(&DEFAULT_SCOPE)
    }
}
