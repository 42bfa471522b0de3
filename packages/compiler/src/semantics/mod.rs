//! Symbol and binding surface consumed by the emission backend.
//!
//! The real binder and type checker live upstream; this module captures the
//! read-only view of their results that lowering needs: which symbol a node
//! resolves to, which loop declared a local, which resources and modules
//! exist, and the resource ancestor chains for nested declarations.

pub mod metadata;

use std::collections::HashMap;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::syntax::{NodeId, Syntax};
use metadata::{ResourceAncestor, ResourceMetadata, ResourceMetadataId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub usize);

/// Which of a `for` expression's locals a symbol is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    Item,
    Index,
}

#[derive(Debug, Clone)]
pub struct ParameterSymbol {
    pub name: String,
    /// Set when the parameter carries the id of a pre-existing resource.
    pub resource: Option<ResourceMetadataId>,
}

#[derive(Debug, Clone)]
pub struct VariableSymbol {
    pub name: String,
    pub value: Syntax,
}

#[derive(Debug, Clone)]
pub struct LocalSymbol {
    pub name: String,
    pub kind: LocalKind,
    pub declaring_loop: LoopId,
}

#[derive(Debug, Clone)]
pub enum Symbol {
    Parameter(ParameterSymbol),
    Variable(VariableSymbol),
    Resource(ResourceMetadataId),
    Module(ModuleId),
    Local(LocalSymbol),
    Namespace { name: String },
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::Parameter(p) => &p.name,
            Symbol::Variable(v) => &v.name,
            Symbol::Local(l) => &l.name,
            Symbol::Namespace { name } => name,
            Symbol::Resource(_) | Symbol::Module(_) => "",
        }
    }
}

/// The declaration a `for` expression hangs off. Determines the name passed
/// to the target template's loop-index function.
#[derive(Debug, Clone)]
pub enum LoopParent {
    ResourceDeclaration,
    ModuleDeclaration,
    OutputDeclaration,
    VariableDeclaration(String),
    Property(String),
}

impl LoopParent {
    /// Resource, module and output loops resolve to the unnamed index in the
    /// target runtime; variable and property loops are named.
    pub fn copy_index_name(&self) -> Option<&str> {
        match self {
            LoopParent::ResourceDeclaration
            | LoopParent::ModuleDeclaration
            | LoopParent::OutputDeclaration => None,
            LoopParent::VariableDeclaration(name) => Some(name),
            LoopParent::Property(key) => Some(key),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoopInfo {
    pub for_node: NodeId,
    /// The loop's source array expression.
    pub expression: Syntax,
    pub parent: LoopParent,
}

/// A module declaration as the binder resolved it.
#[derive(Debug, Clone)]
pub struct ModuleDeclaration {
    pub name: String,
    pub is_collection: bool,
    pub has_condition: bool,
    /// The value of the module body's `name` property. Guaranteed present by
    /// upstream validation.
    pub name_syntax: Syntax,
}

/// Emission mode switches. Deserialized from project configuration by the
/// tooling layer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EmitterSettings {
    pub enable_symbolic_names: bool,
}

/// Read-only semantic facts for one compilation, keyed by node identity.
#[derive(Debug, Default)]
pub struct SemanticModel {
    symbols: Vec<Symbol>,
    bindings: HashMap<NodeId, SymbolId>,
    loops: Vec<LoopInfo>,
    resources: Vec<ResourceMetadata>,
    resource_bindings: HashMap<NodeId, ResourceMetadataId>,
    modules: Vec<ModuleDeclaration>,
    ancestors: HashMap<ResourceMetadataId, Vec<ResourceAncestor>>,
    loops_in_scope: HashMap<NodeId, Vec<LoopId>>,
}

impl SemanticModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_symbol(&mut self, symbol: Symbol) -> SymbolId {
        self.symbols.push(symbol);
        SymbolId(self.symbols.len() - 1)
    }

    pub fn add_loop(&mut self, info: LoopInfo) -> LoopId {
        self.loops.push(info);
        LoopId(self.loops.len() - 1)
    }

    pub fn add_resource(&mut self, resource: ResourceMetadata) -> ResourceMetadataId {
        self.resources.push(resource);
        ResourceMetadataId(self.resources.len() - 1)
    }

    pub fn add_module(&mut self, module: ModuleDeclaration) -> ModuleId {
        self.modules.push(module);
        ModuleId(self.modules.len() - 1)
    }

    /// Records that `node` resolves to `symbol`.
    pub fn bind(&mut self, node: NodeId, symbol: SymbolId) {
        self.bindings.insert(node, symbol);
    }

    /// Records that `node` denotes a resource (declared, parameter-sourced,
    /// or a module output).
    pub fn bind_resource(&mut self, node: NodeId, resource: ResourceMetadataId) {
        self.resource_bindings.insert(node, resource);
    }

    pub fn set_ancestors(&mut self, resource: ResourceMetadataId, chain: Vec<ResourceAncestor>) {
        self.ancestors.insert(resource, chain);
    }

    /// Records which loops enclose the given node position. Positions with
    /// no entry are outside all loops.
    pub fn set_loops_in_scope(&mut self, node: NodeId, loops: Vec<LoopId>) {
        self.loops_in_scope.insert(node, loops);
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn get_symbol_info(&self, node: NodeId) -> Option<SymbolId> {
        self.bindings.get(&node).copied()
    }

    pub fn symbol_for(&self, syntax: &Syntax) -> Option<&Symbol> {
        self.get_symbol_info(syntax.node_id()).map(|id| self.symbol(id))
    }

    pub fn loop_info(&self, id: LoopId) -> &LoopInfo {
        &self.loops[id.0]
    }

    pub fn resource(&self, id: ResourceMetadataId) -> &ResourceMetadata {
        &self.resources[id.0]
    }

    pub fn module(&self, id: ModuleId) -> &ModuleDeclaration {
        &self.modules[id.0]
    }

    /// Resource metadata lookup by node identity, mirroring how the binder
    /// resolves resource-typed expressions.
    pub fn try_lookup_resource(&self, syntax: &Syntax) -> Option<ResourceMetadataId> {
        self.resource_bindings.get(&syntax.node_id()).copied()
    }

    /// Ancestor chain for a nested resource, root-most first. Empty for
    /// top-level resources.
    pub fn get_ancestors(&self, resource: ResourceMetadataId) -> &[ResourceAncestor] {
        self.ancestors.get(&resource).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn loops_in_scope_at(&self, node: NodeId) -> &[LoopId] {
        self.loops_in_scope.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Locals declared by loops, as an ordered set for deterministic
    /// substitution order.
    pub fn local_symbols(&self) -> IndexSet<SymbolId> {
        self.symbols
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Symbol::Local(_)))
            .map(|(i, _)| SymbolId(i))
            .collect()
    }
}
