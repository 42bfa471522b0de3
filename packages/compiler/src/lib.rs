#![deny(clippy::all)]

/**
 * Mantle Compiler - expression lowering and emission backend
 *
 * Takes the resolved syntax and semantic model of a declarative deployment
 * file and produces the expression strings and JSON structures of the target
 * template document.
 */
pub mod data_flow;
pub mod emit;
pub mod operations;
pub mod semantics;
pub mod syntax;
pub mod template;

// Re-exports
pub use emit::{EmitError, EmitterContext, ExpressionConverter, ExpressionEmitter};
pub use operations::Operation;
pub use semantics::{EmitterSettings, SemanticModel};
pub use template::{ExpressionSerializer, ExpressionSerializerSettings, JsonWriter};
