//! Target template expression model and serialization.

pub mod expression;
pub mod json_writer;
pub mod serializer;

pub use expression::{FunctionExpression, TemplateExpression, TemplateValue};
pub use json_writer::JsonWriter;
pub use serializer::{ExpressionSerializer, ExpressionSerializerSettings, SingleStringHandling};
