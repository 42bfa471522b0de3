//! The target language's expression tree.
//!
//! The template expression model is deliberately weak: literal tokens and
//! function invocations with appended property/index accesses. There are no
//! operators, no lambdas, no lexical scope — which is exactly why lowering
//! has to do all the work it does.

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    String(String),
    Int(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExpression {
    pub name: String,
    pub parameters: Vec<TemplateExpression>,
    /// Accesses appended after the call, e.g. `.outputs` or `[0]`. String
    /// literals serialize as dotted properties when identifier-safe.
    pub properties: Vec<TemplateExpression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateExpression {
    Literal(TemplateValue),
    Function(FunctionExpression),
}

impl TemplateExpression {
    pub fn string(value: impl Into<String>) -> TemplateExpression {
        TemplateExpression::Literal(TemplateValue::String(value.into()))
    }

    pub fn int(value: i64) -> TemplateExpression {
        TemplateExpression::Literal(TemplateValue::Int(value))
    }

    pub fn as_function(&self) -> Option<&FunctionExpression> {
        match self {
            TemplateExpression::Function(function) => Some(function),
            TemplateExpression::Literal(_) => None,
        }
    }
}

pub fn create_function(
    name: impl Into<String>,
    parameters: Vec<TemplateExpression>,
) -> TemplateExpression {
    TemplateExpression::Function(FunctionExpression {
        name: name.into(),
        parameters,
        properties: Vec::new(),
    })
}

pub fn append_properties(
    mut function: FunctionExpression,
    properties: Vec<TemplateExpression>,
) -> TemplateExpression {
    function.properties.extend(properties);
    TemplateExpression::Function(function)
}

/// Rewrites every single-literal-argument invocation of the loop-index
/// function to reference the fixed `"value"` placeholder. Used when a
/// property copy-loop's JSON shape diverges from the source shape and the
/// named index would resolve incorrectly.
pub fn rewrite_copy_index_arguments(expression: &mut TemplateExpression) {
    if let TemplateExpression::Function(function) = expression {
        if function.name == "copyIndex"
            && function.parameters.len() == 1
            && matches!(function.parameters[0], TemplateExpression::Literal(_))
        {
            function.parameters = vec![TemplateExpression::string("value")];
        }

        for parameter in &mut function.parameters {
            rewrite_copy_index_arguments(parameter);
        }
        for property in &mut function.properties {
            rewrite_copy_index_arguments(property);
        }
    }
}
