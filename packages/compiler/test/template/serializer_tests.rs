use mantle_compiler::template::expression::{
    append_properties, create_function, FunctionExpression, TemplateExpression,
};
use mantle_compiler::template::{
    ExpressionSerializer, ExpressionSerializerSettings, JsonWriter, SingleStringHandling,
};

fn serializer(
    include_outer_square_brackets: bool,
    single_string_handling: SingleStringHandling,
) -> ExpressionSerializer {
    ExpressionSerializer::new(ExpressionSerializerSettings {
        include_outer_square_brackets,
        single_string_handling,
    })
}

#[cfg(test)]
mod single_string_handling {
    use super::*;

    #[test]
    fn should_serialize_lone_strings_raw_in_string_mode() {
        let serialized = serializer(true, SingleStringHandling::SerializeAsString)
            .serialize_expression(&TemplateExpression::string("plain"));
        assert_eq!(serialized, "plain");
    }

    #[test]
    fn should_serialize_lone_strings_as_expressions_in_expression_mode() {
        let serialized = serializer(true, SingleStringHandling::SerializeAsExpression)
            .serialize_expression(&TemplateExpression::string("plain"));
        assert_eq!(serialized, "['plain']");
    }

    #[test]
    fn should_escape_expression_like_strings_in_string_mode() {
        let serialized = serializer(true, SingleStringHandling::SerializeAsString)
            .serialize_expression(&TemplateExpression::string("[not(an, expression)]"));
        assert_eq!(serialized, "[[not(an, expression)]");
    }

    #[test]
    fn should_not_escape_strings_with_only_a_leading_bracket() {
        let serialized = serializer(true, SingleStringHandling::SerializeAsString)
            .serialize_expression(&TemplateExpression::string("[half-open"));
        assert_eq!(serialized, "[half-open");
    }
}

#[cfg(test)]
mod bracket_settings {
    use super::*;

    #[test]
    fn should_omit_outer_brackets_when_configured() {
        let expr = create_function("concat", vec![TemplateExpression::string("a")]);
        let serialized = serializer(false, SingleStringHandling::SerializeAsExpression)
            .serialize_expression(&expr);
        assert_eq!(serialized, "concat('a')");
    }

    #[test]
    fn should_include_outer_brackets_by_default_configuration() {
        let expr = create_function("concat", vec![TemplateExpression::string("a")]);
        let serialized = serializer(true, SingleStringHandling::SerializeAsExpression)
            .serialize_expression(&expr);
        assert_eq!(serialized, "[concat('a')]");
    }
}

#[cfg(test)]
mod function_rendering {
    use super::*;

    #[test]
    fn should_render_nested_calls_with_comma_separated_parameters() {
        let inner = create_function(
            "resourceId",
            vec![
                TemplateExpression::string("My.Rp/widgets"),
                TemplateExpression::string("w1"),
            ],
        );
        let expr = create_function("reference", vec![inner, TemplateExpression::string("full")]);

        let serialized = serializer(true, SingleStringHandling::SerializeAsString)
            .serialize_expression(&expr);
        assert_eq!(
            serialized,
            "[reference(resourceId('My.Rp/widgets', 'w1'), 'full')]"
        );
    }

    #[test]
    fn should_mix_dotted_and_bracketed_property_accesses() {
        let reference = FunctionExpression {
            name: "reference".to_string(),
            parameters: vec![TemplateExpression::string("id")],
            properties: Vec::new(),
        };
        let expr = append_properties(
            reference,
            vec![
                TemplateExpression::string("outputs"),
                TemplateExpression::string("0startsWithDigit"),
                TemplateExpression::int(2),
                TemplateExpression::string("value"),
            ],
        );

        let serialized = serializer(true, SingleStringHandling::SerializeAsString)
            .serialize_expression(&expr);
        assert_eq!(
            serialized,
            "[reference('id').outputs['0startsWithDigit'][2].value]"
        );
    }

    #[test]
    fn should_double_embedded_single_quotes() {
        let expr = create_function("format", vec![TemplateExpression::string("it's {0}")]);
        let serialized = serializer(true, SingleStringHandling::SerializeAsString)
            .serialize_expression(&expr);
        assert_eq!(serialized, "[format('it''s {0}')]");
    }
}

#[cfg(test)]
mod writer_integration {
    use super::*;

    #[test]
    fn should_write_serialized_expressions_as_json_string_values() {
        let expr = create_function(
            "parameters",
            vec![TemplateExpression::string("location")],
        );
        let serialized = serializer(true, SingleStringHandling::SerializeAsString)
            .serialize_expression(&expr);

        let mut writer = JsonWriter::new(Vec::new());
        writer.write_start_object().unwrap();
        writer.write_property_name("location").unwrap();
        writer.write_string(&serialized).unwrap();
        writer.write_end_object().unwrap();

        assert_eq!(
            String::from_utf8(writer.into_inner()).unwrap(),
            "{\"location\":\"[parameters('location')]\"}"
        );
    }

    #[test]
    fn should_reject_unbalanced_writes() {
        let mut writer = JsonWriter::new(Vec::new());
        writer.write_start_object().unwrap();
        assert!(writer.write_end_array().is_err());
    }
}
