#[path = "fixture.rs"]
#[allow(dead_code)]
mod fixture;

use fixture::{convert_to_string, serialize, Fixture};
use mantle_compiler::emit::{scope, EmitError, EmitterContext, ExpressionConverter};
use mantle_compiler::semantics::metadata::{ResourceMetadataId, ScopeData};
use mantle_compiler::semantics::EmitterSettings;
use mantle_compiler::template::TemplateExpression;

fn name_segments(names: &[&str]) -> Vec<TemplateExpression> {
    names.iter().map(|name| TemplateExpression::string(*name)).collect()
}

#[cfg(test)]
mod id_functions {
    use super::*;

    #[test]
    fn should_build_resource_group_scoped_ids() {
        let id = scope::resource_group_resource_id("My.Rp/widgets", name_segments(&["w1"]));
        assert_eq!(serialize(&id), "[resourceId('My.Rp/widgets', 'w1')]");
    }

    #[test]
    fn should_build_subscription_scoped_ids() {
        let id = scope::subscription_resource_id("My.Rp/widgets", name_segments(&["w1"]));
        assert_eq!(
            serialize(&id),
            "[subscriptionResourceId('My.Rp/widgets', 'w1')]"
        );
    }

    #[test]
    fn should_build_tenant_scoped_ids() {
        let id = scope::tenant_resource_id("My.Rp/widgets", name_segments(&["w1"]));
        assert_eq!(serialize(&id), "[tenantResourceId('My.Rp/widgets', 'w1')]");
    }

    #[test]
    fn should_build_extension_scoped_ids() {
        let parent = scope::resource_group_resource_id("My.Rp/parents", name_segments(&["p"]));
        let id = scope::extension_resource_id(parent, "My.Rp/widgets", name_segments(&["w1"]));
        assert_eq!(
            serialize(&id),
            "[extensionResourceId(resourceId('My.Rp/parents', 'p'), 'My.Rp/widgets', 'w1')]"
        );
    }

    #[test]
    fn should_interleave_type_and_name_segments_in_unqualified_ids() {
        let id = scope::unqualified_resource_id(
            "My.Rp/parents/children",
            name_segments(&["p", "c"]),
        );
        assert_eq!(
            serialize(&id),
            "[format('My.Rp/parents/{0}/children/{1}', 'p', 'c')]"
        );
    }

    #[test]
    fn should_build_management_group_ids_in_both_flavors() {
        let qualified =
            scope::management_group_resource_id(TemplateExpression::string("mg"), true);
        assert_eq!(
            serialize(&qualified),
            "[tenantResourceId('Microsoft.Management/managementGroups', 'mg')]"
        );

        let unqualified =
            scope::management_group_resource_id(TemplateExpression::string("mg"), false);
        assert_eq!(
            serialize(&unqualified),
            "[format('Microsoft.Management/managementGroups/{0}', 'mg')]"
        );
    }

    #[test]
    fn should_address_the_ambient_management_group() {
        assert_eq!(
            serialize(&scope::current_management_group_id()),
            "[managementGroup().id]"
        );
    }

    #[test]
    fn should_build_resource_group_extension_scopes() {
        let scope_expression = scope::resource_group_scope(
            TemplateExpression::string("sub"),
            TemplateExpression::string("rg"),
        );
        assert_eq!(
            serialize(&scope_expression),
            "[format('/subscriptions/{0}/resourceGroups/{1}', 'sub', 'rg')]"
        );
    }
}

#[cfg(test)]
mod scope_dispatch {
    use super::*;

    #[test]
    fn should_route_tenant_and_management_group_scopes_to_tenant_ids() {
        for scope_data in [ScopeData::Tenant, ScopeData::ManagementGroup] {
            let id = scope::format_fully_qualified_resource_id(
                &scope_data,
                None,
                "My.Rp/widgets",
                name_segments(&["w1"]),
            )
            .unwrap();
            assert_eq!(serialize(&id), "[tenantResourceId('My.Rp/widgets', 'w1')]");
        }
    }

    #[test]
    fn should_fail_on_extension_scope_without_resolved_expression() {
        let result = scope::format_fully_qualified_resource_id(
            &ScopeData::Extension {
                scope_resource: ResourceMetadataId(0),
            },
            None,
            "My.Rp/widgets",
            name_segments(&["w1"]),
        );

        assert!(matches!(
            result.unwrap_err(),
            EmitError::UnsupportedConstruct(_)
        ));
    }
}

#[cfg(test)]
mod scoped_resources {
    use super::*;

    #[test]
    fn should_use_subscription_ids_for_subscription_scoped_resources() {
        let mut f = Fixture::new();
        let name = f.string("w1");
        let resource = f.declared_resource("widget", "My.Rp/widgets", "2023-01-01", name);
        let base = f.resource_access("widget", resource);
        let syntax = f.property_access(base, "id");

        let mut context = EmitterContext::new(&f.model, EmitterSettings::default());
        context.set_resource_scope(resource, ScopeData::Subscription);
        let converter = ExpressionConverter::new(&context);

        assert_eq!(
            serialize(&converter.convert_expression(&syntax).unwrap()),
            "[subscriptionResourceId('My.Rp/widgets', 'w1')]"
        );
    }

    #[test]
    fn should_resolve_the_scope_resource_id_for_extension_scoped_resources() {
        let mut f = Fixture::new();
        let parent_name = f.string("p");
        let parent = f.declared_resource("parent", "My.Rp/parents", "2023-01-01", parent_name);

        let name = f.string("w1");
        let resource = f.declared_resource("widget", "My.Rp/widgets", "2023-01-01", name);
        let base = f.resource_access("widget", resource);
        let syntax = f.property_access(base, "id");

        let mut context = EmitterContext::new(&f.model, EmitterSettings::default());
        context.set_resource_scope(
            resource,
            ScopeData::Extension {
                scope_resource: parent,
            },
        );
        let converter = ExpressionConverter::new(&context);

        assert_eq!(
            serialize(&converter.convert_expression(&syntax).unwrap()),
            "[extensionResourceId(resourceId('My.Rp/parents', 'p'), 'My.Rp/widgets', 'w1')]"
        );
    }

    #[test]
    fn should_default_to_resource_group_scope() {
        let mut f = Fixture::new();
        let name = f.string("w1");
        let resource = f.declared_resource("widget", "My.Rp/widgets", "2023-01-01", name);
        let base = f.resource_access("widget", resource);
        let syntax = f.property_access(base, "id");

        assert_eq!(
            convert_to_string(&f.model, &syntax),
            "[resourceId('My.Rp/widgets', 'w1')]"
        );
    }
}
